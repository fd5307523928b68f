// crates/signed-relay-broker/src/relay.rs
// ============================================================================
// Module: Signed Relay Broker
// Description: Host-facing relay operations and the contact/ping flows.
// Purpose: Compose registry, key store, signer, ledger, and dispatcher.
// Dependencies: signed-relay-core, serde, thiserror
// ============================================================================

//! ## Overview
//! [`RelayBroker`] is the single entry point a host wires up. Contact runs a
//! linear flow: load destination, load key pair, build document, sign,
//! record nonce, dispatch, release nonce. Any step may fail; nonce release
//! still runs once a ledger entry exists.
//! Invariants:
//! - No dispatch happens without a signed envelope recorded in the ledger.
//! - Ledger release failures are audited and never change the response.
//! - Nothing is retried.
//!
//! Security posture: caller input is filtered by the destination allow-list
//! before signing; see `signed_relay_core::document`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use serde::Serialize;
use signed_relay_core::CallerRequest;
use signed_relay_core::ConfigStore;
use signed_relay_core::DEFAULT_MAX_TIMEOUT_SECS;
use signed_relay_core::Destination;
use signed_relay_core::DestinationInput;
use signed_relay_core::DestinationRegistry;
use signed_relay_core::Document;
use signed_relay_core::DocumentBuilder;
use signed_relay_core::Nonce;
use signed_relay_core::NonceLedger;
use signed_relay_core::RelayError;
use signed_relay_core::SigningKeyStore;
use signed_relay_core::TargetName;
use signed_relay_core::WriteOutcome;
use signed_relay_core::hashing::HashDigest;
use signed_relay_core::hashing::sha256_digest;
use signed_relay_core::sign_document;
use thiserror::Error;

use crate::audit::NoopAuditSink;
use crate::audit::RelayAuditEvent;
use crate::audit::RelayAuditEventParams;
use crate::audit::RelayAuditSink;
use crate::audit::RelayOutcome;
use crate::dispatch::DispatchRequest;
use crate::dispatch::DispatchResponse;
use crate::dispatch::Dispatcher;
use crate::dispatch::HttpDispatcher;

// ============================================================================
// SECTION: Results
// ============================================================================

/// Result of a contact call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    /// Nonce of the document that was sent.
    pub nonce: Nonce,
    /// HTTP status returned by the destination.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

/// Result of a ping call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PingReport {
    /// HTTP status returned by the destination.
    pub status: u16,
    /// True when the status is 2xx or 3xx.
    pub reachable: bool,
    /// Round-trip time in milliseconds.
    pub elapsed_ms: u64,
}

/// A completed dispatch with its nonce and timing.
struct Relayed {
    /// Nonce of the document that was sent.
    nonce: Nonce,
    /// Raw destination response.
    response: DispatchResponse,
    /// Dispatch round-trip time.
    elapsed: Duration,
}

/// Facts gathered while a relay flow runs, used for auditing.
#[derive(Default)]
struct RelayTrace {
    /// Nonce once a document was built.
    nonce: Option<Nonce>,
    /// Envelope digest once signed.
    envelope_hash: Option<HashDigest>,
    /// Envelope size once signed.
    request_bytes: usize,
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Errors raised when assembling a [`RelayBroker`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// No configuration store was supplied.
    #[error("relay broker config store is not configured")]
    MissingStore,
}

/// Builder for a relay broker.
///
/// # Invariants
/// - `build` succeeds only when a configuration store is set.
/// - Unset collaborators fall back to [`HttpDispatcher`], [`NoopAuditSink`],
///   and the OS nonce source with the system clock.
pub struct RelayBrokerBuilder {
    /// Store for destinations and key pairs.
    store: Option<Arc<dyn ConfigStore>>,
    /// Local store for verification records; defaults to `store`.
    verify_store: Option<Arc<dyn ConfigStore>>,
    /// Outbound transport.
    dispatcher: Option<Arc<dyn Dispatcher>>,
    /// Audit sink.
    audit: Option<Arc<dyn RelayAuditSink>>,
    /// Document builder.
    documents: Option<DocumentBuilder>,
    /// Largest accepted destination timeout.
    max_timeout_secs: u64,
}

impl Default for RelayBrokerBuilder {
    fn default() -> Self {
        Self {
            store: None,
            verify_store: None,
            dispatcher: None,
            audit: None,
            documents: None,
            max_timeout_secs: DEFAULT_MAX_TIMEOUT_SECS,
        }
    }
}

impl RelayBrokerBuilder {
    /// Sets the store for destinations and key pairs.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the local store for the `verify/` namespace.
    #[must_use]
    pub fn verify_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.verify_store = Some(store);
        self
    }

    /// Sets the outbound transport.
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Sets the audit sink.
    #[must_use]
    pub fn audit(mut self, audit: Arc<dyn RelayAuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Sets the document builder.
    #[must_use]
    pub fn documents(mut self, documents: DocumentBuilder) -> Self {
        self.documents = Some(documents);
        self
    }

    /// Sets the largest accepted destination timeout.
    #[must_use]
    pub const fn max_timeout_secs(mut self, max_timeout_secs: u64) -> Self {
        self.max_timeout_secs = max_timeout_secs;
        self
    }

    /// Builds the relay broker.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingStore`] when no store was supplied.
    pub fn build(self) -> Result<RelayBroker, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let verify_store = self.verify_store.unwrap_or_else(|| Arc::clone(&store));
        Ok(RelayBroker {
            registry: DestinationRegistry::new(Arc::clone(&store))
                .with_max_timeout_secs(self.max_timeout_secs),
            keys: SigningKeyStore::new(store),
            ledger: NonceLedger::new(verify_store),
            documents: self.documents.unwrap_or_default(),
            dispatcher: self.dispatcher.unwrap_or_else(|| Arc::new(HttpDispatcher::new())),
            audit: self.audit.unwrap_or_else(|| Arc::new(NoopAuditSink)),
        })
    }
}

// ============================================================================
// SECTION: Relay Broker
// ============================================================================

/// Signed relay engine exposed to hosts.
///
/// # Invariants
/// - One [`SigningKeyStore`] instance guards every key read and rotation.
pub struct RelayBroker {
    /// Destination registry.
    registry: DestinationRegistry,
    /// Signing key store.
    keys: SigningKeyStore,
    /// Nonce ledger.
    ledger: NonceLedger,
    /// Document builder.
    documents: DocumentBuilder,
    /// Outbound transport.
    dispatcher: Arc<dyn Dispatcher>,
    /// Audit sink.
    audit: Arc<dyn RelayAuditSink>,
}

impl RelayBroker {
    /// Returns a new builder.
    #[must_use]
    pub fn builder() -> RelayBrokerBuilder {
        RelayBrokerBuilder::default()
    }

    // ------------------------------------------------------------------------
    // Destinations
    // ------------------------------------------------------------------------

    /// Creates or partially updates a destination.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Validation`] or [`RelayError::CryptoConfig`] for
    /// invalid input and [`RelayError::Store`] for storage failures.
    pub fn write_destination(
        &self,
        name: &str,
        input: DestinationInput,
    ) -> Result<WriteOutcome, RelayError> {
        let result = TargetName::new(name).and_then(|target| self.registry.write(&target, input));
        self.record_simple("destination_write", Some(name), result.as_ref().err());
        result
    }

    /// Reads a destination.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`] when absent and
    /// [`RelayError::CorruptRecord`] when undecodable.
    pub fn read_destination(&self, name: &str) -> Result<Destination, RelayError> {
        self.registry.get(&TargetName::new(name)?)
    }

    /// Deletes a destination; missing names are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] when the delete fails.
    pub fn delete_destination(&self, name: &str) -> Result<(), RelayError> {
        let result = TargetName::new(name).and_then(|target| self.registry.delete(&target));
        self.record_simple("destination_delete", Some(name), result.as_ref().err());
        result
    }

    /// Lists registered destination names.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] when the listing fails.
    pub fn list_destinations(&self) -> Result<Vec<String>, RelayError> {
        self.registry.list()
    }

    // ------------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------------

    /// Installs or replaces the signing key pair.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::CryptoConfig`] when the pair is malformed or
    /// mismatched; nothing is persisted in that case.
    pub fn install_signing_keys(&self, certificate: &str, private_key: &str) -> Result<(), RelayError> {
        let result = self.keys.set_key_pair(certificate, private_key);
        self.record_simple("signing_keys_install", None, result.as_ref().err());
        result
    }

    /// Returns the public signing certificate for receivers.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::KeyNotConfigured`] when no pair is installed.
    pub fn signing_certificate(&self) -> Result<String, RelayError> {
        self.keys.certificate()
    }

    /// Installs the TLS client identity presented to destinations.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::CryptoConfig`] when either PEM is malformed.
    pub fn install_client_identity(
        &self,
        certificate: &str,
        private_key: &str,
    ) -> Result<(), RelayError> {
        let result = self.keys.set_client_identity(certificate, private_key);
        self.record_simple("client_identity_install", None, result.as_ref().err());
        result
    }

    /// Removes the TLS client identity; idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] when the delete fails.
    pub fn clear_client_identity(&self) -> Result<(), RelayError> {
        self.keys.clear_client_identity()
    }

    /// Returns the envelope recorded for an in-flight nonce, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] when the ledger cannot be read.
    pub fn fetch_verification(&self, nonce: &str) -> Result<Option<Vec<u8>>, RelayError> {
        self.ledger.fetch(nonce)
    }

    // ------------------------------------------------------------------------
    // Relay Flows
    // ------------------------------------------------------------------------

    /// Sends a signed document to a destination and returns its raw response.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`], [`RelayError::KeyNotConfigured`],
    /// [`RelayError::NonceGeneration`], [`RelayError::Signing`],
    /// [`RelayError::Transport`], or [`RelayError::TransportTimeout`] from the
    /// step that failed.
    pub fn contact(&self, name: &str, request: &CallerRequest) -> Result<RelayResponse, RelayError> {
        let relayed = self.relay("contact", name, &request.request_id, |destination, target| {
            self.documents.build(destination, request, target)
        })?;
        Ok(RelayResponse {
            nonce: relayed.nonce,
            status: relayed.response.status,
            body: relayed.response.body,
        })
    }

    /// Sends a minimal signed document and reports reachability only.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::contact`].
    pub fn ping(&self, name: &str, request_id: &str) -> Result<PingReport, RelayError> {
        let relayed = self.relay("ping", name, request_id, |_, target| {
            self.documents.build_ping(target, request_id)
        })?;
        let status = relayed.response.status;
        Ok(PingReport {
            status,
            reachable: (200..400).contains(&status),
            elapsed_ms: u64::try_from(relayed.elapsed.as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Runs the relay flow and records one audit event for it.
    fn relay<F>(
        &self,
        event: &'static str,
        name: &str,
        request_id: &str,
        build: F,
    ) -> Result<Relayed, RelayError>
    where
        F: FnOnce(&Destination, &TargetName) -> Result<Document, RelayError>,
    {
        let mut trace = RelayTrace::default();
        let result = self.relay_steps(name, build, &mut trace);
        let (outcome, error_kind, status, response_bytes) = match &result {
            Ok(relayed) => {
                (RelayOutcome::Ok, None, Some(relayed.response.status), relayed.response.body.len())
            }
            Err(err) => (RelayOutcome::Error, Some(err.kind()), None, 0),
        };
        self.audit.record(&RelayAuditEvent::new(
            event,
            RelayAuditEventParams {
                target: Some(name.to_string()),
                request_id: Some(request_id.to_string()),
                nonce: trace.nonce.map(|nonce| nonce.as_str().to_string()),
                outcome,
                error_kind,
                status,
                request_bytes: trace.request_bytes,
                response_bytes,
                envelope_hash: trace.envelope_hash,
            },
        ));
        result
    }

    /// Executes the linear relay steps.
    fn relay_steps<F>(
        &self,
        name: &str,
        build: F,
        trace: &mut RelayTrace,
    ) -> Result<Relayed, RelayError>
    where
        F: FnOnce(&Destination, &TargetName) -> Result<Document, RelayError>,
    {
        let target = TargetName::new(name)?;
        let destination = self.registry.get(&target)?;
        let key_pair = self.keys.get_key_pair()?;
        let client_identity = self.keys.client_identity()?;
        let document = build(&destination, &target)?;
        trace.nonce = Some(document.nonce.clone());

        let envelope = sign_document(&document, &key_pair.private_key)?;
        trace.request_bytes = envelope.as_bytes().len();
        trace.envelope_hash = Some(sha256_digest(envelope.as_bytes()));

        let lease = self.ledger.acquire(&document.nonce, envelope.as_bytes())?;
        let started = Instant::now();
        let dispatched = self.dispatcher.send(&DispatchRequest {
            url: destination.target_url.as_str(),
            body: envelope.as_bytes(),
            follow_redirects: destination.follow_redirects,
            timeout: destination.timeout(),
            trust_anchor: destination.trust_anchor(),
            client_identity: client_identity.as_ref(),
        });
        let elapsed = started.elapsed();
        if let Err(err) = lease.release() {
            self.audit.record(&RelayAuditEvent::new(
                "nonce_release_failed",
                RelayAuditEventParams {
                    target: Some(name.to_string()),
                    nonce: Some(document.nonce.as_str().to_string()),
                    outcome: RelayOutcome::Error,
                    error_kind: Some(err.kind()),
                    ..RelayAuditEventParams::default()
                },
            ));
        }
        Ok(Relayed {
            nonce: document.nonce,
            response: dispatched?,
            elapsed,
        })
    }

    /// Records an audit event for a configuration operation.
    fn record_simple(&self, event: &'static str, target: Option<&str>, error: Option<&RelayError>) {
        self.audit.record(&RelayAuditEvent::new(
            event,
            RelayAuditEventParams {
                target: target.map(str::to_string),
                outcome: if error.is_some() { RelayOutcome::Error } else { RelayOutcome::Ok },
                error_kind: error.map(RelayError::kind),
                ..RelayAuditEventParams::default()
            },
        ));
    }
}
