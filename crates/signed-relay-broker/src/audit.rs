// crates/signed-relay-broker/src/audit.rs
// ============================================================================
// Module: Signed Relay Audit Logging
// Description: Structured audit events for relay operations.
// Purpose: Emit redacted JSON-line audit records without hard dependencies.
// Dependencies: signed-relay-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events describe what the relay did, never what it carried: no
//! parameter values, metadata values, key material, or response bodies.
//! Sinks are pluggable so deployments can route lines to their own pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use signed_relay_core::hashing::HashDigest;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome label for an audited operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayOutcome {
    /// Operation succeeded.
    #[default]
    Ok,
    /// Operation failed.
    Error,
}

/// Relay audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RelayAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Destination name when relevant.
    pub target: Option<String>,
    /// Caller correlation identifier when relevant.
    pub request_id: Option<String>,
    /// Document nonce when one was minted.
    pub nonce: Option<String>,
    /// Operation outcome.
    pub outcome: RelayOutcome,
    /// Stable error kind label on failure.
    pub error_kind: Option<&'static str>,
    /// HTTP status returned by the destination.
    pub status: Option<u16>,
    /// Envelope size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
    /// Digest of the signed envelope.
    pub envelope_hash: Option<HashDigest>,
}

/// Inputs required to construct an audit event.
#[derive(Debug, Clone, Default)]
pub struct RelayAuditEventParams {
    /// Destination name when relevant.
    pub target: Option<String>,
    /// Caller correlation identifier when relevant.
    pub request_id: Option<String>,
    /// Document nonce when one was minted.
    pub nonce: Option<String>,
    /// Operation outcome.
    pub outcome: RelayOutcome,
    /// Stable error kind label on failure.
    pub error_kind: Option<&'static str>,
    /// HTTP status returned by the destination.
    pub status: Option<u16>,
    /// Envelope size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
    /// Digest of the signed envelope.
    pub envelope_hash: Option<HashDigest>,
}

impl RelayAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(event: &'static str, params: RelayAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            target: params.target,
            request_id: params.request_id,
            nonce: params.nonce,
            outcome: params.outcome,
            error_kind: params.error_kind,
            status: params.status,
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
            envelope_hash: params.envelope_hash,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for relay events.
pub trait RelayAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &RelayAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl RelayAuditSink for StderrAuditSink {
    fn record(&self, event: &RelayAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl RelayAuditSink for FileAuditSink {
    fn record(&self, event: &RelayAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl RelayAuditSink for NoopAuditSink {
    fn record(&self, _event: &RelayAuditEvent) {}
}
