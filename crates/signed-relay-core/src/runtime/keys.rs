// crates/signed-relay-core/src/runtime/keys.rs
// ============================================================================
// Module: Signed Relay Key Store
// Description: Lock-guarded storage for the signing pair and TLS client identity.
// Purpose: Replace key pairs atomically and keep readers off half-written state.
// Dependencies: crate::{core, interfaces}, serde_json
// ============================================================================

//! ## Overview
//! The signing pair lives in a single record so a rotation is one store
//! write. Readers hold a shared lock for the read; writers hold the exclusive
//! lock across validation and persistence.
//!
//! Invariants:
//! - Nothing is persisted unless both PEM blobs parse and, for the signing
//!   pair, the key signs a challenge the certificate verifies.
//!
//! Security posture: private keys never appear in `Debug` output or errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;

use crate::core::error::RelayError;
use crate::core::pem::parse_certificates;
use crate::core::pem::parse_private_key;
use crate::core::signing::verify_key_pair;
use crate::interfaces::ConfigStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Store key for the signing certificate and private key.
pub const SIGNING_KEYS_KEY: &str = "config/keys/jws";
/// Store key for the TLS client identity.
pub const CLIENT_IDENTITY_KEY: &str = "config/keys/client";

// ============================================================================
// SECTION: Key Pair
// ============================================================================

/// PEM certificate and private key stored together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    /// PEM certificate (public).
    pub certificate: String,
    /// PEM private key.
    pub private_key: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("certificate", &self.certificate)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// SECTION: Key Store
// ============================================================================

/// Shared/exclusive guarded key store.
///
/// # Invariants
/// - All reads and writes of key records go through `lock`.
pub struct SigningKeyStore {
    /// Backing store.
    store: Arc<dyn ConfigStore>,
    /// Guards key records against interleaved rotation and reads.
    lock: RwLock<()>,
}

impl SigningKeyStore {
    /// Creates a key store over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            lock: RwLock::new(()),
        }
    }

    /// Loads the current signing key pair.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::KeyNotConfigured`] when no pair was installed and
    /// [`RelayError::CorruptRecord`] when the record fails to decode.
    pub fn get_key_pair(&self) -> Result<KeyPair, RelayError> {
        let _guard =
            self.lock.read().map_err(|_| RelayError::Store("key store lock poisoned".to_string()))?;
        read_pair(self.store.as_ref(), SIGNING_KEYS_KEY)?.ok_or_else(|| {
            RelayError::KeyNotConfigured("install a signing certificate and key".to_string())
        })
    }

    /// Validates and installs a signing key pair.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::CryptoConfig`] when either PEM is malformed or the
    /// key does not match the certificate; nothing is written in that case.
    pub fn set_key_pair(&self, certificate: &str, private_key: &str) -> Result<(), RelayError> {
        let _guard = self
            .lock
            .write()
            .map_err(|_| RelayError::Store("key store lock poisoned".to_string()))?;
        verify_key_pair(certificate, private_key)?;
        write_pair(self.store.as_ref(), SIGNING_KEYS_KEY, certificate, private_key)
    }

    /// Returns the public signing certificate.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::KeyNotConfigured`] when no pair was installed.
    pub fn certificate(&self) -> Result<String, RelayError> {
        self.get_key_pair().map(|pair| pair.certificate)
    }

    /// Loads the TLS client identity, if one is installed.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::CorruptRecord`] when the record fails to decode.
    pub fn client_identity(&self) -> Result<Option<KeyPair>, RelayError> {
        let _guard =
            self.lock.read().map_err(|_| RelayError::Store("key store lock poisoned".to_string()))?;
        read_pair(self.store.as_ref(), CLIENT_IDENTITY_KEY)
    }

    /// Validates and installs a TLS client identity.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::CryptoConfig`] when either PEM is malformed.
    pub fn set_client_identity(
        &self,
        certificate: &str,
        private_key: &str,
    ) -> Result<(), RelayError> {
        let _guard = self
            .lock
            .write()
            .map_err(|_| RelayError::Store("key store lock poisoned".to_string()))?;
        parse_certificates(certificate)?;
        parse_private_key(private_key)?;
        write_pair(self.store.as_ref(), CLIENT_IDENTITY_KEY, certificate, private_key)
    }

    /// Removes the TLS client identity; idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] when the delete fails.
    pub fn clear_client_identity(&self) -> Result<(), RelayError> {
        let _guard = self
            .lock
            .write()
            .map_err(|_| RelayError::Store("key store lock poisoned".to_string()))?;
        self.store.delete(CLIENT_IDENTITY_KEY)?;
        Ok(())
    }
}

/// Reads and decodes a key pair record.
fn read_pair(store: &dyn ConfigStore, key: &str) -> Result<Option<KeyPair>, RelayError> {
    let Some(bytes) = store.get(key)? else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|err| RelayError::CorruptRecord(format!("{key}: {err}")))
}

/// Encodes and writes a key pair record in one store write.
fn write_pair(
    store: &dyn ConfigStore,
    key: &str,
    certificate: &str,
    private_key: &str,
) -> Result<(), RelayError> {
    let pair = KeyPair {
        certificate: certificate.to_string(),
        private_key: private_key.to_string(),
    };
    let bytes = serde_json::to_vec(&pair)
        .map_err(|err| RelayError::Store(format!("failed to encode key pair: {err}")))?;
    store.put(key, &bytes)?;
    Ok(())
}
