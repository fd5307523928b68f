// crates/signed-relay-core/src/interfaces/mod.rs
// ============================================================================
// Module: Signed Relay Interfaces
// Description: Backend-agnostic interface for the configuration store.
// Purpose: Define the key-value contract used by the registry, key store, and ledger.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The relay persists destinations, key pairs, and verification records
//! through [`ConfigStore`], a flat key-value contract with hierarchical string
//! keys. Implementations must offer read-after-write consistency per key and
//! fail closed on unreadable data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Configuration Store
// ============================================================================

/// Configuration store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("config store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("config store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("config store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store input or data is invalid.
    #[error("config store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("config store error: {0}")]
    Store(String),
}

/// Key-value store holding relay configuration and verification records.
///
/// # Invariants
/// - `put` followed by `get` on the same key observes the written bytes.
/// - `delete` of a missing key succeeds.
/// - `list` returns key suffixes below `prefix` in ascending byte order.
pub trait ConfigStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Removes the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Lists every key starting with `prefix`, with the prefix stripped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the listing fails.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
