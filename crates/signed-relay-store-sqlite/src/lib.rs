// crates/signed-relay-store-sqlite/src/lib.rs
// ============================================================================
// Module: Signed Relay SQLite Store
// Description: SQLite-backed configuration store.
// Purpose: Provide durable key-value persistence for relay records.
// Dependencies: signed-relay-core, rusqlite
// ============================================================================

//! ## Overview
//! Exposes [`SqliteConfigStore`], a durable [`signed_relay_core::ConfigStore`]
//! used for destination records, key pairs, and the local verification ledger.

pub mod store;

pub use store::MAX_VALUE_BYTES;
pub use store::SqliteConfigStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
