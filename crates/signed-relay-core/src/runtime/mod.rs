// crates/signed-relay-core/src/runtime/mod.rs
// ============================================================================
// Module: Signed Relay Runtime
// Description: Store-backed components of the relay engine.
// Purpose: Provide the destination registry, signing key store, and nonce ledger.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime components wrap a shared [`crate::interfaces::ConfigStore`] with
//! the namespacing, validation, and locking rules of each relay resource.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod keys;
pub mod ledger;
pub mod registry;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use keys::CLIENT_IDENTITY_KEY;
pub use keys::KeyPair;
pub use keys::SIGNING_KEYS_KEY;
pub use keys::SigningKeyStore;
pub use ledger::NonceLease;
pub use ledger::NonceLedger;
pub use ledger::VERIFY_PREFIX;
pub use registry::DESTINATION_PREFIX;
pub use registry::DestinationRegistry;
pub use registry::WriteOutcome;
pub use store::InMemoryConfigStore;
