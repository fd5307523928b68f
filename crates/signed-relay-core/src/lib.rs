// crates/signed-relay-core/src/lib.rs
// ============================================================================
// Module: Signed Relay Core Library
// Description: Public API surface for the Signed Relay core.
// Purpose: Expose destination, document, signing, and ledger primitives.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Signed Relay core owns the trust boundary of the relay: operator-registered
//! destinations with parameter allow-lists, outbound document construction,
//! RS512 envelope signing, and the nonce ledger used for out-of-band
//! verification. It is transport-agnostic; outbound HTTP lives in the broker
//! crate and persistence is reached through [`ConfigStore`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::ConfigStore;
pub use interfaces::StoreError;
pub use runtime::DestinationRegistry;
pub use runtime::InMemoryConfigStore;
pub use runtime::KeyPair;
pub use runtime::NonceLease;
pub use runtime::NonceLedger;
pub use runtime::SigningKeyStore;
pub use runtime::WriteOutcome;
