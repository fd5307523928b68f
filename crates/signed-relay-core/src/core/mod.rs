// crates/signed-relay-core/src/core/mod.rs
// ============================================================================
// Module: Signed Relay Core Types
// Description: Data model, errors, and cryptographic helpers for the relay.
// Purpose: Group the transport-independent building blocks of a relay call.
// Dependencies: crate::core::*
// ============================================================================

//! ## Overview
//! Core types model what leaves the process: a [`Destination`] decides which
//! caller parameters may flow, a [`Document`] carries them, and a
//! [`SignedEnvelope`] binds the document to the broker's signing key.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod destination;
pub mod document;
pub mod error;
pub mod hashing;
pub mod pem;
pub mod signing;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use destination::AllowList;
pub use destination::DEFAULT_MAX_TIMEOUT_SECS;
pub use destination::DEFAULT_TIMEOUT_SECS;
pub use destination::Destination;
pub use destination::DestinationInput;
pub use destination::TargetName;
pub use document::CallerRequest;
pub use document::Clock;
pub use document::Document;
pub use document::DocumentBuilder;
pub use document::Nonce;
pub use document::NonceSource;
pub use document::OsNonceSource;
pub use document::SystemClock;
pub use error::RelayError;
pub use signing::SIGNING_ALGORITHM;
pub use signing::SignedEnvelope;
pub use signing::sign_document;
pub use signing::verify_envelope;
pub use signing::verify_key_pair;
