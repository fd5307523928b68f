// crates/signed-relay-core/src/core/error.rs
// ============================================================================
// Module: Signed Relay Errors
// Description: Error taxonomy shared by every relay operation.
// Purpose: Classify failures so hosts can tell operator, crypto, and transport faults apart.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every relay operation fails with a [`RelayError`]. Variants are stable and
//! carry human-readable context only; foreign error types never leak through.
//! Security posture: messages must never embed key material or parameter values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Relay Error
// ============================================================================

/// Errors raised by relay operations.
///
/// # Invariants
/// - [`RelayError::kind`] labels are stable and used in audit records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Operator input is missing or invalid.
    #[error("validation error: {0}")]
    Validation(String),
    /// A PEM certificate, key, or CA bundle failed to parse.
    #[error("crypto configuration error: {0}")]
    CryptoConfig(String),
    /// A destination or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// No signing key pair has been installed.
    #[error("signing key pair not configured: {0}")]
    KeyNotConfigured(String),
    /// Stored bytes failed to deserialize.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
    /// Nonce generation failed or produced a collision.
    #[error("nonce generation failed: {0}")]
    NonceGeneration(String),
    /// The signing operation failed.
    #[error("signing failed: {0}")]
    Signing(String),
    /// Network, TLS, or response read failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The outbound round trip exceeded its timeout.
    #[error("transport timeout: {0}")]
    TransportTimeout(String),
    /// The configuration store failed.
    #[error("store error: {0}")]
    Store(String),
    /// A signed envelope failed verification.
    #[error("verification failed: {0}")]
    Verification(String),
}

impl RelayError {
    /// Returns the stable snake-case label for this error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::CryptoConfig(_) => "crypto_config",
            Self::NotFound(_) => "not_found",
            Self::KeyNotConfigured(_) => "key_not_configured",
            Self::CorruptRecord(_) => "corrupt_record",
            Self::NonceGeneration(_) => "nonce_generation",
            Self::Signing(_) => "signing",
            Self::Transport(_) => "transport",
            Self::TransportTimeout(_) => "transport_timeout",
            Self::Store(_) => "store",
            Self::Verification(_) => "verification",
        }
    }
}

impl From<StoreError> for RelayError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Corrupt(message) => Self::CorruptRecord(message),
            other => Self::Store(other.to_string()),
        }
    }
}
