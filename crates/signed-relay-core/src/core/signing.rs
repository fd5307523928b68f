// crates/signed-relay-core/src/core/signing.rs
// ============================================================================
// Module: Signed Relay Envelope Signing
// Description: RS512 compact JWS signing and verification of documents.
// Purpose: Bind each outbound document to the broker's signing key.
// Dependencies: base64, jsonwebtoken, rustls-webpki, serde_json
// ============================================================================

//! ## Overview
//! A [`SignedEnvelope`] is a compact JWS (`header.payload.signature`) whose
//! payload is the RFC 8785 canonical JSON of a [`Document`]. Signatures use
//! RSASSA-PKCS1-v1_5 with SHA-512 (`RS512`). Receivers verify with the
//! broker's public certificate via [`verify_envelope`].
//!
//! Security posture: envelopes arriving at [`verify_envelope`] are untrusted;
//! the algorithm is pinned and never taken from the header.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::Algorithm;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;

use crate::core::document::Document;
use crate::core::error::RelayError;
use crate::core::hashing::canonical_json_bytes;
use crate::core::pem::parse_certificates;
use crate::core::pem::parse_rsa_private_key;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Signing algorithm used for every envelope.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::RS512;
/// Message signed when checking that a private key matches its certificate.
const KEY_PAIR_CHALLENGE: &[u8] = b"signed-relay key pair challenge";

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Compact JWS carrying a signed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope(String);

impl SignedEnvelope {
    /// Returns the compact serialization.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the compact serialization as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

// ============================================================================
// SECTION: Signing
// ============================================================================

/// Signs a document with a PEM RSA private key.
///
/// # Errors
///
/// Returns [`RelayError::CryptoConfig`] when the key fails to parse and
/// [`RelayError::Signing`] when serialization or signing fails.
pub fn sign_document(document: &Document, private_key_pem: &str) -> Result<SignedEnvelope, RelayError> {
    let key = parse_rsa_private_key(private_key_pem)?;
    let header = canonical_json_bytes(&Header::new(SIGNING_ALGORITHM))
        .map_err(|err| RelayError::Signing(err.to_string()))?;
    let payload =
        canonical_json_bytes(document).map_err(|err| RelayError::Signing(err.to_string()))?;
    let signing_input =
        format!("{}.{}", URL_SAFE_NO_PAD.encode(header), URL_SAFE_NO_PAD.encode(payload));
    let signature = sign_bytes(signing_input.as_bytes(), &key)?;
    Ok(SignedEnvelope(format!("{signing_input}.{signature}")))
}

/// Produces a base64url RS512 signature over `message`.
fn sign_bytes(message: &[u8], key: &EncodingKey) -> Result<String, RelayError> {
    jsonwebtoken::crypto::sign(message, key, SIGNING_ALGORITHM)
        .map_err(|err| RelayError::Signing(err.to_string()))
}

/// Checks that a private key produces signatures the certificate accepts.
///
/// # Errors
///
/// Returns [`RelayError::CryptoConfig`] when either PEM fails to parse or the
/// key does not belong to the certificate.
pub fn verify_key_pair(certificate_pem: &str, private_key_pem: &str) -> Result<(), RelayError> {
    let certificates = parse_certificates(certificate_pem)?;
    let key = parse_rsa_private_key(private_key_pem)?;
    let signature = sign_bytes(KEY_PAIR_CHALLENGE, &key)
        .map_err(|err| RelayError::CryptoConfig(format!("private key cannot sign: {err}")))?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|err| RelayError::CryptoConfig(err.to_string()))?;
    let Some(leaf) = certificates.first() else {
        return Err(RelayError::CryptoConfig("no certificate found in pem".to_string()));
    };
    let certificate = webpki::EndEntityCert::try_from(leaf)
        .map_err(|err| RelayError::CryptoConfig(err.to_string()))?;
    certificate
        .verify_signature(webpki::ring::RSA_PKCS1_2048_8192_SHA512, KEY_PAIR_CHALLENGE, &signature)
        .map_err(|_| {
            RelayError::CryptoConfig("private key does not match certificate".to_string())
        })
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Verifies an envelope against a PEM certificate and returns its document.
///
/// # Errors
///
/// Returns [`RelayError::CryptoConfig`] when the certificate fails to parse and
/// [`RelayError::Verification`] when the envelope is malformed, declares a
/// different algorithm, or carries a bad signature.
pub fn verify_envelope(envelope: &str, certificate_pem: &str) -> Result<Document, RelayError> {
    let certificates = parse_certificates(certificate_pem)?;
    let Some(leaf) = certificates.first() else {
        return Err(RelayError::CryptoConfig("no certificate found in pem".to_string()));
    };
    let certificate = webpki::EndEntityCert::try_from(leaf)
        .map_err(|err| RelayError::CryptoConfig(err.to_string()))?;

    let mut segments = envelope.trim().split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(RelayError::Verification("envelope must have three segments".to_string()));
    };

    let header: Header = serde_json::from_slice(&decode_segment(header_b64, "header")?)
        .map_err(|err| RelayError::Verification(format!("invalid header: {err}")))?;
    if header.alg != SIGNING_ALGORITHM {
        return Err(RelayError::Verification("envelope algorithm must be RS512".to_string()));
    }

    let signature = decode_segment(signature_b64, "signature")?;
    let signing_input = format!("{header_b64}.{payload_b64}");
    certificate
        .verify_signature(
            webpki::ring::RSA_PKCS1_2048_8192_SHA512,
            signing_input.as_bytes(),
            &signature,
        )
        .map_err(|err| RelayError::Verification(format!("signature rejected: {err}")))?;

    serde_json::from_slice(&decode_segment(payload_b64, "payload")?)
        .map_err(|err| RelayError::Verification(format!("invalid payload: {err}")))
}

/// Decodes one base64url envelope segment.
fn decode_segment(segment: &str, label: &str) -> Result<Vec<u8>, RelayError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|err| RelayError::Verification(format!("invalid {label} encoding: {err}")))
}
