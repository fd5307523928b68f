// crates/signed-relay-core/src/core/pem.rs
// ============================================================================
// Module: Signed Relay PEM Parsing
// Description: Strict parsing of PEM certificates and private keys.
// Purpose: Reject malformed key material before anything is persisted.
// Dependencies: jsonwebtoken, rustls-pki-types, rustls-webpki
// ============================================================================

//! ## Overview
//! Certificates, CA bundles, and private keys enter the relay as PEM text.
//! These helpers parse them fully so configuration writes fail with
//! [`RelayError::CryptoConfig`] instead of surfacing at signing or dial time.
//! Security posture: PEM inputs are untrusted operator input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use jsonwebtoken::EncodingKey;
use rustls_pki_types::CertificateDer;
use rustls_pki_types::PrivateKeyDer;
use rustls_pki_types::pem::PemObject;

use crate::core::error::RelayError;

// ============================================================================
// SECTION: Certificates
// ============================================================================

/// Parses a PEM bundle into one or more X.509 certificates.
///
/// # Errors
///
/// Returns [`RelayError::CryptoConfig`] when the bundle contains no
/// certificate or any certificate fails to parse.
pub fn parse_certificates(pem: &str) -> Result<Vec<CertificateDer<'static>>, RelayError> {
    let certificates = CertificateDer::pem_slice_iter(pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| RelayError::CryptoConfig(format!("invalid certificate pem: {err}")))?;
    if certificates.is_empty() {
        return Err(RelayError::CryptoConfig("no certificate found in pem".to_string()));
    }
    for certificate in &certificates {
        webpki::EndEntityCert::try_from(certificate).map_err(|err| {
            RelayError::CryptoConfig(format!("certificate is not valid x.509: {err}"))
        })?;
    }
    Ok(certificates)
}

// ============================================================================
// SECTION: Private Keys
// ============================================================================

/// Parses a PEM private key of any supported type (PKCS#1, PKCS#8, SEC1).
///
/// # Errors
///
/// Returns [`RelayError::CryptoConfig`] when no private key can be parsed.
pub fn parse_private_key(pem: &str) -> Result<PrivateKeyDer<'static>, RelayError> {
    PrivateKeyDer::from_pem_slice(pem.as_bytes())
        .map_err(|err| RelayError::CryptoConfig(format!("invalid private key pem: {err}")))
}

/// Parses a PEM RSA private key into a signing key.
///
/// # Errors
///
/// Returns [`RelayError::CryptoConfig`] when the PEM is not an RSA private key.
pub fn parse_rsa_private_key(pem: &str) -> Result<EncodingKey, RelayError> {
    parse_private_key(pem)?;
    EncodingKey::from_rsa_pem(pem.as_bytes())
        .map_err(|err| RelayError::CryptoConfig(format!("invalid rsa private key: {err}")))
}
