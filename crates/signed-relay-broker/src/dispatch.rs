// crates/signed-relay-broker/src/dispatch.rs
// ============================================================================
// Module: Signed Relay Dispatcher
// Description: Outbound HTTP POST of signed envelopes.
// Purpose: Apply per-destination trust anchor, redirect, and timeout policy.
// Dependencies: signed-relay-core, reqwest, thiserror
// ============================================================================

//! ## Overview
//! [`HttpDispatcher`] posts one signed envelope per call and returns the raw
//! status and body. A client is built per request because trust anchor,
//! redirect policy, timeout, and client identity vary by destination.
//! Invariants:
//! - Without a pinned trust anchor the operating system trust store is used.
//! - A pinned trust anchor replaces the system roots entirely.
//! - With redirects disabled, a 3xx response is returned as the final response.
//! - Bodies larger than the configured cap are rejected, never truncated.
//!
//! Security posture: destination responses are untrusted and size-limited.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error as StdError;
use std::io;
use std::io::Read;
use std::time::Duration;

use reqwest::Certificate;
use reqwest::Identity;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use signed_relay_core::KeyPair;
use signed_relay_core::RelayError;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default cap on response body size.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;
/// Hard upper bound for the configurable response cap.
pub const MAX_RESPONSE_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("signed-relay/", env!("CARGO_PKG_VERSION"));
/// Content type of a compact JWS body.
pub const ENVELOPE_CONTENT_TYPE: &str = "application/jose";
/// Redirect hop limit when redirects are followed.
const MAX_REDIRECTS: usize = 10;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by dispatchers.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The pinned CA bundle could not be loaded.
    #[error("invalid trust anchor: {0}")]
    TrustAnchor(String),
    /// The TLS client identity could not be loaded.
    #[error("invalid client identity: {0}")]
    ClientIdentity(String),
    /// The HTTP client could not be constructed.
    #[error("http client build failed: {0}")]
    Client(String),
    /// Network, TLS, or body read failure.
    #[error("http request failed: {0}")]
    Transport(String),
    /// The round trip exceeded its timeout.
    #[error("http request timed out: {0}")]
    Timeout(String),
    /// The response body exceeded the configured cap.
    #[error("response exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Observed or declared size in bytes.
        actual_bytes: usize,
    },
}

impl From<DispatchError> for RelayError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::TrustAnchor(_) | DispatchError::ClientIdentity(_) => {
                Self::CryptoConfig(err.to_string())
            }
            DispatchError::Timeout(_) => Self::TransportTimeout(err.to_string()),
            DispatchError::Client(_)
            | DispatchError::Transport(_)
            | DispatchError::TooLarge {
                ..
            } => Self::Transport(err.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Request and Response
// ============================================================================

/// One outbound POST.
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    /// Target URL.
    pub url: &'a str,
    /// Signed envelope bytes.
    pub body: &'a [u8],
    /// Whether redirects are followed.
    pub follow_redirects: bool,
    /// Round-trip timeout.
    pub timeout: Duration,
    /// Pinned CA bundle replacing the system roots.
    pub trust_anchor: Option<&'a str>,
    /// TLS client identity presented to the destination.
    pub client_identity: Option<&'a KeyPair>,
}

/// Raw destination response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, verbatim.
    pub body: Vec<u8>,
}

/// Outbound transport for signed envelopes.
pub trait Dispatcher: Send + Sync {
    /// Sends one envelope and returns the raw response.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] on any transport failure; HTTP status codes
    /// are never errors.
    fn send(&self, request: &DispatchRequest<'_>) -> Result<DispatchResponse, DispatchError>;
}

// ============================================================================
// SECTION: HTTP Dispatcher
// ============================================================================

/// Blocking HTTP dispatcher backed by `reqwest` with rustls.
///
/// # Invariants
/// - `max_response_bytes` is at most [`MAX_RESPONSE_BYTES_LIMIT`].
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    /// Response body cap in bytes.
    max_response_bytes: usize,
    /// `User-Agent` header value.
    user_agent: String,
}

impl Default for HttpDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpDispatcher {
    /// Creates a dispatcher with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Sets the response body cap, clamped to [`MAX_RESPONSE_BYTES_LIMIT`].
    #[must_use]
    pub fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes.min(MAX_RESPONSE_BYTES_LIMIT);
        self
    }

    /// Returns the effective response body cap.
    #[must_use]
    pub const fn max_response_bytes(&self) -> usize {
        self.max_response_bytes
    }

    /// Sets the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Builds a client for one request's transport policy.
    fn client_for(&self, request: &DispatchRequest<'_>) -> Result<Client, DispatchError> {
        let redirect =
            if request.follow_redirects { Policy::limited(MAX_REDIRECTS) } else { Policy::none() };
        let mut builder = Client::builder()
            .use_rustls_tls()
            .redirect(redirect)
            .timeout(request.timeout)
            .user_agent(self.user_agent.clone());
        if let Some(pem) = request.trust_anchor {
            let certificates = Certificate::from_pem_bundle(pem.as_bytes())
                .map_err(|err| DispatchError::TrustAnchor(err.to_string()))?;
            if certificates.is_empty() {
                return Err(DispatchError::TrustAnchor("no certificates in bundle".to_string()));
            }
            builder = builder.tls_built_in_root_certs(false);
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }
        if let Some(identity) = request.client_identity {
            let mut pem = identity.certificate.clone();
            if !pem.ends_with('\n') {
                pem.push('\n');
            }
            pem.push_str(&identity.private_key);
            let identity = Identity::from_pem(pem.as_bytes())
                .map_err(|err| DispatchError::ClientIdentity(err.to_string()))?;
            builder = builder.identity(identity);
        }
        builder.build().map_err(|err| DispatchError::Client(error_chain(&err)))
    }
}

impl Dispatcher for HttpDispatcher {
    fn send(&self, request: &DispatchRequest<'_>) -> Result<DispatchResponse, DispatchError> {
        let client = self.client_for(request)?;
        let response = client
            .post(request.url)
            .header(CONTENT_TYPE, ENVELOPE_CONTENT_TYPE)
            .body(request.body.to_vec())
            .send()
            .map_err(|err| classify_request_error(&err))?;
        let status = response.status().as_u16();

        let max_bytes = u64::try_from(self.max_response_bytes).unwrap_or(u64::MAX);
        if let Some(length) = response.content_length()
            && length > max_bytes
        {
            return Err(DispatchError::TooLarge {
                max_bytes: self.max_response_bytes,
                actual_bytes: usize::try_from(length).unwrap_or(usize::MAX),
            });
        }
        let mut limited = response.take(max_bytes.saturating_add(1));
        let mut body = Vec::new();
        limited.read_to_end(&mut body).map_err(|err| classify_read_error(&err))?;
        if body.len() > self.max_response_bytes {
            return Err(DispatchError::TooLarge {
                max_bytes: self.max_response_bytes,
                actual_bytes: body.len(),
            });
        }
        Ok(DispatchResponse {
            status,
            body,
        })
    }
}

// ============================================================================
// SECTION: Error Classification
// ============================================================================

/// Maps a request error to a timeout or transport failure.
fn classify_request_error(err: &reqwest::Error) -> DispatchError {
    if err.is_timeout() {
        DispatchError::Timeout(error_chain(err))
    } else {
        DispatchError::Transport(error_chain(err))
    }
}

/// Maps a body read error to a timeout or transport failure.
fn classify_read_error(err: &io::Error) -> DispatchError {
    let timed_out = err.kind() == io::ErrorKind::TimedOut
        || err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
            .is_some_and(reqwest::Error::is_timeout);
    if timed_out {
        DispatchError::Timeout(err.to_string())
    } else {
        DispatchError::Transport(err.to_string())
    }
}

/// Renders an error with its source chain.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
