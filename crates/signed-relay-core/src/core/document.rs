// crates/signed-relay-core/src/core/document.rs
// ============================================================================
// Module: Signed Relay Documents
// Description: Per-invocation outbound documents and their construction.
// Purpose: Apply the destination allow-list and mint a fresh nonce per call.
// Dependencies: rand, serde, time, uuid
// ============================================================================

//! ## Overview
//! [`DocumentBuilder`] turns a [`CallerRequest`] and a [`Destination`] into a
//! [`Document`]. Only allow-listed parameters survive; every other caller key
//! is dropped without error. Nonces and timestamps come from injectable
//! sources so tests can pin them.
//!
//! Invariants:
//! - `Document::params` keys are always lower-cased allow-list members.
//! - `Document::entity_id` is absent when the destination disables it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::destination::AllowList;
use crate::core::destination::Destination;
use crate::core::destination::TargetName;
use crate::core::error::RelayError;

// ============================================================================
// SECTION: Nonce
// ============================================================================

/// Single-use token identifying one document instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    /// Wraps a nonce string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the nonce as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Source of fresh nonces.
pub trait NonceSource: Send + Sync {
    /// Returns a nonce that has never been returned before.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NonceGeneration`] when randomness is unavailable.
    fn next_nonce(&self) -> Result<Nonce, RelayError>;
}

/// Nonce source backed by the operating system RNG (UUID v4 format).
#[derive(Debug, Default, Clone, Copy)]
pub struct OsNonceSource;

impl NonceSource for OsNonceSource {
    fn next_nonce(&self) -> Result<Nonce, RelayError> {
        let mut bytes = [0_u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|err| RelayError::NonceGeneration(err.to_string()))?;
        let id = uuid::Builder::from_random_bytes(bytes).into_uuid();
        Ok(Nonce::new(id.hyphenated().to_string()))
    }
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Wall-clock source for document timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current Unix time in seconds.
    fn unix_seconds(&self) -> i64;
}

/// System UTC clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_seconds(&self) -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

// ============================================================================
// SECTION: Caller Request
// ============================================================================

/// Caller context for one relay invocation.
///
/// The caller is authenticated upstream; `entity_id` is an opaque token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerRequest {
    /// Correlation identifier supplied by the host.
    pub request_id: String,
    /// Opaque caller identity, when known.
    #[serde(default)]
    pub entity_id: Option<String>,
    /// Caller-supplied parameters before allow-list filtering.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl CallerRequest {
    /// Creates a request with no identity and no parameters.
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            entity_id: None,
            params: BTreeMap::new(),
        }
    }

    /// Sets the caller identity.
    #[must_use]
    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Adds one caller parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// SECTION: Document
// ============================================================================

/// Outbound payload signed and posted to a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Replay-defense token for this instance.
    pub nonce: Nonce,
    /// Destination name the document was built for.
    pub path: String,
    /// Unix seconds at construction.
    pub timestamp: i64,
    /// Caller correlation identifier.
    pub request_id: String,
    /// Caller identity, when the destination allows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Allow-listed caller parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    /// Destination metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builds documents from destinations and caller requests.
#[derive(Clone)]
pub struct DocumentBuilder {
    /// Nonce source.
    nonces: Arc<dyn NonceSource>,
    /// Timestamp source.
    clock: Arc<dyn Clock>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new(Arc::new(OsNonceSource), Arc::new(SystemClock))
    }
}

impl DocumentBuilder {
    /// Creates a builder with explicit nonce and clock sources.
    #[must_use]
    pub fn new(nonces: Arc<dyn NonceSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            nonces,
            clock,
        }
    }

    /// Builds the document for one contact invocation.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NonceGeneration`] when no nonce can be minted.
    pub fn build(
        &self,
        destination: &Destination,
        request: &CallerRequest,
        target: &TargetName,
    ) -> Result<Document, RelayError> {
        let nonce = self.nonces.next_nonce()?;
        let entity_id =
            if destination.send_entity_id { request.entity_id.clone() } else { None };
        Ok(Document {
            nonce,
            path: target.as_str().to_string(),
            timestamp: self.clock.unix_seconds(),
            request_id: request.request_id.clone(),
            entity_id,
            params: filter_params(&destination.params, &request.params),
            metadata: destination.metadata.clone(),
        })
    }

    /// Builds the minimal document used for reachability pings.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NonceGeneration`] when no nonce can be minted.
    pub fn build_ping(
        &self,
        target: &TargetName,
        request_id: &str,
    ) -> Result<Document, RelayError> {
        Ok(Document {
            nonce: self.nonces.next_nonce()?,
            path: target.as_str().to_string(),
            timestamp: self.clock.unix_seconds(),
            request_id: request_id.to_string(),
            entity_id: None,
            params: BTreeMap::new(),
            metadata: BTreeMap::new(),
        })
    }
}

/// Keeps only allow-listed caller parameters, keyed by their lower-cased name.
///
/// When several caller keys fold to the same name, the exactly lower-cased
/// key wins; otherwise the first key in byte order wins.
#[must_use]
pub fn filter_params(
    allow: &AllowList,
    caller: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut filtered = BTreeMap::new();
    for (key, value) in caller {
        let folded = key.to_lowercase();
        if !allow.permits(&folded) {
            continue;
        }
        if folded == *key {
            filtered.insert(folded, value.clone());
        } else {
            filtered.entry(folded).or_insert_with(|| value.clone());
        }
    }
    filtered
}
