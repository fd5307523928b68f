// crates/signed-relay-core/src/core/destination.rs
// ============================================================================
// Module: Signed Relay Destinations
// Description: Operator-registered outbound targets and their allow-lists.
// Purpose: Model destination policy with normalization and fail-closed validation.
// Dependencies: serde, url
// ============================================================================

//! ## Overview
//! A [`Destination`] describes where a signed document is posted and which
//! caller parameters may travel with it. The [`AllowList`] is the trust
//! boundary: it only ever holds lower-cased, de-duplicated names and matches
//! caller keys case-insensitively.
//!
//! Invariants:
//! - [`TargetName`] values are validated at construction.
//! - [`AllowList`] contents are normalized on every construction path,
//!   including deserialization of stored records.
//!
//! Security posture: destination inputs come from operators but are still
//! validated fail-closed before persistence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use url::Url;

use crate::core::error::RelayError;
use crate::core::pem::parse_certificates;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default outbound round-trip timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Default upper bound accepted for a destination timeout.
pub const DEFAULT_MAX_TIMEOUT_SECS: u64 = 600;
/// Maximum target name length in bytes.
pub const MAX_TARGET_NAME_BYTES: usize = 256;

// ============================================================================
// SECTION: Target Name
// ============================================================================

/// Validated destination name.
///
/// # Invariants
/// - Non-empty, at most [`MAX_TARGET_NAME_BYTES`] bytes.
/// - No control characters, no empty or `..` segments between `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TargetName(String);

impl TargetName {
    /// Validates and wraps a destination name.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Validation`] when the name violates the invariants.
    pub fn new(name: impl Into<String>) -> Result<Self, RelayError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RelayError::Validation("destination name must not be empty".to_string()));
        }
        if name.len() > MAX_TARGET_NAME_BYTES {
            return Err(RelayError::Validation(format!(
                "destination name exceeds {MAX_TARGET_NAME_BYTES} bytes"
            )));
        }
        if name.chars().any(char::is_control) {
            return Err(RelayError::Validation(
                "destination name contains control characters".to_string(),
            ));
        }
        if name.split('/').any(|segment| segment.is_empty() || segment == "..") {
            return Err(RelayError::Validation(
                "destination name contains an empty or '..' segment".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Allow-List
// ============================================================================

/// Case-insensitive set of caller parameter names permitted in documents.
///
/// # Invariants
/// - Entries are trimmed, lower-cased, non-empty, and unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct AllowList(BTreeSet<String>);

impl AllowList {
    /// Builds an allow-list from raw names, normalizing each entry.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .map(|name| name.as_ref().trim().to_lowercase())
                .filter(|name| !name.is_empty())
                .collect(),
        )
    }

    /// Returns true when `name` matches an entry, ignoring case.
    #[must_use]
    pub fn permits(&self, name: &str) -> bool {
        self.0.contains(&name.to_lowercase())
    }

    /// Iterates the normalized names in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the number of permitted names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no names are permitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for AllowList {
    fn from(names: Vec<String>) -> Self {
        Self::new(names)
    }
}

impl From<AllowList> for Vec<String> {
    fn from(list: AllowList) -> Self {
        list.0.into_iter().collect()
    }
}

// ============================================================================
// SECTION: Destination
// ============================================================================

/// Persisted configuration for one outbound target.
///
/// # Invariants
/// - A stored destination has passed [`Destination::validate`].
/// - `target_ca`, when present, is a non-empty PEM certificate bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Endpoint receiving the signed document.
    pub target_url: String,
    /// Whether the caller identity is embedded in documents.
    #[serde(default = "default_send_entity_id")]
    pub send_entity_id: bool,
    /// Round-trip timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Whether HTTP redirects are followed.
    #[serde(default)]
    pub follow_redirects: bool,
    /// Caller parameters permitted in documents.
    #[serde(default)]
    pub params: AllowList,
    /// Operator metadata copied into every document.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// PEM bundle pinning TLS trust for this destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ca: Option<String>,
}

/// Serde default for `send_entity_id`.
const fn default_send_entity_id() -> bool {
    true
}

/// Serde default for `timeout_secs`.
const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Destination {
    /// Creates a destination with default policy for `target_url`.
    #[must_use]
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            send_entity_id: default_send_entity_id(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            follow_redirects: false,
            params: AllowList::default(),
            metadata: BTreeMap::new(),
            target_ca: None,
        }
    }

    /// Returns the round-trip timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the pinned CA bundle, if any.
    #[must_use]
    pub fn trust_anchor(&self) -> Option<&str> {
        self.target_ca.as_deref().filter(|pem| !pem.trim().is_empty())
    }

    /// Validates the destination for persistence.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Validation`] for a bad URL or timeout and
    /// [`RelayError::CryptoConfig`] when `target_ca` fails to parse.
    pub fn validate(&self, max_timeout_secs: u64) -> Result<(), RelayError> {
        validate_target_url(&self.target_url)?;
        if self.timeout_secs == 0 || self.timeout_secs > max_timeout_secs {
            return Err(RelayError::Validation(format!(
                "timeout must be between 1 and {max_timeout_secs} seconds"
            )));
        }
        if let Some(pem) = self.trust_anchor() {
            parse_certificates(pem)?;
        }
        Ok(())
    }
}

/// Validates an outbound target URL.
fn validate_target_url(target_url: &str) -> Result<(), RelayError> {
    let trimmed = target_url.trim();
    if trimmed.is_empty() {
        return Err(RelayError::Validation("target_url must not be empty".to_string()));
    }
    let url = Url::parse(trimmed)
        .map_err(|err| RelayError::Validation(format!("target_url is not a valid url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(RelayError::Validation("target_url must use http or https".to_string()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(RelayError::Validation("target_url must include a host".to_string()));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(RelayError::Validation(
            "target_url must not embed credentials".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Destination Input
// ============================================================================

/// Operator-supplied destination fields for a create or update.
///
/// Absent fields keep the stored value on update and take defaults on create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationInput {
    /// Endpoint receiving the signed document.
    #[serde(default)]
    pub target_url: Option<String>,
    /// Whether the caller identity is embedded in documents.
    #[serde(default)]
    pub send_entity_id: Option<bool>,
    /// Round-trip timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Whether HTTP redirects are followed.
    #[serde(default)]
    pub follow_redirects: Option<bool>,
    /// Caller parameters permitted in documents.
    #[serde(default)]
    pub params: Option<Vec<String>>,
    /// Operator metadata copied into every document.
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
    /// PEM bundle pinning TLS trust; an empty string clears the pin.
    #[serde(default)]
    pub target_ca: Option<String>,
}

impl DestinationInput {
    /// Builds a new destination, applying defaults for absent fields.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Validation`] when `target_url` is absent.
    pub fn into_new(self) -> Result<Destination, RelayError> {
        let Some(target_url) = self.target_url.clone() else {
            return Err(RelayError::Validation("target_url is required".to_string()));
        };
        Ok(self.overlay(Destination::new(target_url)))
    }

    /// Overlays the supplied fields onto an existing destination.
    #[must_use]
    pub fn overlay(self, mut base: Destination) -> Destination {
        if let Some(target_url) = self.target_url {
            base.target_url = target_url;
        }
        if let Some(send_entity_id) = self.send_entity_id {
            base.send_entity_id = send_entity_id;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            base.timeout_secs = timeout_secs;
        }
        if let Some(follow_redirects) = self.follow_redirects {
            base.follow_redirects = follow_redirects;
        }
        if let Some(params) = self.params {
            base.params = AllowList::new(params);
        }
        if let Some(metadata) = self.metadata {
            base.metadata = metadata;
        }
        if let Some(target_ca) = self.target_ca {
            base.target_ca = Some(target_ca).filter(|pem| !pem.trim().is_empty());
        }
        base
    }
}
