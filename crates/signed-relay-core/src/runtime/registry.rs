// crates/signed-relay-core/src/runtime/registry.rs
// ============================================================================
// Module: Signed Relay Destination Registry
// Description: Store-backed CRUD for destination records.
// Purpose: Validate and persist destinations under the `config/destination/` namespace.
// Dependencies: crate::{core, interfaces}, serde_json
// ============================================================================

//! ## Overview
//! The registry is the only writer of destination records. Writes validate the
//! full record before persisting it; reads fail closed on undecodable bytes.
//! Reads take no lock: a relay in flight may observe a slightly stale record.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::core::destination::DEFAULT_MAX_TIMEOUT_SECS;
use crate::core::destination::Destination;
use crate::core::destination::DestinationInput;
use crate::core::destination::TargetName;
use crate::core::error::RelayError;
use crate::interfaces::ConfigStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Store prefix for destination records.
pub const DESTINATION_PREFIX: &str = "config/destination/";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of a destination write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// No record existed; a new one was created.
    Created,
    /// An existing record was updated.
    Updated,
}

/// Destination registry backed by a [`ConfigStore`].
#[derive(Clone)]
pub struct DestinationRegistry {
    /// Backing store.
    store: Arc<dyn ConfigStore>,
    /// Largest accepted destination timeout.
    max_timeout_secs: u64,
}

// ============================================================================
// SECTION: Registry
// ============================================================================

impl DestinationRegistry {
    /// Creates a registry with the default timeout ceiling.
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            max_timeout_secs: DEFAULT_MAX_TIMEOUT_SECS,
        }
    }

    /// Overrides the largest accepted destination timeout.
    #[must_use]
    pub const fn with_max_timeout_secs(mut self, max_timeout_secs: u64) -> Self {
        self.max_timeout_secs = max_timeout_secs;
        self
    }

    /// Validates and persists a destination.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Validation`] or [`RelayError::CryptoConfig`] when
    /// validation fails, and [`RelayError::Store`] when the write fails.
    pub fn put(&self, name: &TargetName, mut destination: Destination) -> Result<(), RelayError> {
        destination.target_url = destination.target_url.trim().to_string();
        destination.target_ca = destination.trust_anchor().map(str::to_string);
        destination.validate(self.max_timeout_secs)?;
        let bytes = serde_json::to_vec(&destination)
            .map_err(|err| RelayError::Store(format!("failed to encode destination: {err}")))?;
        self.store.put(&record_key(name), &bytes)?;
        Ok(())
    }

    /// Loads a destination.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`] when absent and
    /// [`RelayError::CorruptRecord`] when the record fails to decode.
    pub fn get(&self, name: &TargetName) -> Result<Destination, RelayError> {
        let Some(bytes) = self.store.get(&record_key(name))? else {
            return Err(RelayError::NotFound(format!("destination '{name}'")));
        };
        serde_json::from_slice(&bytes)
            .map_err(|err| RelayError::CorruptRecord(format!("destination '{name}': {err}")))
    }

    /// Removes a destination; missing names are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] when the delete fails.
    pub fn delete(&self, name: &TargetName) -> Result<(), RelayError> {
        self.store.delete(&record_key(name))?;
        Ok(())
    }

    /// Lists registered destination names in store order.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] when the listing fails.
    pub fn list(&self) -> Result<Vec<String>, RelayError> {
        Ok(self.store.list(DESTINATION_PREFIX)?)
    }

    /// Returns true when a record exists for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] when the lookup fails.
    pub fn exists(&self, name: &TargetName) -> Result<bool, RelayError> {
        Ok(self.store.get(&record_key(name))?.is_some())
    }

    /// Creates or partially updates a destination from operator input.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Validation`] when a create omits `target_url`,
    /// plus every error [`Self::put`] and [`Self::get`] can return.
    pub fn write(
        &self,
        name: &TargetName,
        input: DestinationInput,
    ) -> Result<WriteOutcome, RelayError> {
        if self.exists(name)? {
            let current = self.get(name)?;
            self.put(name, input.overlay(current))?;
            Ok(WriteOutcome::Updated)
        } else {
            self.put(name, input.into_new()?)?;
            Ok(WriteOutcome::Created)
        }
    }
}

/// Returns the store key for a destination record.
fn record_key(name: &TargetName) -> String {
    format!("{DESTINATION_PREFIX}{name}")
}
