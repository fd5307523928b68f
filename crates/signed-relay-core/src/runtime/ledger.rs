// crates/signed-relay-core/src/runtime/ledger.rs
// ============================================================================
// Module: Signed Relay Nonce Ledger
// Description: Local-only verification records keyed by document nonce.
// Purpose: Let receivers fetch the exact signed bytes while a relay call is in flight.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Each contact records its signed envelope under `verify/<nonce>` before
//! dispatch and removes it after dispatch returns. [`NonceLease`] scopes
//! that lifetime: it is released explicitly once the response is in hand
//! and removes the entry on drop if the flow unwinds early.
//!
//! Invariants:
//! - [`NonceLedger::acquire`] never overwrites an existing entry.
//! - Absence on [`NonceLedger::fetch`] is a normal result, not an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::core::document::Nonce;
use crate::core::error::RelayError;
use crate::interfaces::ConfigStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Store prefix for verification records.
pub const VERIFY_PREFIX: &str = "verify/";

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Nonce ledger backed by a local [`ConfigStore`].
#[derive(Clone)]
pub struct NonceLedger {
    /// Backing store; never replicated.
    store: Arc<dyn ConfigStore>,
}

impl NonceLedger {
    /// Creates a ledger over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
        }
    }

    /// Stores an envelope under its nonce.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] when the write fails.
    pub fn record(&self, nonce: &Nonce, envelope: &[u8]) -> Result<(), RelayError> {
        self.store.put(&record_key(nonce.as_str()), envelope)?;
        Ok(())
    }

    /// Returns the envelope recorded for `nonce`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] when the read fails.
    pub fn fetch(&self, nonce: &str) -> Result<Option<Vec<u8>>, RelayError> {
        if nonce.is_empty() {
            return Ok(None);
        }
        Ok(self.store.get(&record_key(nonce))?)
    }

    /// Removes the entry for `nonce`; missing entries are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] when the delete fails.
    pub fn remove(&self, nonce: &Nonce) -> Result<(), RelayError> {
        self.store.delete(&record_key(nonce.as_str()))?;
        Ok(())
    }

    /// Records an envelope and returns a lease that removes it on release.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NonceGeneration`] when an entry already exists
    /// for `nonce`, and [`RelayError::Store`] when the store fails.
    pub fn acquire(&self, nonce: &Nonce, envelope: &[u8]) -> Result<NonceLease<'_>, RelayError> {
        if self.fetch(nonce.as_str())?.is_some() {
            return Err(RelayError::NonceGeneration(format!("nonce collision on {nonce}")));
        }
        self.record(nonce, envelope)?;
        Ok(NonceLease {
            ledger: self,
            nonce: nonce.clone(),
            released: false,
        })
    }
}

impl fmt::Debug for NonceLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonceLedger").finish_non_exhaustive()
    }
}

/// Returns the store key for a verification record.
fn record_key(nonce: &str) -> String {
    format!("{VERIFY_PREFIX}{nonce}")
}

// ============================================================================
// SECTION: Lease
// ============================================================================

/// Scoped ownership of one ledger entry.
///
/// # Invariants
/// - The entry is removed exactly once: by [`NonceLease::release`] or on drop.
#[derive(Debug)]
#[must_use = "dropping the lease removes the ledger entry immediately"]
pub struct NonceLease<'a> {
    /// Ledger holding the entry.
    ledger: &'a NonceLedger,
    /// Nonce of the leased entry.
    nonce: Nonce,
    /// Set once the entry has been removed.
    released: bool,
}

impl NonceLease<'_> {
    /// Returns the leased nonce.
    #[must_use]
    pub const fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Removes the entry and reports any store failure.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] when the delete fails.
    pub fn release(mut self) -> Result<(), RelayError> {
        self.released = true;
        self.ledger.remove(&self.nonce)
    }
}

impl Drop for NonceLease<'_> {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.ledger.remove(&self.nonce);
        }
    }
}
