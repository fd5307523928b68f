// crates/signed-relay-core/src/runtime/store.rs
// ============================================================================
// Module: Signed Relay In-Memory Store
// Description: Simple in-memory configuration store for tests and local runs.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides a simple in-memory implementation of [`ConfigStore`]
//! for tests and single-process runs. Contents are lost when the process exits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::interfaces::ConfigStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory configuration store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConfigStore {
    /// Entry map protected by a mutex.
    entries: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryConfigStore {
    /// Creates a new in-memory configuration store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| StoreError::Store("config store mutex poisoned".to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::Invalid("store key must not be empty".to_string()));
        }
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| StoreError::Store("config store mutex poisoned".to_string()))?;
        guard.insert(key.to_string(), value.to_vec());
        drop(guard);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| StoreError::Store("config store mutex poisoned".to_string()))?;
        guard.remove(key);
        drop(guard);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| StoreError::Store("config store mutex poisoned".to_string()))?;
        let keys = guard
            .range(prefix.to_string()..)
            .map_while(|(key, _)| key.strip_prefix(prefix).map(str::to_string))
            .collect();
        drop(guard);
        Ok(keys)
    }
}
