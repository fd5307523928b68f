// crates/signed-relay-config/src/lib.rs
// ============================================================================
// Module: Signed Relay Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for signed-relay.toml semantics.
// Dependencies: signed-relay-core, signed-relay-broker, serde, toml
// ============================================================================

//! ## Overview
//! `signed-relay-config` defines the configuration model for the relay host:
//! which stores back the registry and the verification ledger, dispatcher
//! limits, and where audit events go. Validation is strict and fail-closed.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
