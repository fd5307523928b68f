// crates/signed-relay-broker/src/lib.rs
// ============================================================================
// Module: Signed Relay Broker Library
// Description: Outbound dispatch and relay orchestration for Signed Relay.
// Purpose: Wire the core engine to HTTP transport and audit sinks.
// Dependencies: signed-relay-core, reqwest, serde
// ============================================================================

//! ## Overview
//! Signed Relay Broker provides the [`HttpDispatcher`] transport and the
//! [`RelayBroker`] that runs contact and ping flows end to end.
//! Invariants:
//! - Every contact records its envelope in the nonce ledger before dispatch
//!   and removes it after dispatch returns.
//! - Non-2xx responses are returned as data, never as errors.
//! - Response bodies are capped at the configured byte limit.
//!
//! Security posture: destinations and their responses are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod dispatch;
pub mod relay;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::RelayAuditEvent;
pub use audit::RelayAuditEventParams;
pub use audit::RelayAuditSink;
pub use audit::RelayOutcome;
pub use audit::StderrAuditSink;
pub use dispatch::DEFAULT_MAX_RESPONSE_BYTES;
pub use dispatch::DEFAULT_USER_AGENT;
pub use dispatch::DispatchError;
pub use dispatch::DispatchRequest;
pub use dispatch::DispatchResponse;
pub use dispatch::Dispatcher;
pub use dispatch::HttpDispatcher;
pub use dispatch::MAX_RESPONSE_BYTES_LIMIT;
pub use relay::BuildError;
pub use relay::PingReport;
pub use relay::RelayBroker;
pub use relay::RelayBrokerBuilder;
pub use relay::RelayResponse;
