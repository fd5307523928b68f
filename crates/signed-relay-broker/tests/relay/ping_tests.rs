// crates/signed-relay-broker/tests/relay/ping_tests.rs
// ============================================================================
// Module: Ping Flow Tests
// Description: Tests for the reachability ping operation.
// Purpose: Validate minimal documents, reachability classification, and errors.
// Dependencies: signed-relay-broker, signed-relay-core
// ============================================================================

//! ## Overview
//! Exercises [`signed_relay_broker::RelayBroker::ping`].

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;

use signed_relay_broker::DispatchError;
use signed_relay_core::CallerRequest;
use signed_relay_core::DestinationInput;
use signed_relay_core::RelayError;
use signed_relay_core::verify_envelope;

use super::common::Harness;
use super::common::RELAY_CERT;
use super::common::RecordingDispatcher;

/// Registers a destination with an allow-list and metadata.
fn register(harness: &Harness) {
    let metadata: BTreeMap<String, String> =
        [("tenant".to_string(), "acme".to_string())].into_iter().collect();
    harness
        .broker
        .write_destination(
            "svc",
            DestinationInput {
                target_url: Some("https://example.test/hook".to_string()),
                params: Some(vec!["amount".to_string()]),
                metadata: Some(metadata),
                ..DestinationInput::default()
            },
        )
        .unwrap();
}

/// Tests ping sends a minimal signed document.
#[test]
fn ping_sends_minimal_document() {
    let harness = Harness::new(RecordingDispatcher::responding(204, b""));
    register(&harness);

    let report = harness.broker.ping("svc", "ping-1").expect("ping");

    assert_eq!(report.status, 204);
    assert!(report.reachable);
    let envelope = String::from_utf8(harness.dispatcher.requests()[0].body.clone()).unwrap();
    let document = verify_envelope(&envelope, RELAY_CERT).expect("verify");
    assert_eq!(document.request_id, "ping-1");
    assert_eq!(document.path, "svc");
    assert!(document.params.is_empty());
    assert!(document.metadata.is_empty());
    assert_eq!(document.entity_id, None);
}

/// Tests redirects count as reachable and server errors do not.
#[test]
fn ping_classifies_reachability_by_status() {
    for (status, reachable) in [(200, true), (302, true), (404, false), (503, false)] {
        let harness = Harness::new(RecordingDispatcher::responding(status, b"ignored"));
        register(&harness);

        let report = harness.broker.ping("svc", "ping").expect("ping");

        assert_eq!(report.status, status);
        assert_eq!(report.reachable, reachable, "status {status}");
    }
}

/// Tests ping surfaces transport failures as errors.
#[test]
fn ping_propagates_transport_failure() {
    let harness = Harness::new(RecordingDispatcher::with_result(Err(DispatchError::Transport(
        "dns failure".to_string(),
    ))));
    register(&harness);

    let err = harness.broker.ping("svc", "ping").expect_err("transport");

    assert!(matches!(err, RelayError::Transport(_)), "unexpected error: {err:?}");
    assert_eq!(harness.audit.named("ping").len(), 1);
}

/// Tests ping requires signing keys like contact.
#[test]
fn ping_without_keys_fails_before_dispatch() {
    let harness = Harness::without_keys(RecordingDispatcher::responding(200, b""));
    register(&harness);

    let err = harness.broker.ping("svc", "ping").expect_err("no keys");

    assert!(matches!(err, RelayError::KeyNotConfigured(_)));
    assert!(harness.dispatcher.requests().is_empty());
}

/// Tests ping and contact mint distinct nonces and clean up both.
#[test]
fn ping_and_contact_use_distinct_nonces() {
    let harness = Harness::new(RecordingDispatcher::responding(200, b""));
    register(&harness);

    harness.broker.ping("svc", "ping").expect("ping");
    let response = harness.broker.contact("svc", &CallerRequest::new("req")).expect("contact");

    let requests = harness.dispatcher.requests();
    assert_eq!(requests.len(), 2);
    assert_ne!(requests[0].ledger_entries[0].0, requests[1].ledger_entries[0].0);
    assert_eq!(requests[1].ledger_entries[0].0, response.nonce.as_str());
    assert!(harness.broker.fetch_verification(response.nonce.as_str()).unwrap().is_none());
}
