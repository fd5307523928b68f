// crates/signed-relay-broker/tests/relay/contact_tests.rs
// ============================================================================
// Module: Contact Flow Tests
// Description: End-to-end tests for the contact operation.
// Purpose: Validate allow-list filtering, key gating, and nonce lifetime.
// Dependencies: signed-relay-broker, signed-relay-core
// ============================================================================

//! ## Overview
//! Exercises [`signed_relay_broker::RelayBroker::contact`] with a recording
//! dispatcher and with a real local HTTP destination.

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
use std::sync::Arc;
use std::time::Duration;

use signed_relay_broker::DispatchError;
use signed_relay_broker::RelayBroker;
use signed_relay_broker::RelayOutcome;
use signed_relay_core::CallerRequest;
use signed_relay_core::ConfigStore;
use signed_relay_core::DestinationInput;
use signed_relay_core::DocumentBuilder;
use signed_relay_core::InMemoryConfigStore;
use signed_relay_core::RelayError;
use signed_relay_core::verify_envelope;

use super::common::FIXED_NOW;
use super::common::FixedClock;
use super::common::Harness;
use super::common::OTHER_CERT;
use super::common::RELAY_CERT;
use super::common::RELAY_KEY;
use super::common::RecordingDispatcher;
use super::common::RepeatingNonce;
use super::common::Reply;
use super::common::fixed_documents;
use super::common::spawn_http_server;

/// Registers the `svc` destination used by scenario tests.
fn register_svc(broker: &RelayBroker, send_entity_id: bool) {
    broker
        .write_destination(
            "svc",
            DestinationInput {
                target_url: Some("https://example.test/hook".to_string()),
                params: Some(vec!["amount".to_string()]),
                send_entity_id: Some(send_entity_id),
                ..DestinationInput::default()
            },
        )
        .expect("register svc");
}

/// Caller request carrying one allowed and one unknown parameter.
fn caller() -> CallerRequest {
    CallerRequest::new("req-1")
        .with_entity_id("entity-42")
        .with_param("amount", "10")
        .with_param("extra", "ignored")
}

// ============================================================================
// SECTION: Allow-List Scenarios
// ============================================================================

/// Tests only allow-listed parameters reach the signed document.
#[test]
fn contact_sends_only_allow_listed_params() {
    let harness = Harness::new(RecordingDispatcher::responding(200, b"accepted"));
    register_svc(&harness.broker, true);

    let response = harness.broker.contact("svc", &caller()).expect("contact");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"accepted");
    let requests = harness.dispatcher.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "https://example.test/hook");
    let envelope = String::from_utf8(requests[0].body.clone()).unwrap();
    let document = verify_envelope(&envelope, RELAY_CERT).expect("verify");
    let expected: BTreeMap<String, String> =
        [("amount".to_string(), "10".to_string())].into_iter().collect();
    assert_eq!(document.params, expected);
    assert_eq!(document.nonce, response.nonce);
    assert_eq!(document.path, "svc");
    assert_eq!(document.request_id, "req-1");
    assert_eq!(document.entity_id.as_deref(), Some("entity-42"));
    assert_eq!(document.timestamp, FIXED_NOW);
}

/// Tests the entity id is withheld when the destination disables it.
#[test]
fn contact_omits_entity_id_when_disabled() {
    let harness = Harness::new(RecordingDispatcher::responding(200, b""));
    register_svc(&harness.broker, false);

    harness.broker.contact("svc", &caller()).expect("contact");

    let envelope = String::from_utf8(harness.dispatcher.requests()[0].body.clone()).unwrap();
    let document = verify_envelope(&envelope, RELAY_CERT).expect("verify");
    assert_eq!(document.entity_id, None);
    assert!(!envelope.is_empty());
}

/// Tests envelopes verify only against the signing certificate.
#[test]
fn contact_envelope_verifies_with_published_certificate() {
    let harness = Harness::new(RecordingDispatcher::responding(200, b""));
    register_svc(&harness.broker, true);

    harness.broker.contact("svc", &caller()).expect("contact");

    let envelope = String::from_utf8(harness.dispatcher.requests()[0].body.clone()).unwrap();
    let certificate = harness.broker.signing_certificate().expect("certificate");
    assert!(verify_envelope(&envelope, &certificate).is_ok());
    assert!(matches!(
        verify_envelope(&envelope, OTHER_CERT),
        Err(RelayError::Verification(_))
    ));
}

/// Tests destination transport settings are passed to the dispatcher.
#[test]
fn contact_forwards_destination_transport_settings() {
    let harness = Harness::new(RecordingDispatcher::responding(200, b""));
    harness
        .broker
        .write_destination(
            "svc",
            DestinationInput {
                target_url: Some("https://example.test/hook".to_string()),
                timeout_secs: Some(7),
                follow_redirects: Some(true),
                ..DestinationInput::default()
            },
        )
        .unwrap();

    harness.broker.contact("svc", &caller()).expect("contact");

    let request = &harness.dispatcher.requests()[0];
    assert_eq!(request.timeout, Duration::from_secs(7));
    assert!(request.follow_redirects);
    assert_eq!(request.trust_anchor, None);
    assert!(request.client_identity.is_none());
}

// ============================================================================
// SECTION: Failure Gating
// ============================================================================

/// Tests no HTTP call happens before signing keys are installed.
#[test]
fn contact_without_keys_fails_before_dispatch() {
    let harness = Harness::without_keys(RecordingDispatcher::responding(200, b""));
    register_svc(&harness.broker, true);

    let err = harness.broker.contact("svc", &caller()).expect_err("no keys");

    assert!(matches!(err, RelayError::KeyNotConfigured(_)), "unexpected error: {err:?}");
    assert!(harness.dispatcher.requests().is_empty());
    let events = harness.audit.named("contact");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, RelayOutcome::Error);
    assert_eq!(events[0].error_kind, Some("key_not_configured"));
}

/// Tests contacting an unknown destination fails with not found.
#[test]
fn contact_unknown_destination_is_not_found() {
    let harness = Harness::new(RecordingDispatcher::responding(200, b""));

    let err = harness.broker.contact("missing", &caller()).expect_err("missing");

    assert!(matches!(err, RelayError::NotFound(_)), "unexpected error: {err:?}");
    assert!(harness.dispatcher.requests().is_empty());
}

/// Tests non-2xx responses are returned as data.
#[test]
fn contact_returns_error_status_as_data() {
    let harness = Harness::new(RecordingDispatcher::responding(500, b"boom"));
    register_svc(&harness.broker, true);

    let response = harness.broker.contact("svc", &caller()).expect("contact");

    assert_eq!(response.status, 500);
    assert_eq!(response.body, b"boom");
}

/// Tests transport timeouts surface as timeout errors.
#[test]
fn contact_propagates_transport_timeout() {
    let harness = Harness::new(RecordingDispatcher::with_result(Err(DispatchError::Timeout(
        "deadline".to_string(),
    ))));
    register_svc(&harness.broker, true);

    let err = harness.broker.contact("svc", &caller()).expect_err("timeout");

    assert!(matches!(err, RelayError::TransportTimeout(_)), "unexpected error: {err:?}");
}

// ============================================================================
// SECTION: Nonce Ledger Lifetime
// ============================================================================

/// Tests the envelope is fetchable during dispatch and removed afterwards.
#[test]
fn contact_holds_ledger_entry_for_dispatch_duration() {
    let harness = Harness::new(RecordingDispatcher::responding(200, b""));
    register_svc(&harness.broker, true);

    let response = harness.broker.contact("svc", &caller()).expect("contact");

    let request = &harness.dispatcher.requests()[0];
    assert_eq!(
        request.ledger_entries,
        vec![(response.nonce.as_str().to_string(), request.body.clone())]
    );
    assert_eq!(harness.broker.fetch_verification(response.nonce.as_str()).unwrap(), None);
}

/// Tests the ledger entry is removed after a failed dispatch.
#[test]
fn contact_releases_ledger_entry_after_transport_failure() {
    let harness = Harness::new(RecordingDispatcher::with_result(Err(DispatchError::Transport(
        "connection refused".to_string(),
    ))));
    register_svc(&harness.broker, true);

    let err = harness.broker.contact("svc", &caller()).expect_err("transport");

    assert!(matches!(err, RelayError::Transport(_)));
    assert_eq!(harness.dispatcher.requests()[0].ledger_entries.len(), 1);
    assert!(harness.store.list("verify/").unwrap().is_empty());
}

/// Tests a nonce collision aborts before dispatch.
#[test]
fn contact_rejects_nonce_collision() {
    let documents = DocumentBuilder::new(Arc::new(RepeatingNonce("fixed")), Arc::new(FixedClock));
    let harness = Harness::with_documents(RecordingDispatcher::responding(200, b""), documents);
    register_svc(&harness.broker, true);
    harness.store.put("verify/fixed", b"in flight").unwrap();

    let err = harness.broker.contact("svc", &caller()).expect_err("collision");

    assert!(matches!(err, RelayError::NonceGeneration(_)), "unexpected error: {err:?}");
    assert!(harness.dispatcher.requests().is_empty());
    assert_eq!(harness.store.get("verify/fixed").unwrap(), Some(b"in flight".to_vec()));
}

/// Tests verification records go to a separate store when configured.
#[test]
fn contact_uses_dedicated_verify_store() {
    let config = Arc::new(InMemoryConfigStore::new());
    let verify = Arc::new(InMemoryConfigStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::responding(200, b"").probing(verify.clone()));
    let broker = RelayBroker::builder()
        .store(config.clone())
        .verify_store(verify.clone())
        .dispatcher(dispatcher.clone())
        .documents(fixed_documents())
        .build()
        .unwrap();
    broker.install_signing_keys(RELAY_CERT, RELAY_KEY).unwrap();
    register_svc(&broker, true);

    broker.contact("svc", &caller()).expect("contact");

    assert_eq!(dispatcher.requests()[0].ledger_entries.len(), 1);
    assert!(config.list("verify/").unwrap().is_empty());
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Tests contact audit events carry metadata but no parameter values.
#[test]
fn contact_audit_event_omits_sensitive_values() {
    let harness = Harness::new(RecordingDispatcher::responding(202, b"queued"));
    register_svc(&harness.broker, true);

    let response = harness.broker.contact("svc", &caller()).expect("contact");

    let events = harness.audit.named("contact");
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.outcome, RelayOutcome::Ok);
    assert_eq!(event.status, Some(202));
    assert_eq!(event.target.as_deref(), Some("svc"));
    assert_eq!(event.request_id.as_deref(), Some("req-1"));
    assert_eq!(event.nonce.as_deref(), Some(response.nonce.as_str()));
    assert_eq!(event.response_bytes, 6);
    assert!(event.request_bytes > 0);
    assert!(event.envelope_hash.is_some());
    let rendered = serde_json::to_string(event).unwrap();
    assert!(!rendered.contains("entity-42"));
    assert!(!rendered.contains("queued"));
    assert!(!rendered.contains("PRIVATE KEY"));
}

// ============================================================================
// SECTION: Live HTTP Destination
// ============================================================================

/// Tests a full contact against a local HTTP destination.
#[test]
fn contact_reaches_local_http_destination() {
    let (base, handle) = spawn_http_server(vec![Reply::new(201, b"created")]);
    let store = Arc::new(InMemoryConfigStore::new());
    let broker = RelayBroker::builder()
        .store(store)
        .documents(fixed_documents())
        .build()
        .unwrap();
    broker.install_signing_keys(RELAY_CERT, RELAY_KEY).unwrap();
    broker
        .write_destination(
            "local/hook",
            DestinationInput {
                target_url: Some(format!("{base}/hook")),
                params: Some(vec!["Amount".to_string()]),
                ..DestinationInput::default()
            },
        )
        .unwrap();

    let response = broker
        .contact("local/hook", &CallerRequest::new("req-9").with_param("AMOUNT", "5"))
        .expect("contact");
    let observed = handle.join().unwrap();

    assert_eq!(response.status, 201);
    assert_eq!(response.body, b"created");
    assert_eq!(observed[0].path, "/hook");
    let envelope = String::from_utf8(observed[0].body.clone()).unwrap();
    let document = verify_envelope(&envelope, RELAY_CERT).expect("verify");
    assert_eq!(document.params.get("amount").map(String::as_str), Some("5"));
    assert_eq!(document.path, "local/hook");
}
