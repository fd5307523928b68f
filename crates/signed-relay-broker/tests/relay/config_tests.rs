// crates/signed-relay-broker/tests/relay/config_tests.rs
// ============================================================================
// Module: Host Configuration Tests
// Description: Tests for destination and key management operations.
// Purpose: Validate write/read/delete/list, key installation, and auditing.
// Dependencies: signed-relay-broker, signed-relay-core
// ============================================================================

//! ## Overview
//! Exercises the configuration side of [`signed_relay_broker::RelayBroker`].

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

use signed_relay_broker::BuildError;
use signed_relay_broker::RelayBroker;
use signed_relay_broker::RelayOutcome;
use signed_relay_core::ConfigStore;
use signed_relay_core::DestinationInput;
use signed_relay_core::RelayError;
use signed_relay_core::WriteOutcome;

use super::common::Harness;
use super::common::OTHER_CERT;
use super::common::RELAY_CERT;
use super::common::RELAY_KEY;
use super::common::RecordingDispatcher;

/// Builds a harness that never dispatches.
fn harness() -> Harness {
    Harness::without_keys(RecordingDispatcher::responding(200, b""))
}

/// Input carrying only a target URL.
fn url_only(url: &str) -> DestinationInput {
    DestinationInput {
        target_url: Some(url.to_string()),
        ..DestinationInput::default()
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Tests the builder requires a store.
#[test]
fn builder_requires_store() {
    assert_eq!(RelayBroker::builder().build().err(), Some(BuildError::MissingStore));
}

// ============================================================================
// SECTION: Destinations
// ============================================================================

/// Tests create then partial update semantics.
#[test]
fn write_destination_creates_then_updates() {
    let harness = harness();

    let created = harness.broker.write_destination("svc", url_only("https://a.test/")).unwrap();
    let updated = harness
        .broker
        .write_destination(
            "svc",
            DestinationInput {
                timeout_secs: Some(5),
                ..DestinationInput::default()
            },
        )
        .unwrap();

    assert_eq!(created, WriteOutcome::Created);
    assert_eq!(updated, WriteOutcome::Updated);
    let stored = harness.broker.read_destination("svc").unwrap();
    assert_eq!(stored.target_url, "https://a.test/");
    assert_eq!(stored.timeout_secs, 5);
    assert!(stored.send_entity_id);
    assert!(!stored.follow_redirects);
}

/// Tests invalid input is rejected and audited.
#[test]
fn write_destination_rejects_invalid_input() {
    let harness = harness();

    let missing_url =
        harness.broker.write_destination("svc", DestinationInput::default()).unwrap_err();
    let bad_ca = harness
        .broker
        .write_destination(
            "svc",
            DestinationInput {
                target_ca: Some("not pem".to_string()),
                ..url_only("https://a.test/")
            },
        )
        .unwrap_err();
    let bad_name = harness.broker.write_destination("../etc", url_only("https://a.test/")).unwrap_err();

    assert!(matches!(missing_url, RelayError::Validation(_)));
    assert!(matches!(bad_ca, RelayError::CryptoConfig(_)));
    assert!(matches!(bad_name, RelayError::Validation(_)));
    assert!(harness.broker.list_destinations().unwrap().is_empty());
    let events = harness.audit.named("destination_write");
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|event| event.outcome == RelayOutcome::Error));
    assert_eq!(events[1].error_kind, Some("crypto_config"));
}

/// Tests a pinned CA round-trips unchanged.
#[test]
fn destination_target_ca_round_trips() {
    let harness = harness();
    harness
        .broker
        .write_destination(
            "svc",
            DestinationInput {
                target_ca: Some(OTHER_CERT.to_string()),
                ..url_only("https://a.test/")
            },
        )
        .unwrap();

    let stored = harness.broker.read_destination("svc").unwrap();

    assert_eq!(stored.trust_anchor(), Some(OTHER_CERT));
}

/// Tests list and idempotent delete.
#[test]
fn list_and_delete_destinations() {
    let harness = harness();
    harness.broker.write_destination("b", url_only("https://b.test/")).unwrap();
    harness.broker.write_destination("a/nested", url_only("https://a.test/")).unwrap();

    assert_eq!(harness.broker.list_destinations().unwrap(), vec!["a/nested", "b"]);

    harness.broker.delete_destination("b").unwrap();
    harness.broker.delete_destination("b").unwrap();

    assert_eq!(harness.broker.list_destinations().unwrap(), vec!["a/nested"]);
    assert!(matches!(harness.broker.read_destination("b"), Err(RelayError::NotFound(_))));
    assert_eq!(harness.audit.named("destination_delete").len(), 2);
}

// ============================================================================
// SECTION: Keys
// ============================================================================

/// Tests a malformed key on first install persists nothing.
#[test]
fn malformed_key_install_leaves_keys_unconfigured() {
    let harness = harness();

    let err = harness.broker.install_signing_keys(RELAY_CERT, "-----BEGIN nonsense").unwrap_err();

    assert!(matches!(err, RelayError::CryptoConfig(_)), "unexpected error: {err:?}");
    assert!(matches!(harness.broker.signing_certificate(), Err(RelayError::KeyNotConfigured(_))));
    assert!(harness.store.list("config/keys/").unwrap().is_empty());
}

/// Tests a mismatched pair is rejected and the prior pair is kept.
#[test]
fn mismatched_key_install_keeps_previous_pair() {
    let harness = harness();
    harness.broker.install_signing_keys(RELAY_CERT, RELAY_KEY).unwrap();

    let err = harness.broker.install_signing_keys(OTHER_CERT, RELAY_KEY).unwrap_err();

    assert!(matches!(err, RelayError::CryptoConfig(_)));
    assert_eq!(harness.broker.signing_certificate().unwrap(), RELAY_CERT);
    let events = harness.audit.named("signing_keys_install");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].outcome, RelayOutcome::Ok);
    assert_eq!(events[1].outcome, RelayOutcome::Error);
}

/// Tests the client identity is forwarded to the dispatcher once installed.
#[test]
fn client_identity_is_forwarded_until_cleared() {
    let harness = Harness::new(RecordingDispatcher::responding(200, b""));
    harness.broker.write_destination("svc", url_only("https://a.test/")).unwrap();
    harness.broker.install_client_identity(RELAY_CERT, RELAY_KEY).unwrap();

    harness.broker.ping("svc", "one").unwrap();
    harness.broker.clear_client_identity().unwrap();
    harness.broker.clear_client_identity().unwrap();
    harness.broker.ping("svc", "two").unwrap();

    let requests = harness.dispatcher.requests();
    let identity = requests[0].client_identity.as_ref().expect("identity");
    assert_eq!(identity.certificate, RELAY_CERT);
    assert!(requests[1].client_identity.is_none());
}

/// Tests a malformed client identity is rejected.
#[test]
fn malformed_client_identity_is_rejected() {
    let harness = harness();

    let err = harness.broker.install_client_identity("nope", RELAY_KEY).unwrap_err();

    assert!(matches!(err, RelayError::CryptoConfig(_)));
    assert!(harness.store.get("config/keys/client").unwrap().is_none());
}
