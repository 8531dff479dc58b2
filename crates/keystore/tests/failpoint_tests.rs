#![cfg(feature = "failpoints")]
#![allow(clippy::expect_used, clippy::panic)]
//! Integration tests for fail-point injection.
//!
//! These tests require the `failpoints` feature:
//! ```bash
//! cargo test -p pushauth-keystore --features failpoints --test failpoint_tests
//! ```

use pushauth_keystore::{KeyStoreError, SecureKeyStore, testutil::memory_key_store};

#[test]
fn insert_failpoint_surfaces_invalid_status() {
    let scenario = fail::FailScenario::setup();
    fail::cfg("keystore-insert", "return").expect("failed to configure fail point");

    let store = memory_key_store();
    let result = store.force_save(&[4, 1, 2], "alias");

    assert!(
        matches!(result, Err(KeyStoreError::InvalidStatus { code: -1 })),
        "force_save should fail when fail point is active, got {result:?}",
    );
    assert!(store.items().is_empty());

    scenario.teardown();
}

#[test]
fn insert_failpoint_fails_key_generation() {
    let scenario = fail::FailScenario::setup();
    fail::cfg("keystore-insert", "return").expect("failed to configure fail point");

    let store = memory_key_store();
    let result = store.generate_key_pair("alias");

    assert!(matches!(result, Err(KeyStoreError::KeyGeneration { .. })), "got {result:?}");

    scenario.teardown();
}

#[test]
fn without_failpoint_force_save_succeeds() {
    let scenario = fail::FailScenario::setup();

    let store = memory_key_store();
    store.force_save(&[4, 1, 2], "alias").expect("force_save should succeed without fail point");

    scenario.teardown();
}
