//! End-to-end challenge responses.
//!
//! Covers the approve flow against the in-memory repository and against the
//! remote repository over a recording transport, and checks the signed
//! payload with an independent ES256 verifier.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use pushauth_challenge::{
    ChallengeStateMachine, ChallengeStatus, MemoryChallengeRepository, PushAuthConfig,
    RemoteChallengeRepository, RequestOperation, SyncedClock, jws,
    testutil::{
        CountingKeyStore, RecordingTransport, body_response, challenge_body, pending_challenge,
        push_factor, signing_input_payload,
    },
};
use pushauth_keystore::{PublicKey, SecureKeyStore, testutil::memory_key_store};
use serde_json::{Value, json};

const ALIAS: &str = "pushauth-f1";
const FIELDS_HEADER: &str = "Twilio-Verify-Signature-Fields";

fn es256_claims(public_key: &PublicKey, token: &str) -> Value {
    let (x, y) = public_key.jwk_coordinates();
    let key = DecodingKey::from_ec_components(&x, &y).expect("valid EC components");
    let mut validation = Validation::new(Algorithm::ES256);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_aud = false;

    jsonwebtoken::decode::<Value>(token, &key, &validation).expect("signature should verify").claims
}

#[tokio::test]
async fn approve_signs_selected_fields_and_updates_once() {
    let key_store = CountingKeyStore::new(memory_key_store());
    let pair = key_store.generate_key_pair(ALIAS).unwrap();
    key_store.reset();

    let repository = MemoryChallengeRepository::new();
    repository.insert(pending_challenge("s1", "f1", &[("sid", "s1"), ("factorSid", "f1")]));
    let machine = ChallengeStateMachine::new(repository, key_store);

    let updated = machine
        .respond("s1", &push_factor("f1", ALIAS), ChallengeStatus::Approved)
        .await
        .expect("respond should succeed");

    assert_eq!(updated.status, ChallengeStatus::Approved);
    assert_eq!(machine.repository().update_count(), 1);

    let sign_calls = machine.key_store().sign_calls();
    assert_eq!(sign_calls.len(), 1);
    assert_eq!(sign_calls[0].0, ALIAS);
    assert_eq!(
        signing_input_payload(&sign_calls[0].1),
        json!({"sid": "s1", "factorSid": "f1", "status": "approved"})
    );

    let (_, submitted) = &machine.repository().updates()[0];
    assert_eq!(submitted.target_status, ChallengeStatus::Approved);
    assert!(jws::verify_compact(&pair.public_key, &submitted.signed_payload));
    assert_eq!(
        es256_claims(&pair.public_key, &submitted.signed_payload),
        json!({"sid": "s1", "factorSid": "f1", "status": "approved"})
    );
}

#[tokio::test]
async fn extra_response_fields_are_not_signed() {
    let key_store = memory_key_store();
    let pair = key_store.generate_key_pair(ALIAS).unwrap();

    let mut challenge = pending_challenge("s1", "f1", &[("a", "1"), ("b", "2")]);
    challenge
        .signable
        .as_mut()
        .unwrap()
        .response
        .insert("c".to_owned(), Value::String("3".to_owned()));
    let repository = MemoryChallengeRepository::new();
    repository.insert(challenge);
    let machine = ChallengeStateMachine::new(repository, key_store);

    machine.respond("s1", &push_factor("f1", ALIAS), ChallengeStatus::Denied).await.unwrap();

    let (_, submitted) = &machine.repository().updates()[0];
    assert_eq!(
        es256_claims(&pair.public_key, &submitted.signed_payload),
        json!({"a": "1", "b": "2", "status": "denied"})
    );
}

#[tokio::test]
async fn remote_flow_reads_header_and_submits_signed_payload() {
    let key_store = memory_key_store();
    let pair = key_store.generate_key_pair(ALIAS).unwrap();
    let factor = push_factor("f1", ALIAS);

    let pending = pending_challenge("s1", "f1", &[]);
    let mut approved = pending.clone();
    approved.status = ChallengeStatus::Approved;

    let transport = Arc::new(
        RecordingTransport::new()
            .with_response(body_response(
                &challenge_body(&pending),
                Some((FIELDS_HEADER, "sid,factor_sid,status")),
            ))
            .with_response(body_response(&challenge_body(&approved), None)),
    );
    let config = PushAuthConfig::builder().base_url("https://verify.example.com/v2").build().unwrap();
    let repository =
        RemoteChallengeRepository::new(Arc::clone(&transport), &config, Arc::new(SyncedClock::new()));
    let machine = ChallengeStateMachine::new(repository, key_store);

    let updated = machine.respond("s1", &factor, ChallengeStatus::Approved).await.unwrap();
    assert_eq!(updated.status, ChallengeStatus::Approved);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].operation, RequestOperation::Read);
    assert_eq!(
        requests[0].url,
        "https://verify.example.com/v2/Services/VA0123/Entities/entity-1/Challenges/s1"
    );

    let RequestOperation::Update { target_status, signed_payload } = &requests[1].operation else {
        panic!("second request should be an update, got {:?}", requests[1].operation);
    };
    assert_eq!(*target_status, ChallengeStatus::Approved);
    // The pending body's own status is overridden by the target
    assert_eq!(
        es256_claims(&pair.public_key, signed_payload),
        json!({"sid": "s1", "factor_sid": "f1", "status": "approved"})
    );
}

#[tokio::test]
async fn remote_pending_without_header_cannot_be_answered() {
    let key_store = memory_key_store();
    key_store.generate_key_pair(ALIAS).unwrap();

    let transport = Arc::new(
        RecordingTransport::new()
            .with_response(body_response(&challenge_body(&pending_challenge("s1", "f1", &[])), None)),
    );
    let config = PushAuthConfig::builder().base_url("https://verify.example.com/v2").build().unwrap();
    let repository =
        RemoteChallengeRepository::new(Arc::clone(&transport), &config, Arc::new(SyncedClock::new()));
    let machine = ChallengeStateMachine::new(repository, key_store);

    let err = machine
        .respond("s1", &push_factor("f1", ALIAS), ChallengeStatus::Approved)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Invalid input: signature fields");
    assert_eq!(transport.request_count(), 1);
}
