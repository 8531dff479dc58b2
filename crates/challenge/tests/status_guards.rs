//! Guards that must reject a response before anything is signed.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use pushauth_challenge::{
    ChallengeStateMachine, ChallengeStatus, InputError, MemoryChallengeRepository, VerifyError,
    testutil::{CountingKeyStore, challenge_with_status, pending_challenge, push_factor, totp_factor},
};
use pushauth_keystore::{SecureKeyStore, testutil::memory_key_store};
use rstest::rstest;

const ALIAS: &str = "pushauth-f1";

fn machine_with(
    repository: MemoryChallengeRepository,
) -> ChallengeStateMachine<MemoryChallengeRepository, CountingKeyStore> {
    let key_store = CountingKeyStore::new(memory_key_store());
    key_store.generate_key_pair(ALIAS).unwrap();
    key_store.reset();
    ChallengeStateMachine::new(repository, key_store)
}

fn input_error(err: &VerifyError) -> &InputError {
    err.as_input().unwrap_or_else(|| panic!("expected input error, got {err:?}"))
}

#[rstest]
#[case::approved(ChallengeStatus::Approved, InputError::AlreadyUpdatedChallenge { status: ChallengeStatus::Approved })]
#[case::denied(ChallengeStatus::Denied, InputError::AlreadyUpdatedChallenge { status: ChallengeStatus::Denied })]
#[case::expired(ChallengeStatus::Expired, InputError::ExpiredChallenge)]
#[tokio::test]
async fn non_pending_challenge_is_never_signed(
    #[case] status: ChallengeStatus,
    #[case] expected: InputError,
    #[values(ChallengeStatus::Approved, ChallengeStatus::Denied)] target: ChallengeStatus,
) {
    let repository = MemoryChallengeRepository::new();
    repository.insert(challenge_with_status("s1", "f1", status));
    let machine = machine_with(repository);

    let err = machine.respond("s1", &push_factor("f1", ALIAS), target).await.unwrap_err();

    assert_eq!(input_error(&err), &expected);
    assert!(machine.key_store().sign_calls().is_empty());
    assert_eq!(machine.key_store().call_count(), 0);
    assert_eq!(machine.repository().update_count(), 0);
}

#[tokio::test]
async fn non_push_factor_fails_before_any_call() {
    let repository = MemoryChallengeRepository::new();
    repository.insert(pending_challenge("s1", "f1", &[("sid", "s1")]));
    let machine = machine_with(repository);
    let factor = totp_factor("f1");

    let respond_err = machine.respond("s1", &factor, ChallengeStatus::Approved).await.unwrap_err();
    let fetch_err = machine.fetch("s1", &factor).await.unwrap_err();

    assert_eq!(input_error(&respond_err), &InputError::InvalidFactor);
    assert_eq!(input_error(&fetch_err), &InputError::InvalidFactor);
    assert_eq!(respond_err.to_string(), "Invalid input: invalid factor");
    assert_eq!(machine.repository().get_count(), 0);
    assert_eq!(machine.repository().update_count(), 0);
    assert_eq!(machine.key_store().call_count(), 0);
    assert!(machine.key_store().inner().retrieve(ALIAS).is_ok());
}

#[tokio::test]
async fn unknown_challenge_is_not_found() {
    let machine = machine_with(MemoryChallengeRepository::new());

    let err = machine
        .respond("missing", &push_factor("f1", ALIAS), ChallengeStatus::Approved)
        .await
        .unwrap_err();

    assert_eq!(input_error(&err), &InputError::ChallengeNotFound { sid: "missing".into() });
    assert_eq!(machine.key_store().call_count(), 0);
}

#[tokio::test]
async fn missing_response_value_is_rejected_before_signing() {
    let mut challenge = pending_challenge("s1", "f1", &[("a", "1"), ("b", "2")]);
    challenge.signable.as_mut().unwrap().response.remove("b");
    let repository = MemoryChallengeRepository::new();
    repository.insert(challenge);
    let machine = machine_with(repository);

    let err = machine
        .respond("s1", &push_factor("f1", ALIAS), ChallengeStatus::Approved)
        .await
        .unwrap_err();

    assert_eq!(input_error(&err), &InputError::MissingResponseValue { field: "b".into() });
    assert_eq!(machine.key_store().call_count(), 0);
}

#[tokio::test]
async fn status_mismatch_from_repository_is_input_error() {
    let repository = MemoryChallengeRepository::new().with_echo_status(ChallengeStatus::Denied);
    repository.insert(pending_challenge("s1", "f1", &[("sid", "s1")]));
    let machine = machine_with(repository);

    let err = machine
        .respond("s1", &push_factor("f1", ALIAS), ChallengeStatus::Approved)
        .await
        .unwrap_err();

    assert_eq!(
        input_error(&err),
        &InputError::StatusMismatch {
            requested: ChallengeStatus::Approved,
            received: ChallengeStatus::Denied,
        }
    );
    // The response was signed and submitted exactly once before the check
    assert_eq!(machine.key_store().sign_calls().len(), 1);
    assert_eq!(machine.repository().update_count(), 1);
}

#[tokio::test]
async fn each_call_refetches_the_challenge() {
    let repository = MemoryChallengeRepository::new();
    repository.insert(pending_challenge("s1", "f1", &[("sid", "s1")]));
    let machine = machine_with(repository);
    let factor = push_factor("f1", ALIAS);

    machine.respond("s1", &factor, ChallengeStatus::Approved).await.unwrap();
    let err = machine.respond("s1", &factor, ChallengeStatus::Denied).await.unwrap_err();

    assert_eq!(
        input_error(&err),
        &InputError::AlreadyUpdatedChallenge { status: ChallengeStatus::Approved }
    );
    assert_eq!(machine.repository().get_count(), 2);
    assert_eq!(machine.repository().update_count(), 1);
}
