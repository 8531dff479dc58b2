//! Challenge validation, transitions and signing.
//!
//! # Respond Flow
//!
//! ```text
//! factor can sign? ──► repository.get ──► owned by factor? ──► pending?
//!                                                                 │
//!      repository.update ◄── sign payload ◄── signable? ◄── target approved/denied?
//!              │                                                  (alias set?)
//!              ▼
//!      status == target?
//! ```
//!
//! Every call refetches the challenge; nothing is cached between calls.
//! The capability check runs before any repository or key store call.

use fail::fail_point;
use pushauth_keystore::{KeyStoreError, SecureKeyStore};

use crate::{
    error::{InputError, Result, VerifyError},
    jws,
    payload::SignaturePayload,
    repository::{ChallengeRepository, SignedResponse},
    types::{Challenge, ChallengeStatus, Factor},
};

/// Message of the storage error raised for a push factor without a key alias.
pub const ALIAS_NOT_FOUND: &str = "Alias not found";

/// Drives challenge responses for push factors.
///
/// # Examples
///
/// ```no_run
/// use pushauth_challenge::{ChallengeStateMachine, ChallengeStatus, MemoryChallengeRepository, Factor};
/// use pushauth_keystore::{EcKeyStore, item::MemorySecureItemStore};
///
/// # async fn example(factor: Factor) -> pushauth_challenge::Result<()> {
/// let machine = ChallengeStateMachine::new(
///     MemoryChallengeRepository::new(),
///     EcKeyStore::new(MemorySecureItemStore::new()),
/// );
///
/// let challenge = machine.respond("YC0123", &factor, ChallengeStatus::Approved).await?;
/// assert_eq!(challenge.status, ChallengeStatus::Approved);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChallengeStateMachine<R, K> {
    repository: R,
    key_store: K,
}

impl<R: ChallengeRepository, K: SecureKeyStore> ChallengeStateMachine<R, K> {
    /// Creates a state machine over `repository` and `key_store`.
    #[must_use]
    pub fn new(repository: R, key_store: K) -> Self {
        Self { repository, key_store }
    }

    /// Returns the repository.
    #[must_use]
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Returns the key store.
    #[must_use]
    pub fn key_store(&self) -> &K {
        &self.key_store
    }

    /// Fetches a challenge addressed to `factor`, without signing anything.
    ///
    /// # Errors
    ///
    /// - [`InputError::InvalidFactor`] if the factor cannot sign, before any
    ///   repository call
    /// - [`InputError::ChallengeNotFound`] or the repository's error if the
    ///   challenge cannot be read
    /// - [`InputError::WrongFactor`] if the challenge belongs to another factor
    #[tracing::instrument(skip(self, factor), fields(factor_sid = %factor.sid))]
    pub async fn fetch(&self, challenge_sid: &str, factor: &Factor) -> Result<Challenge> {
        if !factor.kind.can_sign() {
            tracing::debug!(kind = factor.kind.as_str(), "factor kind cannot sign challenges");
            return Err(InputError::InvalidFactor.into());
        }

        let challenge = self.repository.get(challenge_sid, factor).await?;
        if challenge.factor_sid != factor.sid {
            tracing::warn!(
                challenge_factor_sid = %challenge.factor_sid,
                "challenge addressed to another factor",
            );
            return Err(InputError::WrongFactor.into());
        }

        Ok(challenge)
    }

    /// Answers a pending challenge with `target_status`.
    ///
    /// Signs the payload built from the challenge's signature fields with the
    /// factor's key pair, submits it, and checks the server applied the
    /// requested status.
    ///
    /// # Errors
    ///
    /// - Any error from [`fetch`](Self::fetch)
    /// - [`InputError::AlreadyUpdatedChallenge`] or [`InputError::ExpiredChallenge`]
    ///   if the challenge is no longer pending
    /// - [`InputError::InvalidTargetStatus`] unless the target is approved or denied
    /// - [`VerifyError::Storage`] if the factor has no key pair alias
    /// - [`InputError::InvalidSignatureFields`] or [`InputError::MissingResponseValue`]
    ///   if the challenge cannot be signed
    /// - [`VerifyError::KeyStorage`] if signing fails
    /// - [`InputError::StatusMismatch`] if the returned challenge reports
    ///   another status
    #[tracing::instrument(
        skip(self, factor),
        fields(factor_sid = %factor.sid, target_status = %target_status)
    )]
    pub async fn respond(
        &self,
        challenge_sid: &str,
        factor: &Factor,
        target_status: ChallengeStatus,
    ) -> Result<Challenge> {
        let challenge = self.fetch(challenge_sid, factor).await?;

        match challenge.status {
            ChallengeStatus::Pending => {},
            ChallengeStatus::Expired => return Err(InputError::ExpiredChallenge.into()),
            status @ (ChallengeStatus::Approved | ChallengeStatus::Denied) => {
                return Err(InputError::AlreadyUpdatedChallenge { status }.into());
            },
        }

        if !target_status.is_response_target() {
            return Err(InputError::InvalidTargetStatus { status: target_status }.into());
        }

        let alias = factor.key_pair_alias().ok_or_else(|| VerifyError::storage(ALIAS_NOT_FOUND))?;

        let signable = challenge.signable.as_ref().ok_or(InputError::InvalidSignatureFields)?;
        let payload = SignaturePayload::build(signable, target_status)?;

        fail_point!("challenge-before-sign", |_| {
            Err(VerifyError::from(KeyStoreError::key_storage("injected signing failure")))
        });
        let signed_payload = jws::sign_payload(&self.key_store, alias, &payload)?;
        tracing::debug!(fields = payload.keys().count(), "signed challenge payload");

        let updated = self
            .repository
            .update(&challenge, factor, &SignedResponse { target_status, signed_payload })
            .await?;

        if updated.status != target_status {
            tracing::warn!(
                requested = %target_status,
                received = %updated.status,
                "challenge update reported a different status",
            );
            return Err(InputError::StatusMismatch {
                requested: target_status,
                received: updated.status,
            }
            .into());
        }

        Ok(updated)
    }
}
