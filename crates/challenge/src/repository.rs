//! Challenge repositories.
//!
//! The state machine reads and updates challenges only through
//! [`ChallengeRepository`]. Two implementations are provided:
//!
//! - [`RemoteChallengeRepository`] talks to the challenge API through a
//!   [`ChallengeTransport`], maps bodies with [`ChallengeMapper`] and wraps
//!   every request in the [`ClockSkewRetryPolicy`].
//! - [`MemoryChallengeRepository`] keeps challenges in memory and records
//!   every update, for tests and local development.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{
    clock::SyncedClock,
    config::PushAuthConfig,
    error::{InputError, NetworkError, Result, VerifyError},
    mapper::ChallengeMapper,
    retry::ClockSkewRetryPolicy,
    transport::{ChallengeRequest, ChallengeTransport, RequestOperation, TransportResponse},
    types::{Challenge, ChallengeStatus, Factor},
};

/// HTTP status returned for an unknown challenge.
const NOT_FOUND_STATUS: u16 = 404;

/// A signed answer to a pending challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedResponse {
    /// Status the caller is answering with.
    pub target_status: ChallengeStatus,
    /// Compact JWS over the signature payload.
    pub signed_payload: String,
}

/// Source of challenge data.
#[async_trait]
pub trait ChallengeRepository: Send + Sync {
    /// Fetches the challenge `challenge_sid` addressed to `factor`.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::ChallengeNotFound`] if there is no such
    /// challenge, or the transport/mapper error that prevented reading it.
    async fn get(&self, challenge_sid: &str, factor: &Factor) -> Result<Challenge>;

    /// Submits `response` for `challenge` and returns the updated challenge.
    ///
    /// # Errors
    ///
    /// Returns the transport/mapper error that prevented the update.
    async fn update(
        &self,
        challenge: &Challenge,
        factor: &Factor,
        response: &SignedResponse,
    ) -> Result<Challenge>;
}

#[async_trait]
impl<R: ChallengeRepository + ?Sized> ChallengeRepository for Arc<R> {
    async fn get(&self, challenge_sid: &str, factor: &Factor) -> Result<Challenge> {
        (**self).get(challenge_sid, factor).await
    }

    async fn update(
        &self,
        challenge: &Challenge,
        factor: &Factor,
        response: &SignedResponse,
    ) -> Result<Challenge> {
        (**self).update(challenge, factor, response).await
    }
}

/// [`ChallengeRepository`] backed by the remote challenge API.
pub struct RemoteChallengeRepository<T> {
    transport: T,
    mapper: ChallengeMapper,
    retry: ClockSkewRetryPolicy,
    base_url: String,
    signature_fields_header: String,
    request_timeout: Duration,
}

impl<T> std::fmt::Debug for RemoteChallengeRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteChallengeRepository")
            .field("base_url", &self.base_url)
            .field("signature_fields_header", &self.signature_fields_header)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl<T: ChallengeTransport> RemoteChallengeRepository<T> {
    /// Creates a repository sending requests through `transport`.
    ///
    /// Request timestamps come from `clock`, which is shared with anything
    /// else that needs server-synchronized time.
    #[must_use]
    pub fn new(transport: T, config: &PushAuthConfig, clock: Arc<SyncedClock>) -> Self {
        Self {
            transport,
            mapper: ChallengeMapper::new(),
            retry: ClockSkewRetryPolicy::new(clock).with_max_retries(config.clock_skew_retries()),
            base_url: config.base_url().to_owned(),
            signature_fields_header: config.signature_fields_header().to_owned(),
            request_timeout: config.request_timeout(),
        }
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the synchronized clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<SyncedClock> {
        self.retry.clock()
    }

    fn challenge_url(&self, challenge_sid: &str, factor: &Factor) -> String {
        format!(
            "{}/Services/{}/Entities/{}/Challenges/{}",
            self.base_url, factor.service_sid, factor.entity_identity, challenge_sid
        )
    }

    fn request(
        &self,
        challenge_sid: &str,
        factor: &Factor,
        operation: RequestOperation,
        timestamp: DateTime<Utc>,
    ) -> ChallengeRequest {
        ChallengeRequest {
            url: self.challenge_url(challenge_sid, factor),
            operation,
            challenge_sid: challenge_sid.to_owned(),
            factor_sid: factor.sid.clone(),
            service_sid: factor.service_sid.clone(),
            entity_identity: factor.entity_identity.clone(),
            timestamp,
            timeout: self.request_timeout,
        }
    }

    async fn send(
        &self,
        request: ChallengeRequest,
    ) -> std::result::Result<TransportResponse, NetworkError> {
        let response = tokio::time::timeout(self.request_timeout, self.transport.send(&request))
            .await
            .map_err(|_| NetworkError::Timeout)??;
        response.error_for_status()
    }
}

#[async_trait]
impl<T: ChallengeTransport> ChallengeRepository for RemoteChallengeRepository<T> {
    #[tracing::instrument(skip(self, factor), fields(factor_sid = %factor.sid))]
    async fn get(&self, challenge_sid: &str, factor: &Factor) -> Result<Challenge> {
        let response = self
            .retry
            .execute("get_challenge", move |timestamp| {
                let request = self.request(challenge_sid, factor, RequestOperation::Read, timestamp);
                self.send(request)
            })
            .await
            .map_err(|err| match err {
                NetworkError::Status { status: NOT_FOUND_STATUS, .. } => {
                    VerifyError::from(InputError::ChallengeNotFound { sid: challenge_sid.to_owned() })
                },
                other => VerifyError::from(other),
            })?;

        self.mapper.map(&response.body, response.header(&self.signature_fields_header))
    }

    #[tracing::instrument(
        skip(self, challenge, factor, response),
        fields(challenge_sid = %challenge.sid, target_status = %response.target_status)
    )]
    async fn update(
        &self,
        challenge: &Challenge,
        factor: &Factor,
        response: &SignedResponse,
    ) -> Result<Challenge> {
        let reply = self
            .retry
            .execute("update_challenge", move |timestamp| {
                let operation = RequestOperation::Update {
                    target_status: response.target_status,
                    signed_payload: response.signed_payload.clone(),
                };
                let request = self.request(&challenge.sid, factor, operation, timestamp);
                self.send(request)
            })
            .await?;

        self.mapper.map(&reply.body, None)
    }
}

/// In-memory [`ChallengeRepository`].
///
/// Updates set the challenge to the submitted status and clear its signable
/// response. [`with_echo_status`](Self::with_echo_status) makes updates
/// report a fixed status instead, to simulate a misbehaving backend.
#[derive(Debug, Default)]
pub struct MemoryChallengeRepository {
    challenges: RwLock<HashMap<String, Challenge>>,
    updates: RwLock<Vec<(String, SignedResponse)>>,
    echo_status: RwLock<Option<ChallengeStatus>>,
    get_calls: AtomicUsize,
}

impl MemoryChallengeRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a challenge.
    pub fn insert(&self, challenge: Challenge) {
        self.challenges.write().insert(challenge.sid.clone(), challenge);
    }

    /// Makes every later update report `status`.
    #[must_use]
    pub fn with_echo_status(self, status: ChallengeStatus) -> Self {
        *self.echo_status.write() = Some(status);
        self
    }

    /// Returns the stored challenge `sid`.
    #[must_use]
    pub fn challenge(&self, sid: &str) -> Option<Challenge> {
        self.challenges.read().get(sid).cloned()
    }

    /// Returns the number of `get` calls.
    #[must_use]
    pub fn get_count(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Returns the number of `update` calls.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.read().len()
    }

    /// Returns every submitted response with its challenge sid, in order.
    #[must_use]
    pub fn updates(&self) -> Vec<(String, SignedResponse)> {
        self.updates.read().clone()
    }
}

#[async_trait]
impl ChallengeRepository for MemoryChallengeRepository {
    async fn get(&self, challenge_sid: &str, _factor: &Factor) -> Result<Challenge> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.challenge(challenge_sid)
            .ok_or_else(|| InputError::ChallengeNotFound { sid: challenge_sid.to_owned() }.into())
    }

    async fn update(
        &self,
        challenge: &Challenge,
        _factor: &Factor,
        response: &SignedResponse,
    ) -> Result<Challenge> {
        let status = (*self.echo_status.read()).unwrap_or(response.target_status);
        let mut challenges = self.challenges.write();
        let stored = challenges
            .get_mut(&challenge.sid)
            .ok_or_else(|| InputError::ChallengeNotFound { sid: challenge.sid.clone() })?;
        self.updates.write().push((challenge.sid.clone(), response.clone()));

        stored.status = status;
        stored.signable = None;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testutil::{pending_challenge, push_factor};

    #[tokio::test]
    async fn test_memory_get_unknown_is_not_found() {
        let repo = MemoryChallengeRepository::new();

        let err = repo.get("YC404", &push_factor("YF1", "alias")).await.unwrap_err();

        assert_eq!(err.as_input(), Some(&InputError::ChallengeNotFound { sid: "YC404".into() }));
        assert_eq!(repo.get_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_update_applies_target_status() {
        let repo = MemoryChallengeRepository::new();
        let challenge = pending_challenge("YC1", "YF1", &[("sid", "YC1")]);
        repo.insert(challenge.clone());
        let response =
            SignedResponse { target_status: ChallengeStatus::Denied, signed_payload: "jws".into() };

        let updated = repo.update(&challenge, &push_factor("YF1", "alias"), &response).await.unwrap();

        assert_eq!(updated.status, ChallengeStatus::Denied);
        assert!(updated.signable.is_none());
        assert_eq!(repo.updates(), vec![("YC1".to_owned(), response)]);
    }

    #[tokio::test]
    async fn test_memory_echo_status_overrides_target() {
        let repo = MemoryChallengeRepository::new().with_echo_status(ChallengeStatus::Expired);
        let challenge = pending_challenge("YC1", "YF1", &[("sid", "YC1")]);
        repo.insert(challenge.clone());
        let response =
            SignedResponse { target_status: ChallengeStatus::Approved, signed_payload: "jws".into() };

        let updated = repo.update(&challenge, &push_factor("YF1", "alias"), &response).await.unwrap();

        assert_eq!(updated.status, ChallengeStatus::Expired);
        assert_eq!(repo.update_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_update_of_unknown_challenge_is_not_recorded() {
        let repo = MemoryChallengeRepository::new();
        let challenge = pending_challenge("YC404", "YF1", &[("sid", "YC404")]);
        let response =
            SignedResponse { target_status: ChallengeStatus::Approved, signed_payload: "jws".into() };

        let err = repo.update(&challenge, &push_factor("YF1", "alias"), &response).await.unwrap_err();

        assert_eq!(err.as_input(), Some(&InputError::ChallengeNotFound { sid: "YC404".into() }));
        assert_eq!(repo.update_count(), 0);
        assert!(repo.updates().is_empty());
    }
}
