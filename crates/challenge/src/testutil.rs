//! Shared test utilities for challenge testing.
//!
//! This module provides factor and challenge fixtures, a
//! [`CountingKeyStore`] that records every key store call, and a
//! [`RecordingTransport`] that replays scripted responses. It is
//! feature-gated behind `testutil` to prevent leaking into production
//! builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! pushauth-challenge = { path = "../challenge", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use pushauth_challenge::testutil::{RecordingTransport, pending_challenge, push_factor};
//! ```

use std::collections::VecDeque;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use pushauth_keystore::{
    EcKeyStore, KeyPair, KeyStoreResult, SecureKeyStore, Signature, item::MemorySecureItemStore,
};
use serde_json::{Value, json};

use crate::{
    error::NetworkError,
    transport::{ChallengeRequest, ChallengeTransport, DATE_HEADER, TransportResponse},
    types::{
        Challenge, ChallengeStatus, Factor, FactorKind, FactorStatus, SignableResponse,
        SignatureFields,
    },
};

/// Service sid used by the fixtures.
pub const TEST_SERVICE_SID: &str = "VA0123";

/// Entity identity used by the fixtures.
pub const TEST_ENTITY_IDENTITY: &str = "entity-1";

/// Creates a verified push factor backed by `alias`.
#[must_use]
pub fn push_factor(sid: &str, alias: &str) -> Factor {
    Factor::builder()
        .sid(sid)
        .friendly_name("test device")
        .service_sid(TEST_SERVICE_SID)
        .entity_identity(TEST_ENTITY_IDENTITY)
        .status(FactorStatus::Verified)
        .kind(FactorKind::Push { key_pair_alias: Some(alias.to_owned()) })
        .build()
}

/// Creates a verified TOTP factor.
#[must_use]
pub fn totp_factor(sid: &str) -> Factor {
    Factor::builder()
        .sid(sid)
        .service_sid(TEST_SERVICE_SID)
        .entity_identity(TEST_ENTITY_IDENTITY)
        .status(FactorStatus::Verified)
        .kind(FactorKind::Totp)
        .build()
}

/// Creates a pending challenge whose signature fields are the keys of `response`.
#[must_use]
pub fn pending_challenge(sid: &str, factor_sid: &str, response: &[(&str, &str)]) -> Challenge {
    let signable = SignableResponse {
        signature_fields: SignatureFields::new(response.iter().map(|(name, _)| *name)),
        response: response
            .iter()
            .map(|(name, value)| ((*name).to_owned(), Value::String((*value).to_owned())))
            .collect(),
    };
    Challenge::builder()
        .sid(sid)
        .factor_sid(factor_sid)
        .status(ChallengeStatus::Pending)
        .signable(signable)
        .build()
}

/// Creates a challenge in `status` with no signable response.
#[must_use]
pub fn challenge_with_status(sid: &str, factor_sid: &str, status: ChallengeStatus) -> Challenge {
    Challenge::builder().sid(sid).factor_sid(factor_sid).status(status).build()
}

/// Renders `challenge` as a wire body.
#[must_use]
pub fn challenge_body(challenge: &Challenge) -> Value {
    let timestamp = |date: DateTime<Utc>| date.to_rfc3339_opts(SecondsFormat::Secs, true);
    json!({
        "sid": challenge.sid,
        "factor_sid": challenge.factor_sid,
        "status": challenge.status,
        "date_created": timestamp(challenge.created_at),
        "date_updated": timestamp(challenge.updated_at),
        "expiration_date": timestamp(challenge.expiration_date),
        "details": challenge.details,
        "hidden_details": challenge.hidden_details,
    })
}

/// A successful transport response carrying `body` and optional signature fields.
#[must_use]
pub fn body_response(body: &Value, signature_fields: Option<(&str, &str)>) -> TransportResponse {
    let response = TransportResponse::new(200, body.to_string());
    match signature_fields {
        Some((header, fields)) => response.with_header(header, fields),
        None => response,
    }
}

/// A `401` rejection reporting `server_date`, as sent for timestamp skew.
#[must_use]
pub fn skew_rejection(server_date: DateTime<Utc>) -> TransportResponse {
    TransportResponse::new(401, "authentication failed: timestamp out of range")
        .with_header(DATE_HEADER, server_date.to_rfc2822())
}

/// Decodes the payload segment of a JWS signing input (`header.payload`).
///
/// # Panics
///
/// Panics if `signing_input` is not a JWS signing input.
#[must_use]
pub fn signing_input_payload(signing_input: &[u8]) -> Value {
    let text = std::str::from_utf8(signing_input).expect("signing input is UTF-8");
    let (_, payload) = text.split_once('.').expect("signing input has two segments");
    let bytes = URL_SAFE_NO_PAD.decode(payload).expect("payload is base64url");
    serde_json::from_slice(&bytes).expect("payload is JSON")
}

/// [`SecureKeyStore`] wrapper that records every call.
#[derive(Debug)]
pub struct CountingKeyStore<K = EcKeyStore<MemorySecureItemStore>> {
    inner: K,
    calls: Mutex<usize>,
    sign_calls: Mutex<Vec<(String, Vec<u8>)>>,
}

impl<K: SecureKeyStore> CountingKeyStore<K> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: K) -> Self {
        Self { inner, calls: Mutex::new(0), sign_calls: Mutex::new(Vec::new()) }
    }

    /// Returns the number of calls of any kind.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }

    /// Returns the alias and data of every `sign` call, in order.
    #[must_use]
    pub fn sign_calls(&self) -> Vec<(String, Vec<u8>)> {
        self.sign_calls.lock().clone()
    }

    /// Forgets all recorded calls.
    pub fn reset(&self) {
        *self.calls.lock() = 0;
        self.sign_calls.lock().clear();
    }

    /// Returns the wrapped store.
    #[must_use]
    pub fn inner(&self) -> &K {
        &self.inner
    }

    fn record(&self) {
        *self.calls.lock() += 1;
    }
}

impl<K: SecureKeyStore> SecureKeyStore for CountingKeyStore<K> {
    fn generate_key_pair(&self, alias: &str) -> KeyStoreResult<KeyPair> {
        self.record();
        self.inner.generate_key_pair(alias)
    }

    fn retrieve(&self, alias: &str) -> KeyStoreResult<KeyPair> {
        self.record();
        self.inner.retrieve(alias)
    }

    fn force_save(&self, public_key_material: &[u8], alias: &str) -> KeyStoreResult<()> {
        self.record();
        self.inner.force_save(public_key_material, alias)
    }

    fn sign(&self, alias: &str, data: &[u8]) -> KeyStoreResult<Signature> {
        self.record();
        self.sign_calls.lock().push((alias.to_owned(), data.to_vec()));
        self.inner.sign(alias, data)
    }

    fn verify(&self, public_key: &[u8], data: &[u8], signature: &[u8]) -> bool {
        self.record();
        self.inner.verify(public_key, data, signature)
    }

    fn delete(&self, alias: &str) -> KeyStoreResult<()> {
        self.record();
        self.inner.delete(alias)
    }
}

/// [`ChallengeTransport`] that records requests and replays scripted responses.
///
/// Responses are consumed in order; once the script is empty every request
/// fails with a transport error.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    script: Mutex<VecDeque<Result<TransportResponse, NetworkError>>>,
    requests: Mutex<Vec<ChallengeRequest>>,
}

impl RecordingTransport {
    /// Creates a transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    #[must_use]
    pub fn with_response(self, response: TransportResponse) -> Self {
        self.script.lock().push_back(Ok(response));
        self
    }

    /// Queues a delivery failure.
    #[must_use]
    pub fn with_error(self, error: NetworkError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    /// Returns every request sent so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ChallengeRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests sent so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ChallengeTransport for RecordingTransport {
    async fn send(&self, request: &ChallengeRequest) -> Result<TransportResponse, NetworkError> {
        self.requests.lock().push(request.clone());
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| Err(NetworkError::transport("no scripted response")))
    }
}
