//! # Push Authentication Challenges
//!
//! Challenge-response protocol for push authentication factors.
//!
//! A server issues a challenge to a registered device; the device answers
//! by signing the challenge's signature fields with a private key that never
//! leaves its secure key store.
//!
//! This crate provides:
//! - **State machine**: validation of challenge state, ownership and target
//!   status, then signing and submission ([`ChallengeStateMachine`])
//! - **Signature payloads**: field selection and compact ES256 JWS encoding
//! - **Repositories**: remote access over a pluggable transport, with a
//!   one-shot clock-skew retry, and an in-memory repository
//! - **Factor keys**: key pair creation, rotation and deletion for push factors
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pushauth_challenge::{
//!     ChallengeStateMachine, ChallengeStatus, ChallengeTransport, Factor, PushAuthConfig,
//!     RemoteChallengeRepository, SyncedClock, open_key_store,
//! };
//!
//! # async fn example(transport: impl ChallengeTransport, factor: Factor) -> Result<(), Box<dyn std::error::Error>> {
//! let config = PushAuthConfig::builder()
//!     .base_url("https://verify.example.com/v2")
//!     .key_store_path("/var/lib/pushauth/keys")
//!     .build()?;
//!
//! let repository =
//!     RemoteChallengeRepository::new(transport, &config, Arc::new(SyncedClock::new()));
//! let machine = ChallengeStateMachine::new(repository, open_key_store(&config)?);
//!
//! let challenge = machine.respond("YC0123", &factor, ChallengeStatus::Approved).await?;
//! println!("challenge {} is now {}", challenge.sid, challenge.status);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module (fixtures, counting key store,
//!   recording transport).
//! - **`failpoints`**: Activates `fail` fail points for fault-injection tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Server-synchronized clock.
pub mod clock;
/// Configuration.
pub mod config;
/// Challenge error types.
pub mod error;
/// Factor key pair lifecycle.
pub mod factor_keys;
/// Compact JWS encoding.
pub mod jws;
/// Challenge body mapping.
pub mod mapper;
/// Signature payload construction.
pub mod payload;
/// Challenge repositories.
pub mod repository;
/// Clock-skew retry policy.
pub mod retry;
/// Challenge state machine.
pub mod state_machine;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
/// Transport boundary.
pub mod transport;
/// Domain types.
pub mod types;

pub use clock::SyncedClock;
pub use config::{ConfigError, PushAuthConfig, open_key_store};
pub use error::{InputError, NetworkError, Result, VerifyError};
pub use factor_keys::FactorKeys;
pub use mapper::ChallengeMapper;
pub use payload::SignaturePayload;
pub use repository::{
    ChallengeRepository, MemoryChallengeRepository, RemoteChallengeRepository, SignedResponse,
};
pub use retry::ClockSkewRetryPolicy;
pub use state_machine::ChallengeStateMachine;
pub use transport::{ChallengeRequest, ChallengeTransport, RequestOperation, TransportResponse};
pub use types::{
    Challenge, ChallengeDetails, ChallengeStatus, DetailField, Factor, FactorKind, FactorStatus,
    SignableResponse, SignatureFields,
};
