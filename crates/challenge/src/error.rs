//! Challenge error types.
//!
//! This module defines the error taxonomy for challenge operations:
//!
//! - [`VerifyError::Input`] - caller or challenge-state misuse ([`InputError`])
//! - [`VerifyError::KeyStorage`] - a secure key store operation failed
//! - [`VerifyError::Storage`] - local state is inconsistent (e.g. a verified factor without a key
//!   alias)
//! - [`VerifyError::Network`] - the transport failed after the retry policy gave up
//! - [`VerifyError::Mapper`] - the server sent a payload that cannot be mapped
//!
//! Every failure is scoped to the single operation that produced it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pushauth_keystore::{BoxError, KeyStoreError};
use thiserror::Error;

use crate::types::ChallengeStatus;

/// Caller or challenge-state misuse.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum InputError {
    /// The repository has no challenge with this sid.
    #[error("challenge not found: {sid}")]
    ChallengeNotFound {
        /// Challenge sid that was requested.
        sid: String,
    },

    /// The challenge belongs to a different factor.
    #[error("wrong factor")]
    WrongFactor,

    /// The factor kind cannot sign challenges.
    #[error("invalid factor")]
    InvalidFactor,

    /// The challenge was already approved or denied.
    #[error("challenge already updated ({status})")]
    AlreadyUpdatedChallenge {
        /// Terminal status the challenge is in.
        status: ChallengeStatus,
    },

    /// The challenge expired before it was answered.
    #[error("challenge expired")]
    ExpiredChallenge,

    /// The requested status is not a caller-driven transition.
    #[error("invalid target status: {status}")]
    InvalidTargetStatus {
        /// Status that was requested.
        status: ChallengeStatus,
    },

    /// The challenge lists no signature fields.
    #[error("signature fields")]
    InvalidSignatureFields,

    /// A signature field has no value in the challenge response.
    #[error("value in response: {field}")]
    MissingResponseValue {
        /// The field without a value.
        field: String,
    },

    /// The server echoed a status other than the one submitted.
    #[error("status mismatch: requested {requested}, received {received}")]
    StatusMismatch {
        /// Status submitted by the caller.
        requested: ChallengeStatus,
        /// Status reported by the repository.
        received: ChallengeStatus,
    },
}

/// Transport failure, reported after the clock-skew retry policy is done.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum NetworkError {
    /// The server answered with a failure status code.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
        /// Value of the server's `Date` header, when present.
        server_date: Option<DateTime<Utc>>,
    },

    /// The request could not be delivered.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },

    /// The request exceeded its time limit.
    #[error("Request timed out")]
    Timeout,
}

/// HTTP status the server uses to reject a request with a skewed timestamp.
pub const CLOCK_SKEW_STATUS: u16 = 401;

impl NetworkError {
    /// Creates a new `Status` error.
    #[must_use]
    pub fn status(
        status: u16,
        message: impl Into<String>,
        server_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self::Status { status, message: message.into(), server_date }
    }

    /// Creates a new `Transport` error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    /// Returns the server date if this is a timestamp-skew rejection.
    ///
    /// A rejection counts as skew when the server answers `401` and reports
    /// its own clock through the `Date` header.
    #[must_use]
    pub fn clock_skew_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Status { status: CLOCK_SKEW_STATUS, server_date: Some(date), .. } => Some(*date),
            _ => None,
        }
    }
}

/// Errors returned by challenge operations.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VerifyError {
    /// Caller or challenge-state misuse.
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    /// A secure key store operation failed, including signing.
    #[error("Key storage error: {0}")]
    KeyStorage(
        /// The underlying key store error.
        #[source]
        KeyStoreError,
    ),

    /// Local state is inconsistent.
    ///
    /// Distinct from [`VerifyError::Input`]: this points at corrupted local
    /// persistence, not a caller mistake.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the inconsistency.
        message: String,
    },

    /// The transport failed.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// The server payload could not be mapped.
    #[error("Mapper error: {message}")]
    Mapper {
        /// Description of the mapping failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },
}

impl VerifyError {
    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }

    /// Creates a new `Mapper` error.
    #[must_use]
    pub fn mapper(message: impl Into<String>) -> Self {
        Self::Mapper { message: message.into(), source: None }
    }

    /// Creates a new `Mapper` error wrapping a source error.
    #[must_use]
    pub fn mapper_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Mapper { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Returns the input error, if this is one.
    #[must_use]
    pub fn as_input(&self) -> Option<&InputError> {
        match self {
            Self::Input(err) => Some(err),
            _ => None,
        }
    }
}

impl From<KeyStoreError> for VerifyError {
    fn from(err: KeyStoreError) -> Self {
        Self::KeyStorage(err)
    }
}

/// Result type alias for challenge operations.
pub type Result<T> = std::result::Result<T, VerifyError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::error::Error as _;

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_input_error_display() {
        assert_eq!(VerifyError::from(InputError::WrongFactor).to_string(), "Invalid input: wrong factor");
        assert_eq!(
            VerifyError::from(InputError::InvalidSignatureFields).to_string(),
            "Invalid input: signature fields"
        );
        assert_eq!(
            VerifyError::from(InputError::MissingResponseValue { field: "b".into() }).to_string(),
            "Invalid input: value in response: b"
        );
        assert_eq!(
            InputError::AlreadyUpdatedChallenge { status: ChallengeStatus::Approved }.to_string(),
            "challenge already updated (approved)"
        );
    }

    #[test]
    fn test_storage_error_is_not_input() {
        let err = VerifyError::storage("Alias not found");
        assert_eq!(err.to_string(), "Storage error: Alias not found");
        assert!(err.as_input().is_none());
    }

    #[test]
    fn test_clock_skew_detection() {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        assert_eq!(NetworkError::status(401, "unauthorized", Some(date)).clock_skew_date(), Some(date));
        assert_eq!(NetworkError::status(401, "unauthorized", None).clock_skew_date(), None);
        assert_eq!(NetworkError::status(500, "boom", Some(date)).clock_skew_date(), None);
        assert_eq!(NetworkError::transport("reset").clock_skew_date(), None);
    }

    #[test]
    fn test_key_storage_error_preserves_source_chain() {
        let err = VerifyError::from(KeyStoreError::key_storage("no private key for alias a"));

        let source = err.source().expect("source chain must be preserved");
        assert_eq!(source.to_string(), "Key storage error: no private key for alias a");
    }

    #[test]
    fn test_mapper_error_with_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = VerifyError::mapper_with_source("invalid challenge body", json_err);

        assert!(err.to_string().starts_with("Mapper error: invalid challenge body"));
        assert!(err.source().is_some());
    }
}
