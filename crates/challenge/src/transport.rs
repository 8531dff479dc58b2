//! Transport boundary for challenge requests.
//!
//! The wire transport is supplied by the embedding application through
//! [`ChallengeTransport`]. Requests carry everything needed to address the
//! challenge and to authenticate the call; responses hand back the raw
//! status, headers and body.

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{error::NetworkError, types::ChallengeStatus};

/// Response header carrying the server's current date (RFC 2822).
pub const DATE_HEADER: &str = "date";

/// What a [`ChallengeRequest`] asks the server to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestOperation {
    /// Read the challenge.
    Read,
    /// Submit a signed response.
    Update {
        /// Status the caller is answering with.
        target_status: ChallengeStatus,
        /// Compact JWS over the signature payload.
        signed_payload: String,
    },
}

/// A single request against the challenge endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChallengeRequest {
    /// Absolute URL of the challenge resource.
    pub url: String,
    /// Read or update.
    pub operation: RequestOperation,
    /// Challenge being addressed.
    pub challenge_sid: String,
    /// Factor owning the challenge.
    pub factor_sid: String,
    /// Service the factor is enrolled in.
    pub service_sid: String,
    /// Identity of the entity owning the factor.
    pub entity_identity: String,
    /// Request timestamp from the synchronized clock.
    pub timestamp: DateTime<Utc>,
    /// Time limit for the request.
    pub timeout: Duration,
}

/// Raw transport response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, keyed by lower-case name.
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: Bytes,
}

impl TransportResponse {
    /// Creates a response with no headers.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: BTreeMap::new(), body: body.into() }
    }

    /// Adds a header. Names are stored lower-cased.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Returns a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Returns the parsed `Date` header, if present and well-formed.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        let value = self.header(DATE_HEADER)?;
        DateTime::parse_from_rfc2822(value).ok().map(|date| date.with_timezone(&Utc))
    }

    /// Returns `true` for statuses below 400.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status < 400
    }

    /// Converts a failure status into a [`NetworkError`], passing successes through.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::Status`] carrying the code, body text and
    /// server date when the status is 400 or above.
    pub fn error_for_status(self) -> Result<Self, NetworkError> {
        if self.is_success() {
            return Ok(self);
        }
        let message = String::from_utf8_lossy(&self.body).into_owned();
        Err(NetworkError::status(self.status, message, self.date()))
    }
}

/// Sends challenge requests over the wire.
#[async_trait]
pub trait ChallengeTransport: Send + Sync {
    /// Sends `request` and returns the raw response.
    ///
    /// Failure statuses are returned as responses, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] if the request could not be delivered.
    async fn send(&self, request: &ChallengeRequest) -> Result<TransportResponse, NetworkError>;
}

#[async_trait]
impl<T: ChallengeTransport + ?Sized> ChallengeTransport for std::sync::Arc<T> {
    async fn send(&self, request: &ChallengeRequest) -> Result<TransportResponse, NetworkError> {
        (**self).send(request).await
    }
}
