//! Clock-skew retry for authenticated requests.
//!
//! This module provides [`ClockSkewRetryPolicy`], which wraps an async
//! request so that a rejection caused by request-timestamp skew resyncs the
//! [`SyncedClock`] from the server's reported date and retries once. Every
//! other failure, and a skew rejection on the retry, is returned unchanged.
//!
//! ```text
//! attempt(now) ──► 401 + Date ──► clock.sync_to(Date) ──► attempt(now') ──► result
//!      │                                                                   (no third try)
//!      └──► other result ──► returned as-is
//! ```

use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use fail::fail_point;

use crate::{clock::SyncedClock, error::NetworkError};

/// Upper bound on clock-skew retries per request.
pub const MAX_CLOCK_SKEW_RETRIES: u32 = 1;

/// Retries a request once after resynchronizing the clock on a skew rejection.
#[derive(Clone, Debug)]
pub struct ClockSkewRetryPolicy {
    clock: Arc<SyncedClock>,
    max_retries: u32,
}

impl ClockSkewRetryPolicy {
    /// Creates a policy that retries once on skew.
    #[must_use]
    pub fn new(clock: Arc<SyncedClock>) -> Self {
        Self { clock, max_retries: MAX_CLOCK_SKEW_RETRIES }
    }

    /// Sets the retry count, capped at [`MAX_CLOCK_SKEW_RETRIES`].
    ///
    /// Zero disables the retry; skew rejections are then returned directly.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.min(MAX_CLOCK_SKEW_RETRIES);
        self
    }

    /// Returns the clock used for request timestamps.
    #[must_use]
    pub fn clock(&self) -> &Arc<SyncedClock> {
        &self.clock
    }

    /// Returns the configured retry count.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Runs `operation` with the clock's current time, retrying after a resync.
    ///
    /// `operation` receives the timestamp to stamp the request with, so the
    /// retry carries the corrected time.
    ///
    /// # Errors
    ///
    /// Returns the operation's error when it is not a skew rejection, or when
    /// the retry budget is spent.
    #[tracing::instrument(skip(self, operation), fields(max_retries = self.max_retries))]
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, NetworkError>
    where
        F: FnMut(DateTime<Utc>) -> Fut,
        Fut: Future<Output = Result<T, NetworkError>>,
    {
        let mut attempt = 0;
        loop {
            let err = match operation(self.clock.now()).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            "request succeeded after clock resync",
                        );
                    }
                    return Ok(value);
                },
                Err(err) => err,
            };

            match err.clock_skew_date() {
                Some(server_date) if attempt < self.max_retries => {
                    fail_point!("clock-skew-before-resync", |_| Err(err));
                    let offset = self.clock.sync_to(server_date);
                    tracing::warn!(
                        operation = operation_name,
                        offset_ms = offset.num_milliseconds(),
                        %server_date,
                        "request rejected for clock skew, resynced clock and retrying",
                    );
                    attempt += 1;
                },
                Some(_) => {
                    tracing::debug!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        "clock skew persists after resync",
                    );
                    return Err(err);
                },
                None => return Err(err),
            }
        }
    }
}
