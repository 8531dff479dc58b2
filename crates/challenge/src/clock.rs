//! Server-synchronized clock.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};

/// Local clock corrected by an offset learned from the server.
///
/// Request timestamps are taken from [`now`](Self::now). The offset starts at
/// zero and is replaced whenever the server rejects a request for timestamp
/// skew and reports its own date.
#[derive(Debug, Default)]
pub struct SyncedClock {
    offset_millis: AtomicI64,
    resyncs: AtomicU64,
}

impl SyncedClock {
    /// Creates a clock with no offset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the corrected current time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.offset()
    }

    /// Returns the current offset from the local clock.
    #[must_use]
    pub fn offset(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.offset_millis.load(Ordering::Acquire))
    }

    /// Sets the offset so that [`now`](Self::now) matches `server_date`.
    ///
    /// Returns the new offset.
    pub fn sync_to(&self, server_date: DateTime<Utc>) -> TimeDelta {
        let offset = server_date.signed_duration_since(Utc::now());
        self.offset_millis.store(offset.num_milliseconds(), Ordering::Release);
        self.resyncs.fetch_add(1, Ordering::Relaxed);
        offset
    }

    /// Returns how many times the clock has been resynchronized.
    #[must_use]
    pub fn resync_count(&self) -> u64 {
        self.resyncs.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clock_has_no_offset() {
        let clock = SyncedClock::new();
        assert_eq!(clock.offset(), TimeDelta::zero());
        assert_eq!(clock.resync_count(), 0);
    }

    #[test]
    fn test_sync_to_future_server_date() {
        let clock = SyncedClock::new();
        let server_date = Utc::now() + TimeDelta::hours(1);

        let offset = clock.sync_to(server_date);

        assert!(offset > TimeDelta::minutes(59), "offset {offset}");
        assert!((clock.now() - server_date).abs() < TimeDelta::seconds(5));
        assert_eq!(clock.resync_count(), 1);
    }

    #[test]
    fn test_sync_to_past_server_date() {
        let clock = SyncedClock::new();

        let offset = clock.sync_to(Utc::now() - TimeDelta::minutes(10));

        assert!(offset < TimeDelta::minutes(-9), "offset {offset}");
        assert!(clock.now() < Utc::now());
    }
}
