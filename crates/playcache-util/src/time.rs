//! Time utilities for playcache
//!
//! Two notions of time are used:
//! - Wall-clock UTC time, for `synced_at` / `last_synced_at` bookkeeping
//!   and widget envelopes.
//! - A per-device logical clock, for record `created_at` values. It is
//!   strictly increasing, so it orders records and makes generated ids unique
//!   even when the wall clock stalls or jumps backwards.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Get the current wall-clock time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    now().timestamp_millis()
}

/// Monotonic per-device clock producing millisecond-resolution timestamps.
///
/// Each call to [`LogicalClock::tick`] returns a value strictly greater than
/// every value returned before it (and every value passed to
/// [`LogicalClock::observe`]). It tracks wall-clock time while the wall clock
/// moves forward and otherwise advances by one.
#[derive(Debug, Default)]
pub struct LogicalClock {
    last: AtomicI64,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Create a clock that will never return a value at or below `seed`.
    ///
    /// Used on startup with the newest `created_at` found in the store.
    pub fn seeded(seed: i64) -> Self {
        Self {
            last: AtomicI64::new(seed),
        }
    }

    /// Produce the next timestamp.
    pub fn tick(&self) -> i64 {
        self.tick_at(now_millis())
    }

    /// Produce the next timestamp given an explicit wall-clock reading.
    pub fn tick_at(&self, wall_millis: i64) -> i64 {
        let mut current = self.last.load(Ordering::SeqCst);
        loop {
            let next = wall_millis.max(current + 1);
            match self
                .last
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Make sure future ticks are above `timestamp`.
    pub fn observe(&self, timestamp: i64) {
        self.last.fetch_max(timestamp, Ordering::SeqCst);
    }

    /// Last value handed out (or observed).
    pub fn last(&self) -> i64 {
        self.last.load(Ordering::SeqCst)
    }
}

/// Format a timestamp for CLI output.
pub fn format_datetime_full(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
