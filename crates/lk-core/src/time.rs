//! Time utilities for labkeeper
//!
//! All persisted instants are unix milliseconds. Components read the time
//! through a [`Clock`] so timer behaviour can be driven by tokio's paused
//! clock in tests.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system time is before the Unix epoch.
///
/// # Examples
/// ```
/// use lk_core::time::current_time_millis;
///
/// let now = current_time_millis();
/// assert!(now > 0);
/// ```
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Duration from `now` until `deadline`, zero if already past.
pub fn until(deadline_millis: u64, now_millis: u64) -> Duration {
    Duration::from_millis(deadline_millis.saturating_sub(now_millis))
}

/// Convert a duration to whole milliseconds, saturating at `u64::MAX`.
pub fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    /// Current time in unix milliseconds
    fn now_millis(&self) -> u64;
}

/// Clock backed by the system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        current_time_millis()
    }
}

/// Clock that advances with tokio's timer.
///
/// Anchored to a fixed unix time at construction, it moves forward with
/// `tokio::time::Instant`, which makes it follow `tokio::time::pause` and
/// `advance` in tests.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base_millis: u64,
    origin: tokio::time::Instant,
}

impl TokioClock {
    /// Create a clock reading `base_millis` right now
    pub fn starting_at(base_millis: u64) -> Self {
        Self {
            base_millis,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now_millis(&self) -> u64 {
        self.base_millis
            .saturating_add(as_millis(self.origin.elapsed()))
    }
}
