//! Retry policy for failed cleanups

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Delay before the first retry of a failed cleanup
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// How a timer actor re-arms after a failed cleanup attempt.
///
/// The default retries forever at a fixed five minute interval. Setting
/// `multiplier` above 1.0 turns it into exponential backoff capped at
/// `max_interval`, and `max_attempts` stops re-arming after that many
/// consecutive failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay after the first failure
    #[serde(with = "duration_secs")]
    pub interval: Duration,

    /// Growth factor per further failure (values below 1.0 act as 1.0)
    pub multiplier: f64,

    /// Upper bound on the delay
    #[serde(with = "duration_secs")]
    pub max_interval: Duration,

    /// Jitter factor (0.0 to 1.0) added on top of the delay
    pub jitter: f64,

    /// Give up after this many failed attempts; unset retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RETRY_INTERVAL,
            multiplier: 1.0,
            max_interval: Duration::from_secs(60 * 60),
            jitter: 0.0,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Fixed-interval policy that never gives up
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Whether `attempts` failures exhaust the policy
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    /// Delay before the retry following failure number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return delay;
        }

        let jitter = self.jitter.min(1.0);
        let jitter_amount = delay.as_secs_f64() * jitter * rand::random::<f64>();
        delay + Duration::from_secs_f64(jitter_amount)
    }

    /// Delay without jitter
    fn base_delay(&self, attempt: u32) -> Duration {
        let cap = self.max_interval.max(self.interval);
        let multiplier = self.multiplier.max(1.0);
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);

        let secs = self.interval.as_secs_f64() * multiplier.powi(exponent);
        if !secs.is_finite() || secs >= cap.as_secs_f64() {
            return if multiplier > 1.0 { cap } else { self.interval };
        }
        Duration::from_secs_f64(secs)
    }
}
