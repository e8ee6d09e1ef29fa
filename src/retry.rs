//! Exponential backoff with jitter.
//!
//! Both the HTTP client and the orchestrator retry with the same formula, each
//! with its own [`RetryPolicy`] and its own attempt counter:
//!
//! ```text
//! delay  = min(max_backoff, retry_after.unwrap_or(base_backoff * 2^(attempt-1)))
//! delay += uniform(0 ..= delay * 0.5)
//! ```

use rand::{Rng, rng};
use std::time::Duration;

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles with each further attempt.
    pub base_backoff: Duration,
    /// Cap applied before jitter is added.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_backoff,
        }
    }

    /// Deterministic part of the delay after failed attempt number `attempt` (1-based).
    pub fn base_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = match retry_after {
            Some(server_delay) => server_delay,
            None => {
                let exponent = attempt.saturating_sub(1).min(31);
                self.base_backoff.saturating_mul(1u32 << exponent)
            }
        };
        delay.min(self.max_backoff)
    }

    /// Full delay to sleep after failed attempt `attempt`, jitter included.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt that just failed, starting at 1
    /// * `retry_after` - Server-requested delay, which replaces the exponential base
    ///
    /// # Returns
    ///
    /// The capped base delay multiplied by a random factor in `[1.0, 1.5]`.
    pub fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = self.base_delay(attempt, retry_after);
        let jitter: f64 = rng().random_range(0.0..=0.5);
        delay.mul_f64(1.0 + jitter)
    }
}
