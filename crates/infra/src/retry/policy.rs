//! Retry thresholds and the backoff formula.

use std::time::Duration;

/// Retry policy configuration.
///
/// The first attempt is not a retry: an operation governed by this policy runs
/// at most `max_retries + 1` times.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt (0 = no retries)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Growth factor applied to the delay for every further retry
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_delay,
            backoff_multiplier,
        }
    }

    /// Create a policy with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry `n` (1-indexed): `initial_delay * backoff_multiplier^(n-1)`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let factor = self.backoff_multiplier.powi((retry - 1) as i32);
        if !factor.is_finite() || factor < 0.0 {
            return Duration::MAX;
        }

        Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }

    /// Check if another retry is allowed after `retries_so_far` retries.
    pub fn should_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_retries
    }

    /// Upper bound on attempts (first attempt included).
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
