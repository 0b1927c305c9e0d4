//! Bounded retry policy for recognition session setup

use std::time::Duration;

use crate::config::RecognitionConfig;

/// Retry policy for starting a recognition session
///
/// Setup is attempted once, then retried up to `max_retries` times with a
/// fixed backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Delay before each retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Build the policy from recognition settings
    #[must_use]
    pub const fn from_config(config: &RecognitionConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: config.retry_backoff,
        }
    }

    /// Delay before the next attempt, given how many retries were already made
    ///
    /// Returns `None` once the retry budget is spent.
    #[must_use]
    pub fn delay_for_retry(&self, retries_made: u32) -> Option<Duration> {
        (retries_made < self.max_retries).then_some(self.backoff)
    }

    /// Total setup attempts before giving up
    #[must_use]
    pub const fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
