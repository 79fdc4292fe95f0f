//! Retry strategy for same-provider retries.

use std::time::Duration;

use crate::error::UpstreamError;

/// Strategy for retrying failed upstream calls against the same provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryStrategy {
    /// Maximum number of calls, including the first.
    pub max_attempts: u32,
    /// Base delay between retries in milliseconds.
    pub base_delay_ms: u64,
    /// Whether to use exponential backoff.
    pub exponential_backoff: bool,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl RetryStrategy {
    /// Creates a strategy allowing `retries` extra calls after the first.
    pub fn new(retries: u32) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            base_delay_ms: 250,
            exponential_backoff: true,
            max_delay_ms: 2_000,
        }
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            exponential_backoff: false,
            max_delay_ms: 0,
        }
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    /// Calculates the delay after the given (1-based) failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = if self.exponential_backoff {
            let exp = attempt.saturating_sub(1).min(16);
            self.base_delay_ms.saturating_mul(2u64.pow(exp))
        } else {
            self.base_delay_ms
        };

        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Calculates the delay before retrying after `error`.
    ///
    /// A provider-requested `Retry-After` wins over the backoff when it is
    /// longer, but is still capped at the maximum delay.
    pub fn delay_after(&self, attempt: u32, error: &UpstreamError) -> Duration {
        let backoff = self.delay_for_attempt(attempt);
        match error.retry_after_ms {
            Some(ms) => Duration::from_millis(ms.min(self.max_delay_ms)).max(backoff),
            None => backoff,
        }
    }

    /// Determines if another call should follow the given failed attempt.
    pub fn should_retry(&self, attempt: u32, error: &UpstreamError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::no_retry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmgate_core::ErrorKind;

    #[test]
    fn test_exponential_backoff() {
        let strategy = RetryStrategy::new(3);

        assert_eq!(strategy.delay_for_attempt(1), Duration::from_millis(250));
        assert_eq!(strategy.delay_for_attempt(2), Duration::from_millis(500));
        assert_eq!(strategy.delay_for_attempt(3), Duration::from_millis(1_000));
        assert_eq!(strategy.delay_for_attempt(4), Duration::from_millis(2_000));
    }

    #[test]
    fn test_max_delay_cap() {
        let strategy = RetryStrategy::new(10).with_base_delay(1_000);

        // Capped at 2 seconds
        assert_eq!(strategy.delay_for_attempt(5), Duration::from_millis(2_000));
        assert_eq!(strategy.delay_for_attempt(40), Duration::from_millis(2_000));
    }

    #[test]
    fn test_only_retryable_kinds_retry() {
        let strategy = RetryStrategy::new(2);
        let server = UpstreamError::new(ErrorKind::ServerError, "x");
        let auth = UpstreamError::new(ErrorKind::AuthFailure, "x");

        assert!(strategy.should_retry(1, &server));
        assert!(strategy.should_retry(2, &server));
        assert!(!strategy.should_retry(3, &server));
        assert!(!strategy.should_retry(1, &auth));
        assert!(!RetryStrategy::no_retry().should_retry(1, &server));
    }

    #[test]
    fn test_retry_after_honored_up_to_cap() {
        let strategy = RetryStrategy::new(1);
        let short = UpstreamError::new(ErrorKind::RateLimited, "x").with_retry_after(Some(1_500));
        let long = UpstreamError::new(ErrorKind::RateLimited, "x").with_retry_after(Some(60_000));

        assert_eq!(strategy.delay_after(1, &short), Duration::from_millis(1_500));
        assert_eq!(strategy.delay_after(1, &long), Duration::from_millis(2_000));
    }
}
