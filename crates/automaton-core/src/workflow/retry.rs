//! Retry backoff for failed task attempts.
//!
//! Stateless: every decision is a pure function of the attempt count and the
//! task's configured retry budget.

use std::time::Duration;

/// Stateless retry backoff policy.
pub struct RetryPolicy;

impl RetryPolicy {
    /// Whether another attempt should be made.
    ///
    /// `attempt` is 1-based (the first execution is attempt 1). A retry is
    /// attempted while `attempt <= max_retries`; attempt `max_retries + 1` is
    /// the point at which the task transitions to `Failed`.
    pub fn should_retry(attempt: u32, max_retries: u32) -> bool {
        attempt <= max_retries
    }

    /// Backoff duration before the given retry attempt: `min(2^attempt, 10)`
    /// seconds.
    pub fn backoff(attempt: u32) -> Duration {
        let secs = 2u64.saturating_pow(attempt).min(10);
        Duration::from_secs(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_retry_within_budget() {
        assert!(RetryPolicy::should_retry(1, 3));
        assert!(RetryPolicy::should_retry(3, 3));
    }

    #[test]
    fn should_not_retry_past_budget() {
        assert!(!RetryPolicy::should_retry(4, 3));
    }

    #[test]
    fn backoff_grows_exponentially_then_caps_at_ten() {
        assert_eq!(RetryPolicy::backoff(1), Duration::from_secs(2));
        assert_eq!(RetryPolicy::backoff(2), Duration::from_secs(4));
        assert_eq!(RetryPolicy::backoff(3), Duration::from_secs(8));
        assert_eq!(RetryPolicy::backoff(4), Duration::from_secs(10));
        assert_eq!(RetryPolicy::backoff(10), Duration::from_secs(10));
    }
}
