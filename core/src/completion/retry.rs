use std::time::Duration;

use super::ProviderError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Bounded exponential backoff. Only overload failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable(&self, error: &ProviderError) -> bool {
        matches!(error, ProviderError::Overloaded(_))
    }

    /// Delay to wait after failed attempt number `failed_attempt` (1-based),
    /// or `None` once the attempt budget is spent.
    pub fn delay_after(&self, failed_attempt: u32) -> Option<Duration> {
        if failed_attempt == 0 || failed_attempt >= self.max_attempts {
            return None;
        }

        let factor = self.multiplier.saturating_pow(failed_attempt - 1);
        Some(self.base_delay.saturating_mul(factor))
    }

    /// Sum of every backoff delay the policy can impose.
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts)
            .filter_map(|attempt| self.delay_after(attempt))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_from_one_second() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (1..=5).map(|n| policy.delay_after(n)).collect();
        assert_eq!(
            delays,
            vec![
                Some(Duration::from_millis(1_000)),
                Some(Duration::from_millis(2_000)),
                Some(Duration::from_millis(4_000)),
                Some(Duration::from_millis(8_000)),
                None,
            ]
        );
        assert_eq!(policy.total_backoff(), Duration::from_secs(15));
    }

    #[test]
    fn only_overload_is_retryable() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&ProviderError::Overloaded("503".into())));
        assert!(!policy.is_retryable(&ProviderError::InvalidCredential("bad".into())));
        assert!(!policy.is_retryable(&ProviderError::Network("reset".into())));
        assert!(!policy.is_retryable(&ProviderError::Status {
            status: 500,
            message: "oops".into()
        }));
    }

    #[test]
    fn single_attempt_policy_never_waits() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_after(1), None);
        assert_eq!(policy.total_backoff(), Duration::ZERO);
    }
}
