//! Retry and backoff policy for directory operations.

use std::time::Duration;

/// Governs retries, backoff and the per-operation deadline.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the initial try (default: 5).
    pub max_retries: u32,
    /// First backoff delay (default: 1s).
    pub initial_delay: Duration,
    /// Backoff cap (default: 30s).
    pub max_delay: Duration,
    /// Exponential growth factor (default: 2.0).
    pub multiplier: f64,
    /// Whether a server-supplied `Retry-After` overrides computed backoff
    /// (default: true).
    pub honor_retry_after: bool,
    /// Overall deadline per logical operation, independent of the retry
    /// loop (default: 120s).
    pub operation_timeout: Duration,
    /// Status codes that trigger a retry (default: 429, 500, 502, 503, 504).
    pub retryable_status: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
            honor_retry_after: true,
            operation_timeout: Duration::from_secs(120),
            retryable_status: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// A policy with short delays for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            operation_timeout: Duration::from_secs(5),
            ..Self::default()
        }
    }

    /// Validates the policy.
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_delay.is_zero() {
            return Err("initial_delay must be > 0".to_string());
        }
        if self.max_delay < self.initial_delay {
            return Err("max_delay must be >= initial_delay".to_string());
        }
        if self.multiplier < 1.0 {
            return Err("multiplier must be >= 1.0".to_string());
        }
        if self.operation_timeout.is_zero() {
            return Err("operation_timeout must be > 0".to_string());
        }
        Ok(())
    }

    /// Whether the status code should be retried.
    #[must_use]
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_status.contains(&status)
    }

    /// Backoff delay for a zero-based attempt:
    /// `min(max_delay, initial_delay * multiplier^attempt)`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay.as_millis() as f64;
        let max = self.max_delay.as_millis() as f64;
        let delay = (initial * self.multiplier.powi(attempt as i32)).min(max);
        Duration::from_millis(delay as u64)
    }

    /// Delay before the next attempt, honoring the server's wait hint when
    /// configured to.
    #[must_use]
    pub fn retry_delay(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        match retry_after_secs {
            Some(secs) if self.honor_retry_after => Duration::from_secs(secs),
            _ => self.delay_for_attempt(attempt),
        }
    }

    /// Parses a `Retry-After` header value in seconds form.
    #[must_use]
    pub fn parse_retry_after(value: &str) -> Option<u64> {
        value.trim().parse::<u64>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(1000));
        assert_eq!(policy.max_delay, Duration::from_millis(30_000));
        assert!(policy.honor_retry_after);
        assert_eq!(policy.retryable_status, vec![429, 500, 502, 503, 504]);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn backoff_sequence_is_capped() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            max_delay: Duration::from_millis(30_000),
            ..Default::default()
        };
        let delays: Vec<u64> = (0..6)
            .map(|a| policy.delay_for_attempt(a).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000]);
    }

    #[test]
    fn retry_after_hint_wins_when_honored() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retry_delay(3, Some(7)), Duration::from_secs(7));
        assert_eq!(policy.retry_delay(0, None), Duration::from_millis(1000));
    }

    #[test]
    fn retry_after_hint_ignored_when_disabled() {
        let policy = RetryPolicy {
            honor_retry_after: false,
            ..Default::default()
        };
        assert_eq!(policy.retry_delay(1, Some(7)), Duration::from_millis(2000));
    }

    #[test]
    fn parse_retry_after_values() {
        assert_eq!(RetryPolicy::parse_retry_after("60"), Some(60));
        assert_eq!(RetryPolicy::parse_retry_after("  120  "), Some(120));
        assert_eq!(RetryPolicy::parse_retry_after("Wed, 21 Oct"), None);
        assert_eq!(RetryPolicy::parse_retry_after(""), None);
    }

    #[test]
    fn retryable_status_set_is_configurable() {
        let policy = RetryPolicy {
            retryable_status: vec![429],
            ..Default::default()
        };
        assert!(policy.is_retryable(429));
        assert!(!policy.is_retryable(503));
    }

    #[test]
    fn validation_rejects_bad_policies() {
        let mut policy = RetryPolicy::default();
        policy.initial_delay = Duration::ZERO;
        assert!(policy.validate().is_err());

        let mut policy = RetryPolicy::default();
        policy.max_delay = Duration::from_millis(10);
        assert!(policy.validate().is_err());

        let mut policy = RetryPolicy::default();
        policy.multiplier = 0.5;
        assert!(policy.validate().is_err());
    }
}
