//! Retry policy with backoff and jitter
//!
//! Shared by the HTTP client (transport failures) and the watermark store
//! (transient connectivity failures).

use crate::types::BackoffType;
use std::time::{Duration, SystemTime};

/// Bounded retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay cap for the first retry
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
    /// How the delay cap grows between attempts
    pub backoff_type: BackoffType,
    /// Randomise each delay in `[0, cap]`
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            backoff_type: BackoffType::Exponential,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a new exponential policy with jitter
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
            ..Self::default()
        }
    }

    /// Single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Disable jitter (deterministic delays)
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Set the backoff type
    #[must_use]
    pub fn with_backoff_type(mut self, backoff_type: BackoffType) -> Self {
        self.backoff_type = backoff_type;
        self
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Upper bound of the delay before retry number `retry` (0-based)
    pub fn backoff_cap(&self, retry: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => self.initial_backoff,
            BackoffType::Linear => self.initial_backoff.saturating_mul(retry.saturating_add(1)),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(retry);
                self.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_backoff)
    }

    /// Delay to sleep before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let cap = self.backoff_cap(retry);
        if self.jitter {
            full_jitter(cap)
        } else {
            cap
        }
    }
}

/// Pick a delay uniformly-ish in `[0, cap]`.
///
/// Sub-second clock nanos are a good enough entropy source for spreading
/// retries; no need for a full RNG here.
fn full_jitter(cap: Duration) -> Duration {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let fraction = f64::from(nanos % 1_000_000) / 1_000_000.0;
    cap.mul_f64(fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 8);
        assert!(policy.jitter);
        assert_eq!(policy.backoff_type, BackoffType::Exponential);
    }

    #[test]
    fn test_exponential_cap_grows_and_saturates() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(policy.backoff_cap(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_cap(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_cap(2), Duration::from_millis(400));
        assert_eq!(policy.backoff_cap(3), Duration::from_millis(800));
        assert_eq!(policy.backoff_cap(4), Duration::from_secs(1));
        assert_eq!(policy.backoff_cap(40), Duration::from_secs(1));
    }

    #[test]
    fn test_linear_and_constant() {
        let base = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(10));

        let linear = base.clone().with_backoff_type(BackoffType::Linear);
        assert_eq!(linear.backoff_cap(0), Duration::from_millis(100));
        assert_eq!(linear.backoff_cap(2), Duration::from_millis(300));

        let constant = base.with_backoff_type(BackoffType::Constant);
        assert_eq!(constant.backoff_cap(7), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_within_cap() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(10));
        for retry in 0..5 {
            assert!(policy.delay_for(retry) <= policy.backoff_cap(retry));
        }
    }

    #[test]
    fn test_without_jitter_is_deterministic() {
        let policy =
            RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(10)).without_jitter();
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!RetryPolicy::no_retry().should_retry(1));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts, 1);
    }
}
