//! Retry budget and backoff curve.
//!
//! Both the transient-auth retry on create and the consistency poller read
//! the same [`RetryBudget`] and [`BackoffPolicy`] from the client
//! configuration. The budget counts attempts, not retries: a budget of 5
//! means one initial attempt plus at most four more.
//!
//! The backoff is capped exponential: `min(initial * 2^(n-1), max)` for
//! attempt `n >= 1`. It never returns zero, never decreases, and never
//! exceeds `max`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum attempts for retryable operations.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default delay after the first attempt.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(250);

/// Default ceiling for a single delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Smallest delay ever returned.
const MIN_BACKOFF: Duration = Duration::from_millis(1);

/// Maximum number of attempts for a retryable operation. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RetryBudget(u32);

impl RetryBudget {
    /// Creates a budget, clamping zero up to one attempt.
    #[must_use]
    pub const fn new(max_attempts: u32) -> Self {
        if max_attempts == 0 {
            Self(1)
        } else {
            Self(max_attempts)
        }
    }

    /// Maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.0
    }

    /// Returns true if another attempt is allowed after `attempts_made`.
    #[must_use]
    pub const fn allows_another(&self, attempts_made: u32) -> bool {
        attempts_made < self.0
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self(DEFAULT_MAX_ATTEMPTS)
    }
}

impl fmt::Display for RetryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for RetryBudget {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 {
            Err("retry budget must allow at least one attempt".to_string())
        } else {
            Ok(Self(value))
        }
    }
}

impl From<RetryBudget> for u32 {
    fn from(value: RetryBudget) -> Self {
        value.0
    }
}

/// Capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    initial: Duration,
    max: Duration,
}

impl BackoffPolicy {
    /// Creates a policy.
    ///
    /// `initial` is raised to one millisecond if zero, and `max` is raised to
    /// `initial` if smaller.
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(MIN_BACKOFF);
        Self {
            initial,
            max: max.max(initial),
        }
    }

    /// Delay after the first attempt.
    #[must_use]
    pub const fn initial(&self) -> Duration {
        self.initial
    }

    /// Ceiling for a single delay.
    #[must_use]
    pub const fn max(&self) -> Duration {
        self.max
    }

    /// Delay to wait after attempt `attempt` (1-based) before the next one.
    ///
    /// Attempt 0 is treated as attempt 1.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial
            .saturating_mul(1u32 << exponent)
            .min(self.max)
    }

    /// Total time slept if every attempt of `budget` fails.
    #[must_use]
    pub fn worst_case_wait(&self, budget: RetryBudget) -> Duration {
        (1..budget.max_attempts())
            .map(|attempt| self.delay_for(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn budget_never_zero() {
        assert_eq!(RetryBudget::new(0).max_attempts(), 1);
        assert!(RetryBudget::new(3).allows_another(2));
        assert!(!RetryBudget::new(3).allows_another(3));
    }

    #[test]
    fn budget_rejects_zero_on_the_wire() {
        let result: Result<RetryBudget, _> = serde_json::from_str("0");
        assert!(result.is_err());
    }

    #[test]
    fn delay_doubles_until_capped() {
        let policy = BackoffPolicy::new(Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(500));
    }

    #[test]
    fn zero_initial_is_raised() {
        let policy = BackoffPolicy::new(Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_millis(1));
    }

    #[test]
    fn worst_case_wait_sums_retries_only() {
        let policy = BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(25));
        // attempts 1..4 sleep 10 + 20 + 25
        assert_eq!(
            policy.worst_case_wait(RetryBudget::new(4)),
            Duration::from_millis(55)
        );
        assert_eq!(policy.worst_case_wait(RetryBudget::new(1)), Duration::ZERO);
    }

    proptest! {
        #[test]
        fn delay_is_monotone_bounded_and_nonzero(
            initial_ms in 0u64..5_000,
            max_ms in 0u64..60_000,
            attempt in 1u32..64,
        ) {
            let policy = BackoffPolicy::new(
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
            );
            let here = policy.delay_for(attempt);
            let next = policy.delay_for(attempt + 1);
            prop_assert!(here > Duration::ZERO);
            prop_assert!(here <= next);
            prop_assert!(next <= policy.max());
        }
    }
}
