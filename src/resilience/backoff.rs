//! # Backoff Policy
//!
//! Jitter-free exponential schedule: the N-th retry waits
//! `initial_delay × multiplier^(N-1)`, capped at `max_delay`. With the defaults that is
//! 1s, 2s, 4s, 8s before attempts two through five.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::RetryConfig;

/// Retry limits and delay schedule for one [`RetryExecutor`](super::RetryExecutor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().to_policy()
    }
}

impl RetryPolicy {
    /// Test/CI profile with a longer retry window
    pub fn ci() -> Self {
        RetryConfig::ci().to_policy()
    }

    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay scheduled before the `retry`-th retry (1-based)
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let seconds = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        if !seconds.is_finite() || seconds >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else if seconds <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(seconds)
        }
    }

    /// Every delay the policy can schedule, in order
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts)
            .map(|retry| self.delay_for_retry(retry))
            .collect()
    }

    /// Total time spent sleeping if every attempt fails
    pub fn worst_case_delay(&self) -> Duration {
        self.schedule().into_iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.schedule(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
        assert_eq!(policy.worst_case_delay(), Duration::from_secs(15));
    }

    #[test]
    fn test_negative_multiplier_never_schedules_negative_delay() {
        let policy = RetryPolicy {
            multiplier: -2.0,
            ..RetryPolicy::default()
        };

        assert_eq!(policy.delay_for_retry(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_retry(2), Duration::ZERO);
        assert_eq!(policy.delay_for_retry(3), Duration::from_secs(4));
        assert_eq!(policy.schedule().len(), 4);
    }

    #[test]
    fn test_schedule_caps_at_ceiling() {
        let policy = RetryPolicy::ci();
        let schedule = policy.schedule();

        assert_eq!(schedule.len(), 9);
        assert_eq!(schedule[5], Duration::from_secs(32));
        assert_eq!(schedule[6], Duration::from_secs(60));
        assert_eq!(schedule[8], Duration::from_secs(60));
        assert_eq!(policy.worst_case_delay(), Duration::from_secs(243));
    }

    #[test]
    fn test_huge_retry_index_does_not_overflow() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_retry(u32::MAX), policy.max_delay);
    }

    #[test]
    fn test_no_retry_has_empty_schedule() {
        assert!(RetryPolicy::no_retry().schedule().is_empty());
    }
}
