// src/job/retry.rs

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the backoff grows between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPolicy {
    /// `initial_backoff * 2 ^ (num_failures - 1)`
    Exponential,
    /// `initial_backoff * num_failures`
    Linear,
}

impl RetryPolicy {
    pub fn code(self) -> i64 {
        match self {
            RetryPolicy::Exponential => 1,
            RetryPolicy::Linear => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(RetryPolicy::Exponential),
            2 => Some(RetryPolicy::Linear),
            _ => None,
        }
    }
}

impl FromStr for RetryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exponential" => Ok(RetryPolicy::Exponential),
            "linear" => Ok(RetryPolicy::Linear),
            other => Err(format!(
                "invalid retry policy: {other} (expected \"exponential\" or \"linear\")"
            )),
        }
    }
}

/// Backoff applied by the scheduling client when a job reports
/// [`JobResult::FailRetry`](crate::types::JobResult::FailRetry).
///
/// Backoffs are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RetryStrategy {
    pub policy: RetryPolicy,
    pub initial_backoff: u32,
    pub maximum_backoff: u32,
}

impl RetryStrategy {
    /// Expected schedule is: [30s, 60s, 120s, 240s, ..., 3600s]
    pub const DEFAULT_EXPONENTIAL: RetryStrategy = RetryStrategy {
        policy: RetryPolicy::Exponential,
        initial_backoff: 30,
        maximum_backoff: 3600,
    };

    /// Expected schedule is: [30s, 60s, 90s, 120s, ..., 3600s]
    pub const DEFAULT_LINEAR: RetryStrategy = RetryStrategy {
        policy: RetryPolicy::Linear,
        initial_backoff: 30,
        maximum_backoff: 3600,
    };

    pub fn new(policy: RetryPolicy, initial_backoff: u32, maximum_backoff: u32) -> Self {
        Self {
            policy,
            initial_backoff,
            maximum_backoff,
        }
    }

    /// Backoff to wait after `num_failures` consecutive failures.
    ///
    /// Zero failures means no backoff.
    pub fn backoff_for(&self, num_failures: u32) -> Duration {
        if num_failures == 0 {
            return Duration::ZERO;
        }
        let initial = u64::from(self.initial_backoff);
        let raw = match self.policy {
            RetryPolicy::Linear => initial.saturating_mul(u64::from(num_failures)),
            RetryPolicy::Exponential => {
                let shift = (num_failures - 1).min(63);
                initial.saturating_mul(1u64.checked_shl(shift).unwrap_or(u64::MAX))
            }
        };
        Duration::from_secs(raw.min(u64::from(self.maximum_backoff)))
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::DEFAULT_EXPONENTIAL
    }
}
