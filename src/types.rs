// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Terminal status of one execution attempt, as seen by the scheduling
/// client.
///
/// The numeric codes are stable and used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobResult {
    /// The job ran to completion. One-off jobs are forgotten, recurring
    /// jobs have their trigger reset.
    Success,
    /// The job failed and should be retried after the backoff period.
    FailRetry,
    /// The job failed and should not be retried.
    FailNoRetry,
}

impl JobResult {
    pub fn code(self) -> i32 {
        match self {
            JobResult::Success => 0,
            JobResult::FailRetry => 1,
            JobResult::FailNoRetry => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(JobResult::Success),
            1 => Some(JobResult::FailRetry),
            2 => Some(JobResult::FailNoRetry),
            _ => None,
        }
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobResult::Success => "SUCCESS",
            JobResult::FailRetry => "FAIL_RETRY",
            JobResult::FailNoRetry => "FAIL_NORETRY",
        };
        f.write_str(s)
    }
}

/// How long a scheduled job survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// Dropped when the device reboots.
    UntilNextBoot,
    /// Persisted across reboots.
    Forever,
}

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime::UntilNextBoot
    }
}

impl Lifetime {
    pub fn code(self) -> i64 {
        match self {
            Lifetime::UntilNextBoot => 1,
            Lifetime::Forever => 2,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            2 => Lifetime::Forever,
            _ => Lifetime::UntilNextBoot,
        }
    }
}

/// Log level accepted from config or the environment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!(
                "invalid log level: {other} (expected error, warn, info, debug or trace)"
            )),
        }
    }
}
