// src/config/model.rs

use serde::Deserialize;

use crate::job::{JobCoder, JobInvocation, JobInvocationBuilder, RetryPolicy, RetryStrategy};
use crate::types::LogLevel;

/// Configuration as read from TOML, before validation.
///
/// ```toml
/// [logging]
/// level = "debug"
///
/// [coder]
/// prefix = "com.example.job."
/// include_extras = true
///
/// [retry]
/// policy = "linear"
/// initial_backoff = 60
/// maximum_backoff = 1800
/// ```
///
/// Every section is optional; an empty file yields the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDispatchConfig {
    #[serde(default)]
    pub logging: LoggingSection,

    #[serde(default)]
    pub coder: CoderSection,

    #[serde(default)]
    pub retry: RetrySection,
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Overrides `JOBDISPATCH_LOG` when set.
    #[serde(default)]
    pub level: Option<LogLevel>,
}

/// `[coder]` section. Controls how jobs from the backend are decoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoderSection {
    #[serde(default)]
    pub prefix: String,

    #[serde(default = "default_include_extras")]
    pub include_extras: bool,
}

fn default_include_extras() -> bool {
    true
}

impl Default for CoderSection {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            include_extras: default_include_extras(),
        }
    }
}

/// `[retry]` section: the retry strategy handed to new job builders.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    /// `"exponential"` (default) or `"linear"`.
    #[serde(default = "default_policy")]
    pub policy: String,

    /// Seconds.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff: u32,

    /// Seconds.
    #[serde(default = "default_maximum_backoff")]
    pub maximum_backoff: u32,
}

fn default_policy() -> String {
    "exponential".to_string()
}

fn default_initial_backoff() -> u32 {
    RetryStrategy::DEFAULT_EXPONENTIAL.initial_backoff
}

fn default_maximum_backoff() -> u32 {
    RetryStrategy::DEFAULT_EXPONENTIAL.maximum_backoff
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            initial_backoff: default_initial_backoff(),
            maximum_backoff: default_maximum_backoff(),
        }
    }
}

/// Validated configuration. Build it with `TryFrom<RawDispatchConfig>` or
/// [`load_and_validate`](crate::config::load_and_validate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub log_level: Option<LogLevel>,
    pub coder_prefix: String,
    pub include_extras: bool,
    pub default_retry: RetryStrategy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            coder_prefix: String::new(),
            include_extras: true,
            default_retry: RetryStrategy::DEFAULT_EXPONENTIAL,
        }
    }
}

impl DispatchConfig {
    pub(crate) fn new_unchecked(raw: RawDispatchConfig, policy: RetryPolicy) -> Self {
        Self {
            log_level: raw.logging.level,
            coder_prefix: raw.coder.prefix,
            include_extras: raw.coder.include_extras,
            default_retry: RetryStrategy::new(
                policy,
                raw.retry.initial_backoff,
                raw.retry.maximum_backoff,
            ),
        }
    }

    /// Coder for payloads coming from the scheduling backend.
    pub fn coder(&self) -> JobCoder {
        JobCoder::new(self.coder_prefix.clone(), self.include_extras)
    }

    /// A job builder preloaded with the configured retry strategy.
    pub fn job_builder(&self) -> JobInvocationBuilder {
        JobInvocation::builder().retry_strategy(self.default_retry)
    }
}
