// src/config/validate.rs

use crate::config::model::{DispatchConfig, RawDispatchConfig};
use crate::errors::{DispatchError, Result};
use crate::job::{DefaultJobValidator, JobValidator, RetryPolicy, RetryStrategy};

impl TryFrom<RawDispatchConfig> for DispatchConfig {
    type Error = DispatchError;

    fn try_from(raw: RawDispatchConfig) -> std::result::Result<Self, Self::Error> {
        let policy = validate_raw_config(&raw)?;
        Ok(DispatchConfig::new_unchecked(raw, policy))
    }
}

fn validate_raw_config(cfg: &RawDispatchConfig) -> Result<RetryPolicy> {
    validate_coder(cfg)?;
    validate_retry(cfg)
}

fn validate_coder(cfg: &RawDispatchConfig) -> Result<()> {
    if cfg.coder.prefix.chars().any(char::is_whitespace) {
        return Err(DispatchError::ConfigError(format!(
            "[coder].prefix must not contain whitespace (got {:?})",
            cfg.coder.prefix
        )));
    }
    Ok(())
}

fn validate_retry(cfg: &RawDispatchConfig) -> Result<RetryPolicy> {
    let policy: RetryPolicy = cfg
        .retry
        .policy
        .parse()
        .map_err(|e: String| DispatchError::ConfigError(format!("[retry].policy: {e}")))?;

    let strategy = RetryStrategy::new(
        policy,
        cfg.retry.initial_backoff,
        cfg.retry.maximum_backoff,
    );
    if let Some(errors) = DefaultJobValidator.validate_retry_strategy(&strategy) {
        return Err(DispatchError::Validation {
            context: "invalid [retry] section".to_string(),
            errors,
        });
    }

    Ok(policy)
}

/// Validate an already parsed configuration without converting it.
pub fn validate_config(cfg: &RawDispatchConfig) -> Result<()> {
    validate_raw_config(cfg).map(|_| ())
}
