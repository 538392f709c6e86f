// src/job/validate.rs

//! Pluggable validation of jobs, triggers and retry strategies.

use std::sync::Arc;

use crate::errors::{DispatchError, Result};
use crate::job::invocation::JobInvocation;
use crate::job::retry::RetryStrategy;
use crate::job::trigger::Trigger;

/// Tags longer than this are rejected.
pub const MAX_TAG_LENGTH: usize = 100;
/// Smallest accepted initial backoff, in seconds.
pub const MIN_INITIAL_BACKOFF: u32 = 30;
/// Maximum backoff must be strictly greater than this, in seconds.
pub const MIN_MAXIMUM_BACKOFF: u32 = 300;

/// A validation strategy. `None` means valid; otherwise the list of
/// problems found.
pub trait JobValidator: Send + Sync {
    fn validate_job(&self, job: &JobInvocation) -> Option<Vec<String>>;
    fn validate_trigger(&self, trigger: &Trigger) -> Option<Vec<String>>;
    fn validate_retry_strategy(&self, retry: &RetryStrategy) -> Option<Vec<String>>;
}

/// The validator used unless the embedding plugs in its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultJobValidator;

impl JobValidator for DefaultJobValidator {
    fn validate_job(&self, job: &JobInvocation) -> Option<Vec<String>> {
        let mut errors = Vec::new();

        if job.tag().is_empty() {
            errors.push("Tag can't be empty".to_string());
        } else if job.tag().chars().count() > MAX_TAG_LENGTH {
            errors.push(format!("Tag must be shorter than {MAX_TAG_LENGTH} characters"));
        }

        if job.target().is_empty() {
            errors.push("Target can't be empty".to_string());
        }

        if job.is_recurring() && matches!(job.trigger(), Trigger::Now) {
            errors.push("Recurring jobs can't use the NOW trigger".to_string());
        }

        errors.extend(self.validate_trigger(job.trigger()).unwrap_or_default());
        errors.extend(
            self.validate_retry_strategy(job.retry_strategy())
                .unwrap_or_default(),
        );

        into_option(errors)
    }

    fn validate_trigger(&self, trigger: &Trigger) -> Option<Vec<String>> {
        let mut errors = Vec::new();
        match trigger {
            Trigger::Now => {}
            Trigger::ExecutionWindow { start, end } => {
                if *start < 0 {
                    errors.push("Window start can't be negative".to_string());
                }
                if end < start {
                    errors.push("Window end can't be less than window start".to_string());
                }
            }
            Trigger::ContentChange { uris } => {
                if uris.is_empty() {
                    errors.push("Content trigger must observe at least one URI".to_string());
                }
            }
        }
        into_option(errors)
    }

    fn validate_retry_strategy(&self, retry: &RetryStrategy) -> Option<Vec<String>> {
        let mut errors = Vec::new();

        if retry.initial_backoff < MIN_INITIAL_BACKOFF {
            errors.push(format!(
                "Initial backoff must be at least {MIN_INITIAL_BACKOFF}s"
            ));
        }
        if retry.maximum_backoff < MIN_MAXIMUM_BACKOFF {
            errors.push(format!(
                "Maximum backoff must be greater than {MIN_MAXIMUM_BACKOFF}s (5 minutes)"
            ));
        }
        if retry.maximum_backoff < retry.initial_backoff {
            errors.push(
                "Maximum backoff must be greater than or equal to initial backoff".to_string(),
            );
        }

        into_option(errors)
    }
}

fn into_option(errors: Vec<String>) -> Option<Vec<String>> {
    if errors.is_empty() { None } else { Some(errors) }
}

/// Wraps a [`JobValidator`] and turns its findings into errors.
#[derive(Clone)]
pub struct ValidationEnforcer {
    validator: Arc<dyn JobValidator>,
}

impl Default for ValidationEnforcer {
    fn default() -> Self {
        Self::new(Arc::new(DefaultJobValidator))
    }
}

impl std::fmt::Debug for ValidationEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationEnforcer").finish_non_exhaustive()
    }
}

impl ValidationEnforcer {
    pub fn new(validator: Arc<dyn JobValidator>) -> Self {
        Self { validator }
    }

    pub fn validate(&self, job: &JobInvocation) -> Option<Vec<String>> {
        self.validator.validate_job(job)
    }

    pub fn is_valid(&self, job: &JobInvocation) -> bool {
        self.validate(job).is_none()
    }

    pub fn is_valid_trigger(&self, trigger: &Trigger) -> bool {
        self.validator.validate_trigger(trigger).is_none()
    }

    pub fn is_valid_retry_strategy(&self, retry: &RetryStrategy) -> bool {
        self.validator.validate_retry_strategy(retry).is_none()
    }

    pub fn ensure_valid(&self, job: &JobInvocation) -> Result<()> {
        ensure_no_errors("JobInvocation is invalid", self.validator.validate_job(job))
    }

    pub fn ensure_valid_trigger(&self, trigger: &Trigger) -> Result<()> {
        ensure_no_errors("Trigger is invalid", self.validator.validate_trigger(trigger))
    }

    pub fn ensure_valid_retry_strategy(&self, retry: &RetryStrategy) -> Result<()> {
        ensure_no_errors(
            "RetryStrategy is invalid",
            self.validator.validate_retry_strategy(retry),
        )
    }
}

fn ensure_no_errors(context: &str, errors: Option<Vec<String>>) -> Result<()> {
    match errors {
        None => Ok(()),
        Some(errors) => Err(DispatchError::Validation {
            context: context.to_string(),
            errors,
        }),
    }
}
