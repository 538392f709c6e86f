// src/job/invocation.rs

//! Immutable description of one request to run a unit of work.

use std::fmt;

use serde_json::{Map, Value};

use crate::errors::{DispatchError, Result};
use crate::job::constraint::{Constraint, ConstraintSet};
use crate::job::retry::RetryStrategy;
use crate::job::trigger::Trigger;
use crate::job::validate::ValidationEnforcer;
use crate::types::Lifetime;

/// Identity used when tracking jobs over a connection.
///
/// Two invocations with the same tag and target occupy the same slot even if
/// every other field differs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobIdentity {
    pub tag: String,
    pub target: String,
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.target, self.tag)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobInvocation {
    tag: String,
    target: String,
    trigger: Trigger,
    constraints: ConstraintSet,
    retry_strategy: RetryStrategy,
    lifetime: Lifetime,
    recurring: bool,
    replace_current: bool,
    extras: Map<String, Value>,
}

impl JobInvocation {
    pub fn builder() -> JobInvocationBuilder {
        JobInvocationBuilder::default()
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Identifier of the worker endpoint that runs this job.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn constraints(&self) -> ConstraintSet {
        self.constraints
    }

    pub fn retry_strategy(&self) -> &RetryStrategy {
        &self.retry_strategy
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn is_recurring(&self) -> bool {
        self.recurring
    }

    pub fn should_replace_current(&self) -> bool {
        self.replace_current
    }

    pub fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }

    pub fn identity(&self) -> JobIdentity {
        JobIdentity {
            tag: self.tag.clone(),
            target: self.target.clone(),
        }
    }

    /// Same logical job slot: equal tag and target.
    pub fn same_identity(&self, other: &JobInvocation) -> bool {
        self.tag == other.tag && self.target == other.target
    }

    /// Builder pre-filled with every field of this invocation.
    pub fn to_builder(&self) -> JobInvocationBuilder {
        JobInvocationBuilder {
            tag: Some(self.tag.clone()),
            target: Some(self.target.clone()),
            trigger: Some(self.trigger.clone()),
            constraints: self.constraints,
            retry_strategy: self.retry_strategy,
            lifetime: self.lifetime,
            recurring: self.recurring,
            replace_current: self.replace_current,
            extras: self.extras.clone(),
        }
    }
}

/// Builds [`JobInvocation`]s.
///
/// `build` only checks that tag, target and trigger are present. Richer
/// checks belong to a [`ValidationEnforcer`]; use [`build_validated`] to run
/// one before the value is handed out.
///
/// [`build_validated`]: JobInvocationBuilder::build_validated
#[derive(Debug, Clone)]
pub struct JobInvocationBuilder {
    tag: Option<String>,
    target: Option<String>,
    trigger: Option<Trigger>,
    constraints: ConstraintSet,
    retry_strategy: RetryStrategy,
    lifetime: Lifetime,
    recurring: bool,
    replace_current: bool,
    extras: Map<String, Value>,
}

impl Default for JobInvocationBuilder {
    fn default() -> Self {
        Self {
            tag: None,
            target: None,
            trigger: Some(Trigger::Now),
            constraints: ConstraintSet::empty(),
            retry_strategy: RetryStrategy::DEFAULT_EXPONENTIAL,
            lifetime: Lifetime::UntilNextBoot,
            recurring: false,
            replace_current: false,
            extras: Map::new(),
        }
    }
}

impl JobInvocationBuilder {
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Clears the trigger; `build` will then fail.
    pub fn no_trigger(mut self) -> Self {
        self.trigger = None;
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.insert(constraint);
        self
    }

    pub fn constraints(mut self, constraints: ConstraintSet) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn retry_strategy(mut self, retry_strategy: RetryStrategy) -> Self {
        self.retry_strategy = retry_strategy;
        self
    }

    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn recurring(mut self, recurring: bool) -> Self {
        self.recurring = recurring;
        self
    }

    pub fn replace_current(mut self, replace_current: bool) -> Self {
        self.replace_current = replace_current;
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    pub fn extras(mut self, extras: Map<String, Value>) -> Self {
        self.extras = extras;
        self
    }

    pub fn build(self) -> Result<JobInvocation> {
        let mut missing = Vec::new();
        if self.tag.is_none() {
            missing.push("tag is required".to_string());
        }
        if self.target.is_none() {
            missing.push("target is required".to_string());
        }
        if self.trigger.is_none() {
            missing.push("trigger is required".to_string());
        }

        match (self.tag, self.target, self.trigger) {
            (Some(tag), Some(target), Some(trigger)) => Ok(JobInvocation {
                tag,
                target,
                trigger,
                constraints: self.constraints,
                retry_strategy: self.retry_strategy,
                lifetime: self.lifetime,
                recurring: self.recurring,
                replace_current: self.replace_current,
                extras: self.extras,
            }),
            _ => Err(DispatchError::Validation {
                context: "JobInvocation is incomplete".to_string(),
                errors: missing,
            }),
        }
    }

    /// Build, then run `enforcer` over the result.
    pub fn build_validated(self, enforcer: &ValidationEnforcer) -> Result<JobInvocation> {
        let job = self.build()?;
        enforcer.ensure_valid(&job)?;
        Ok(job)
    }
}
