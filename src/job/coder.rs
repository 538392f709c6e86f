// src/job/coder.rs

//! Encoding of jobs into the flat key/value form passed across the process
//! boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{DispatchError, Result};
use crate::job::constraint::ConstraintSet;
use crate::job::invocation::JobInvocation;
use crate::job::retry::{RetryPolicy, RetryStrategy};
use crate::job::trigger::{ObservedUri, Trigger};
use crate::types::Lifetime;

const KEY_TAG: &str = "tag";
const KEY_TARGET: &str = "target";
const KEY_TRIGGER_TYPE: &str = "trigger_type";
const KEY_WINDOW_START: &str = "window_start";
const KEY_WINDOW_END: &str = "window_end";
const KEY_OBSERVED_URIS: &str = "observed_uris";
const KEY_CONSTRAINTS: &str = "constraints";
const KEY_LIFETIME: &str = "lifetime";
const KEY_RECURRING: &str = "recurring";
const KEY_REPLACE_CURRENT: &str = "replace_current";
const KEY_RETRY_POLICY: &str = "retry_policy";
const KEY_INITIAL_BACKOFF: &str = "initial_backoff_seconds";
const KEY_MAXIMUM_BACKOFF: &str = "maximum_backoff_seconds";
const KEY_EXTRAS: &str = "extras";

/// Opaque job payload exchanged with a worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobData(Map<String, Value>);

impl JobData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for JobData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Encodes and decodes [`JobInvocation`]s to and from [`JobData`].
///
/// Every key is prefixed with `prefix`, so several encoded jobs (or a job and
/// foreign data) can share one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCoder {
    prefix: String,
    include_extras: bool,
}

impl Default for JobCoder {
    fn default() -> Self {
        Self::new("", true)
    }
}

impl JobCoder {
    pub fn new(prefix: impl Into<String>, include_extras: bool) -> Self {
        Self {
            prefix: prefix.into(),
            include_extras,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    pub fn encode(&self, job: &JobInvocation) -> JobData {
        let mut data = JobData::new();
        self.encode_into(job, &mut data);
        data
    }

    /// Writes `job` into an existing payload, overwriting this coder's keys.
    pub fn encode_into(&self, job: &JobInvocation, data: &mut JobData) {
        data.insert(self.key(KEY_TAG), Value::from(job.tag()));
        data.insert(self.key(KEY_TARGET), Value::from(job.target()));
        data.insert(self.key(KEY_LIFETIME), Value::from(job.lifetime().code()));
        data.insert(self.key(KEY_RECURRING), Value::from(job.is_recurring()));
        data.insert(
            self.key(KEY_REPLACE_CURRENT),
            Value::from(job.should_replace_current()),
        );
        data.insert(
            self.key(KEY_CONSTRAINTS),
            Value::from(job.constraints().compact()),
        );
        if self.include_extras {
            data.insert(self.key(KEY_EXTRAS), Value::Object(job.extras().clone()));
        }
        self.encode_trigger(job.trigger(), data);
        self.encode_retry_strategy(job.retry_strategy(), data);
    }

    pub fn decode(&self, data: &JobData) -> Result<JobInvocation> {
        let tag = self
            .get_str(data, KEY_TAG)
            .ok_or_else(|| missing(KEY_TAG))?;
        let target = self
            .get_str(data, KEY_TARGET)
            .ok_or_else(|| missing(KEY_TARGET))?;
        let trigger = self.decode_trigger(data)?;

        let recurring = self.get_bool(data, KEY_RECURRING);
        let replace_current = self.get_bool(data, KEY_REPLACE_CURRENT);
        let lifetime = Lifetime::from_code(self.get_i64(data, KEY_LIFETIME).unwrap_or(0));
        let constraints = ConstraintSet::uncompact(
            self.get_i64(data, KEY_CONSTRAINTS)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
        );

        let mut builder = JobInvocation::builder()
            .tag(tag)
            .target(target)
            .trigger(trigger)
            .constraints(constraints)
            .retry_strategy(self.decode_retry_strategy(data))
            .lifetime(lifetime)
            .recurring(recurring)
            .replace_current(replace_current);

        if self.include_extras {
            if let Some(Value::Object(extras)) = data.get(&self.key(KEY_EXTRAS)) {
                builder = builder.extras(extras.clone());
            }
        }

        builder.build()
    }

    fn encode_trigger(&self, trigger: &Trigger, data: &mut JobData) {
        data.insert(self.key(KEY_TRIGGER_TYPE), Value::from(trigger.type_code()));
        match trigger {
            Trigger::Now => {}
            Trigger::ExecutionWindow { start, end } => {
                data.insert(self.key(KEY_WINDOW_START), Value::from(*start));
                data.insert(self.key(KEY_WINDOW_END), Value::from(*end));
            }
            Trigger::ContentChange { uris } => {
                // ObservedUri only holds a string and a bool.
                let encoded = serde_json::to_value(uris).unwrap_or(Value::Array(Vec::new()));
                data.insert(self.key(KEY_OBSERVED_URIS), encoded);
            }
        }
    }

    fn decode_trigger(&self, data: &JobData) -> Result<Trigger> {
        let code = self
            .get_i64(data, KEY_TRIGGER_TYPE)
            .ok_or_else(|| missing(KEY_TRIGGER_TYPE))?;

        match code {
            2 => Ok(Trigger::Now),
            1 => {
                let start = self
                    .get_i64(data, KEY_WINDOW_START)
                    .ok_or_else(|| missing(KEY_WINDOW_START))?;
                let end = self
                    .get_i64(data, KEY_WINDOW_END)
                    .ok_or_else(|| missing(KEY_WINDOW_END))?;
                Ok(Trigger::ExecutionWindow { start, end })
            }
            3 => {
                let raw = data
                    .get(&self.key(KEY_OBSERVED_URIS))
                    .cloned()
                    .ok_or_else(|| missing(KEY_OBSERVED_URIS))?;
                let uris: Vec<ObservedUri> = serde_json::from_value(raw)
                    .map_err(|e| DispatchError::Decode(format!("bad observed uris: {e}")))?;
                Ok(Trigger::ContentChange { uris })
            }
            other => Err(DispatchError::Decode(format!(
                "unknown trigger type {other}"
            ))),
        }
    }

    fn encode_retry_strategy(&self, retry: &RetryStrategy, data: &mut JobData) {
        data.insert(self.key(KEY_RETRY_POLICY), Value::from(retry.policy.code()));
        data.insert(
            self.key(KEY_INITIAL_BACKOFF),
            Value::from(retry.initial_backoff),
        );
        data.insert(
            self.key(KEY_MAXIMUM_BACKOFF),
            Value::from(retry.maximum_backoff),
        );
    }

    /// Unknown or missing policies fall back to the default exponential
    /// strategy.
    fn decode_retry_strategy(&self, data: &JobData) -> RetryStrategy {
        let policy = self
            .get_i64(data, KEY_RETRY_POLICY)
            .and_then(RetryPolicy::from_code);
        let Some(policy) = policy else {
            return RetryStrategy::DEFAULT_EXPONENTIAL;
        };

        let backoff = |key: &str| {
            self.get_i64(data, key)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0)
        };
        RetryStrategy::new(
            policy,
            backoff(KEY_INITIAL_BACKOFF),
            backoff(KEY_MAXIMUM_BACKOFF),
        )
    }

    fn get_str(&self, data: &JobData, name: &str) -> Option<String> {
        data.get(&self.key(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn get_i64(&self, data: &JobData, name: &str) -> Option<i64> {
        data.get(&self.key(name)).and_then(Value::as_i64)
    }

    fn get_bool(&self, data: &JobData, name: &str) -> bool {
        data.get(&self.key(name))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

fn missing(key: &str) -> DispatchError {
    DispatchError::Decode(format!("missing '{key}'"))
}
