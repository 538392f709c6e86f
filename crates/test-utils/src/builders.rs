#![allow(dead_code)]

use jobdispatch::job::{Constraint, JobInvocation, JobInvocationBuilder, RetryStrategy, Trigger};
use jobdispatch::types::Lifetime;

/// Builder for test jobs with sensible defaults: trigger NOW, no
/// constraints, default retry strategy.
pub struct TestJobBuilder {
    inner: JobInvocationBuilder,
}

impl TestJobBuilder {
    pub fn new(tag: &str, target: &str) -> Self {
        Self {
            inner: JobInvocation::builder().tag(tag).target(target),
        }
    }

    pub fn on_any_network(mut self) -> Self {
        self.inner = self.inner.constraint(Constraint::OnAnyNetwork);
        self
    }

    pub fn on_unmetered_network(mut self) -> Self {
        self.inner = self.inner.constraint(Constraint::OnUnmeteredNetwork);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.inner = self.inner.constraint(constraint);
        self
    }

    pub fn window(mut self, start: i64, end: i64) -> Self {
        self.inner = self.inner.trigger(Trigger::execution_window(start, end));
        self
    }

    pub fn recurring(mut self) -> Self {
        self.inner = self.inner.recurring(true);
        self
    }

    pub fn forever(mut self) -> Self {
        self.inner = self.inner.lifetime(Lifetime::Forever);
        self
    }

    pub fn retry(mut self, retry: RetryStrategy) -> Self {
        self.inner = self.inner.retry_strategy(retry);
        self
    }

    pub fn extra(mut self, key: &str, value: serde_json::Value) -> Self {
        self.inner = self.inner.extra(key, value);
        self
    }

    pub fn build(self) -> JobInvocation {
        self.inner.build().expect("test job should be buildable")
    }
}

/// A plain job with trigger NOW and no constraints.
pub fn job(tag: &str, target: &str) -> JobInvocation {
    TestJobBuilder::new(tag, target).build()
}
