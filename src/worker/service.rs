// src/worker/service.rs

use tokio::sync::mpsc;
use tracing::debug;

use crate::job::JobInvocation;
use crate::types::JobResult;
use crate::worker::endpoint::WorkItem;

/// Application code that actually does the work for one target.
///
/// Both hooks run on the endpoint's [`MainContext`] and must return
/// quickly; long work belongs on another thread, finished later through
/// the [`JobFinisher`].
///
/// [`MainContext`]: crate::worker::MainContext
pub trait JobService: Send + Sync {
    /// Start `job`. Return true if work continues in the background, in
    /// which case `finisher` must eventually be called. Returning false
    /// completes the job with success.
    fn on_start_job(&self, job: &JobInvocation, finisher: JobFinisher) -> bool;

    /// `job` is being stopped early. Return true if it should be retried.
    fn on_stop_job(&self, job: &JobInvocation) -> bool;
}

/// Completes one started job. Only the first completion for a running job
/// has any effect, and a finisher kept from an instance that was stopped
/// and started again does not touch the new instance.
#[derive(Debug, Clone)]
pub struct JobFinisher {
    job: JobInvocation,
    attempt: u64,
    tx: mpsc::UnboundedSender<WorkItem>,
}

impl JobFinisher {
    pub(crate) fn new(
        job: JobInvocation,
        attempt: u64,
        tx: mpsc::UnboundedSender<WorkItem>,
    ) -> Self {
        Self { job, attempt, tx }
    }

    pub fn job(&self) -> &JobInvocation {
        &self.job
    }

    /// Report the job as done. `needs_reschedule` maps to `FailRetry`,
    /// otherwise `Success`.
    pub fn finish(&self, needs_reschedule: bool) {
        let result = if needs_reschedule {
            JobResult::FailRetry
        } else {
            JobResult::Success
        };
        self.finish_with(result);
    }

    pub fn finish_with(&self, result: JobResult) {
        let item = WorkItem::RemoveAndFinish {
            job: self.job.clone(),
            attempt: Some(self.attempt),
            result,
        };
        if self.tx.send(item).is_err() {
            debug!(job = %self.job.identity(), "endpoint is gone; completion dropped");
        }
    }
}
