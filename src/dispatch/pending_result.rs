// src/dispatch/pending_result.rs

//! Single-use result handles.
//!
//! Every execution attempt gets its own [`PendingResult`]. The worker
//! reports through it, the connection completes it with `FailRetry` when
//! it is torn down, and a reschedule silently discards it. Whichever of
//! those happens first wins; the rest are no-ops. This is what keeps the
//! finish callback at most one call per attempt.
//!
//! A stop without a result request only releases the handle. It stays
//! unspent, so a result the worker had already sent is still reported.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, error, warn};

use crate::dispatch::connection::WorkerConnection;
use crate::dispatch::transport::JobCallback;
use crate::errors::TransportError;
use crate::job::{JobCoder, JobData, JobInvocation};
use crate::types::JobResult;

/// Where completed handles report to. Implemented by the dispatcher.
pub trait FinishSink: Send + Sync {
    /// Called once per attempt with the handle that completed.
    fn on_finished_message(&self, pending: &PendingResult, result: JobResult);
}

pub struct PendingResult {
    job: JobInvocation,
    coder: JobCoder,
    spent: AtomicBool,
    connection: Weak<WorkerConnection>,
    sink: Weak<dyn FinishSink>,
}

impl std::fmt::Debug for PendingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResult")
            .field("job", &self.job.identity())
            .field("spent", &self.is_spent())
            .finish()
    }
}

impl PendingResult {
    pub(crate) fn new(
        job: JobInvocation,
        coder: JobCoder,
        connection: Weak<WorkerConnection>,
        sink: Weak<dyn FinishSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            job,
            coder,
            spent: AtomicBool::new(false),
            connection,
            sink,
        })
    }

    /// The attempt this handle belongs to.
    pub fn job(&self) -> &JobInvocation {
        &self.job
    }

    /// The connection that issued this attempt, while it is still alive.
    pub fn connection(&self) -> Option<Arc<WorkerConnection>> {
        self.connection.upgrade()
    }

    /// True once a result was delivered or the attempt was discarded.
    pub fn is_spent(&self) -> bool {
        self.spent.load(Ordering::Acquire)
    }

    /// Report `result` to the sink unless this handle is already spent.
    ///
    /// Must not be called with a connection lock held.
    pub(crate) fn deliver(&self, result: JobResult) -> bool {
        if self.spent.swap(true, Ordering::AcqRel) {
            debug!(job = %self.job.identity(), %result, "result already delivered; dropping");
            return false;
        }

        match self.sink.upgrade() {
            Some(sink) => sink.on_finished_message(self, result),
            None => warn!(job = %self.job.identity(), %result, "dispatcher is gone; result lost"),
        }
        true
    }

    /// Mark the attempt as superseded. Its result, if one ever arrives, is
    /// dropped.
    pub(crate) fn discard(&self) -> bool {
        !self.spent.swap(true, Ordering::AcqRel)
    }
}

impl JobCallback for PendingResult {
    fn job_finished(&self, job: JobData, result: JobResult) -> Result<(), TransportError> {
        match self.coder.decode(&job) {
            Ok(reported) if reported.same_identity(&self.job) => {
                self.deliver(result);
            }
            Ok(reported) => {
                warn!(
                    expected = %self.job.identity(),
                    reported = %reported.identity(),
                    "worker reported a result for a different job; ignoring"
                );
            }
            Err(e) => {
                error!(job = %self.job.identity(), error = %e, "unable to decode job from result; ignoring");
            }
        }
        Ok(())
    }
}
