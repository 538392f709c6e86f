// src/dispatch/delegator.rs

//! Entry point for executing and stopping jobs.

use std::sync::{Arc, Weak};

use tracing::{debug, error, info, warn};

use crate::dispatch::connection::WorkerConnection;
use crate::dispatch::constraint_checker::{ConstraintChecker, NetworkMonitor};
use crate::dispatch::pending_result::{FinishSink, PendingResult};
use crate::dispatch::registry::ConnectionRegistry;
use crate::dispatch::transport::{Binder, JobFinishedCallback};
use crate::errors::DispatchError;
use crate::job::{JobCoder, JobInvocation};
use crate::types::JobResult;

struct DelegatorShared {
    registry: Arc<ConnectionRegistry>,
    binder: Arc<dyn Binder>,
    constraints: ConstraintChecker,
    coder: JobCoder,
    finished: Arc<dyn JobFinishedCallback>,
}

impl FinishSink for DelegatorShared {
    fn on_finished_message(&self, pending: &PendingResult, result: JobResult) {
        if let Some(connection) = pending.connection() {
            connection.on_result_delivered(pending);
        }
        info!(job = %pending.job().identity(), %result, "job finished");
        self.finished.on_job_finished(pending.job(), result);
    }
}

/// Routes jobs to per-target [`WorkerConnection`]s.
///
/// Cloning is cheap; clones share the registry and callbacks. Every
/// attempt accepted by [`execute_job`](Self::execute_job) ends in exactly
/// one call to the finish callback.
#[derive(Clone)]
pub struct ExecutionDelegator {
    shared: Arc<DelegatorShared>,
}

impl std::fmt::Debug for ExecutionDelegator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionDelegator")
            .field("registry", &self.shared.registry)
            .finish_non_exhaustive()
    }
}

impl ExecutionDelegator {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        binder: Arc<dyn Binder>,
        network: Arc<dyn NetworkMonitor>,
        finished: Arc<dyn JobFinishedCallback>,
    ) -> Self {
        Self::with_coder(registry, binder, network, finished, JobCoder::default())
    }

    /// Like [`new`](Self::new), with the coder used to encode jobs sent to
    /// workers. Workers must decode with the same prefix.
    pub fn with_coder(
        registry: Arc<ConnectionRegistry>,
        binder: Arc<dyn Binder>,
        network: Arc<dyn NetworkMonitor>,
        finished: Arc<dyn JobFinishedCallback>,
        coder: JobCoder,
    ) -> Self {
        Self {
            shared: Arc::new(DelegatorShared {
                registry,
                binder,
                constraints: ConstraintChecker::new(network),
                coder,
                finished,
            }),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.shared.registry
    }

    /// Start `job` on its target's worker.
    ///
    /// Jobs whose constraints are not met finish immediately with
    /// `FailRetry`, without touching the registry. Otherwise the job goes to
    /// the target's live connection, or to a new one that gets bound.
    pub fn execute_job(&self, job: &JobInvocation) {
        if !self.shared.constraints.are_constraints_satisfied(job) {
            info!(job = %job.identity(), "constraints not satisfied; will retry later");
            self.shared
                .finished
                .on_job_finished(job, JobResult::FailRetry);
            return;
        }

        loop {
            let (connection, created) = self
                .shared
                .registry
                .get_or_insert_live(job.target(), || self.new_connection(job.target()));

            match connection.start_job(job) {
                Ok(sent) => {
                    debug!(job = %job.identity(), sent, created, "job accepted by connection");
                }
                Err(DispatchError::ConnectionUnbound(_)) => {
                    debug!(job = %job.identity(), "connection unbound concurrently; retrying with a fresh one");
                    continue;
                }
                Err(e) => {
                    // The connection already completed the attempt with
                    // FailRetry while tearing down.
                    warn!(job = %job.identity(), error = %e, "failed to start job");
                    return;
                }
            }

            if created {
                self.bind(&connection);
            }
            return;
        }
    }

    /// Stop `job` on its target's connection. No-op when the target has no
    /// connection.
    pub fn stop_job(&self, job: &JobInvocation, need_to_send_result: bool) {
        match self.shared.registry.get(job.target()) {
            Some(connection) => connection.on_stop(job, need_to_send_result),
            None => debug!(job = %job.identity(), "stop requested but target has no connection"),
        }
    }

    /// Drop every registry entry without touching the connections.
    pub fn reset(&self) {
        self.shared.registry.clear();
    }

    fn new_connection(&self, target: &str) -> Arc<WorkerConnection> {
        let sink: Weak<dyn FinishSink> = Arc::downgrade(&self.shared) as Weak<dyn FinishSink>;
        WorkerConnection::new(
            target,
            self.shared.coder.clone(),
            Arc::clone(&self.shared.binder),
            &self.shared.registry,
            sink,
        )
    }

    fn bind(&self, connection: &Arc<WorkerConnection>) {
        if connection.was_unbound() {
            debug!(target = %connection.target(), "connection unbound before bind; skipping");
            return;
        }

        info!(target = %connection.target(), "binding to worker");
        if let Err(e) = self.shared.binder.bind(Arc::clone(connection)) {
            error!(target = %connection.target(), error = %e, "unable to bind to worker");
            connection.unbind();
        }
    }
}
