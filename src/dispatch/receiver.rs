// src/dispatch/receiver.rs

//! Adapter between an external scheduling backend and the dispatcher.
//!
//! The backend hands over encoded jobs together with a callback for the
//! final status. [`JobReceiver`] decodes them, runs them through an
//! [`ExecutionDelegator`] and relays each terminal result to the matching
//! backend callback exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::dispatch::constraint_checker::NetworkMonitor;
use crate::dispatch::delegator::ExecutionDelegator;
use crate::dispatch::registry::ConnectionRegistry;
use crate::dispatch::transport::{Binder, JobCallback, JobFinishedCallback};
use crate::job::{JobCoder, JobData, JobIdentity, JobInvocation};
use crate::types::JobResult;

/// Backend callbacks waiting for a result, keyed by job identity.
struct PendingCallbacks {
    coder: JobCoder,
    callbacks: Mutex<HashMap<JobIdentity, Arc<dyn JobCallback>>>,
}

impl PendingCallbacks {
    fn register(&self, job: &JobInvocation, callback: Arc<dyn JobCallback>) {
        if self
            .callbacks
            .lock()
            .insert(job.identity(), callback)
            .is_some()
        {
            debug!(job = %job.identity(), "replaced backend callback for rescheduled job");
        }
    }
}

impl PendingCallbacks {
    fn forget(&self, job: &JobInvocation) -> bool {
        self.callbacks.lock().remove(&job.identity()).is_some()
    }
}

impl JobFinishedCallback for PendingCallbacks {
    fn on_job_finished(&self, job: &JobInvocation, result: JobResult) {
        let callback = self.callbacks.lock().remove(&job.identity());
        let Some(callback) = callback else {
            debug!(job = %job.identity(), %result, "no backend callback registered; dropping result");
            return;
        };

        info!(job = %job.identity(), %result, "sending result to backend");
        send_result_safely(callback.as_ref(), self.coder.encode(job), result);
    }
}

fn send_result_safely(callback: &dyn JobCallback, job: JobData, result: JobResult) {
    if let Err(e) = callback.job_finished(job, result) {
        error!(error = %e, %result, "failed to send result to backend");
    }
}

pub struct JobReceiver {
    coder: JobCoder,
    delegator: ExecutionDelegator,
    callbacks: Arc<PendingCallbacks>,
}

impl std::fmt::Debug for JobReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobReceiver")
            .field("prefix", &self.coder.prefix())
            .field("pending", &self.callbacks.callbacks.lock().len())
            .finish()
    }
}

impl JobReceiver {
    /// `coder` decodes payloads coming from the backend. Jobs are passed to
    /// workers with an unprefixed coder.
    pub fn new(
        coder: JobCoder,
        binder: Arc<dyn Binder>,
        network: Arc<dyn NetworkMonitor>,
    ) -> Self {
        let callbacks = Arc::new(PendingCallbacks {
            coder: coder.clone(),
            callbacks: Mutex::new(HashMap::new()),
        });
        let finished: Arc<dyn JobFinishedCallback> = callbacks.clone();
        let delegator = ExecutionDelegator::new(
            Arc::new(ConnectionRegistry::new()),
            binder,
            network,
            finished,
        );

        Self {
            coder,
            delegator,
            callbacks,
        }
    }

    pub fn delegator(&self) -> &ExecutionDelegator {
        &self.delegator
    }

    /// Run the job encoded in `data`; its result goes to `callback`.
    ///
    /// Payloads that don't decode are answered with `FailNoRetry` so the
    /// backend does not keep redelivering them.
    pub fn on_start_request(&self, data: &JobData, callback: Arc<dyn JobCallback>) {
        let job = match self.coder.decode(data) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "unable to decode job from backend; dropping");
                send_result_safely(callback.as_ref(), data.clone(), JobResult::FailNoRetry);
                return;
            }
        };

        debug!(job = %job.identity(), "received start request");
        self.callbacks.register(&job, callback);
        self.delegator.execute_job(&job);
    }

    /// Stop the job encoded in `data`. Undecodable payloads are ignored.
    ///
    /// When no result is requested the backend callback is forgotten once
    /// the stop went through; a result that races in before that is still
    /// relayed.
    pub fn on_stop_request(&self, data: &JobData, need_to_send_result: bool) {
        let job = match self.coder.decode(data) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "unable to decode job in stop request; ignoring");
                return;
            }
        };

        debug!(job = %job.identity(), need_to_send_result, "received stop request");
        self.delegator.stop_job(&job, need_to_send_result);
        if !need_to_send_result && self.callbacks.forget(&job) {
            debug!(job = %job.identity(), "stopped without result; dropped backend callback");
        }
    }

    /// True while a backend callback is waiting for `job`.
    pub fn is_awaiting(&self, job: &JobIdentity) -> bool {
        self.callbacks.callbacks.lock().contains_key(job)
    }

    /// True when no backend callbacks are outstanding.
    pub fn is_idle(&self) -> bool {
        self.callbacks.callbacks.lock().is_empty()
    }
}
