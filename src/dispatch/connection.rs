// src/dispatch/connection.rs

//! Per-target connection lifecycle.
//!
//! A [`WorkerConnection`] moves through
//! `Created -> Bound(not connected) -> Connected -> Unbound`, or straight
//! from a bound state to `Unbound` on failure. `Unbound` is terminal: the
//! connection issues no further remote calls and the registry stops handing
//! it out. A later execution for the same target builds a fresh connection.
//!
//! While not yet connected, started jobs are queued as pending and sent once
//! [`WorkerConnection::on_connected`] delivers a channel.
//!
//! Locking: every state change and every remote call happens under the
//! connection's own mutex, so no remote call can follow the transition to
//! `Unbound`. Registry removal, binder release and result delivery happen
//! after that mutex is released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::dispatch::pending_result::{FinishSink, PendingResult};
use crate::dispatch::registry::ConnectionRegistry;
use crate::dispatch::transport::{Binder, JobCallback, RemoteWorker};
use crate::errors::{DispatchError, Result, TransportError};
use crate::job::{JobCoder, JobIdentity, JobInvocation};
use crate::types::JobResult;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Where a tracked job stands on its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRunState {
    /// Accepted but not yet sent, because the channel is not up.
    Pending,
    /// Sent to the worker.
    Started,
}

struct TrackedJob {
    job: JobInvocation,
    state: JobRunState,
    pending: Arc<PendingResult>,
}

#[derive(Default)]
struct ConnectionState {
    channel: Option<Arc<dyn RemoteWorker>>,
    unbound: bool,
    jobs: HashMap<JobIdentity, TrackedJob>,
    /// Jobs stopped with a result requested whose result has not arrived.
    awaiting: Vec<Arc<PendingResult>>,
}

impl ConnectionState {
    fn is_idle(&self) -> bool {
        self.jobs.is_empty() && self.awaiting.is_empty()
    }

    /// Flip to unbound. Only the first caller gets `true`.
    fn mark_unbound(&mut self) -> bool {
        if self.unbound {
            return false;
        }
        self.unbound = true;
        self.channel = None;
        true
    }

    /// Take every handle that still owes a result.
    fn drain_outstanding(&mut self) -> Vec<Arc<PendingResult>> {
        let mut outstanding: Vec<Arc<PendingResult>> =
            self.jobs.drain().map(|(_, tracked)| tracked.pending).collect();
        outstanding.append(&mut self.awaiting);
        outstanding
    }
}

/// Work left over after the state lock is released.
#[must_use]
struct Teardown {
    won: bool,
    outstanding: Vec<Arc<PendingResult>>,
}

impl Teardown {
    fn none() -> Self {
        Self {
            won: false,
            outstanding: Vec::new(),
        }
    }
}

pub struct WorkerConnection {
    id: u64,
    target: String,
    coder: JobCoder,
    binder: Arc<dyn Binder>,
    registry: Weak<ConnectionRegistry>,
    sink: Weak<dyn FinishSink>,
    this: Weak<WorkerConnection>,
    state: Mutex<ConnectionState>,
}

impl std::fmt::Debug for WorkerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WorkerConnection")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("connected", &state.channel.is_some())
            .field("unbound", &state.unbound)
            .field("jobs", &state.jobs.len())
            .field("awaiting", &state.awaiting.len())
            .finish()
    }
}

impl WorkerConnection {
    /// Build a connection for `target` in the `Created` state.
    ///
    /// Nothing is registered or bound here; the dispatcher does both.
    pub fn new(
        target: impl Into<String>,
        coder: JobCoder,
        binder: Arc<dyn Binder>,
        registry: &Arc<ConnectionRegistry>,
        sink: Weak<dyn FinishSink>,
    ) -> Arc<Self> {
        let target = target.into();
        let registry = Arc::downgrade(registry);
        Arc::new_cyclic(|this| Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            target,
            coder,
            binder,
            registry,
            sink,
            this: this.clone(),
            state: Mutex::new(ConnectionState::default()),
        })
    }

    /// Process-unique identifier, stable for the connection's lifetime.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().channel.is_some()
    }

    pub fn was_unbound(&self) -> bool {
        self.state.lock().unbound
    }

    pub fn job_state(&self, job: &JobIdentity) -> Option<JobRunState> {
        self.state.lock().jobs.get(job).map(|tracked| tracked.state)
    }

    /// Tracked jobs, sorted by identity.
    pub fn tracked_jobs(&self) -> Vec<(JobIdentity, JobRunState)> {
        let state = self.state.lock();
        let mut jobs: Vec<_> = state
            .jobs
            .iter()
            .map(|(id, tracked)| (id.clone(), tracked.state))
            .collect();
        jobs.sort_by(|a, b| a.0.cmp(&b.0));
        jobs
    }

    /// True while a stop-with-result for `job` is outstanding.
    pub fn is_awaiting_result(&self, job: &JobIdentity) -> bool {
        self.state
            .lock()
            .awaiting
            .iter()
            .any(|pending| &pending.job().identity() == job)
    }

    /// Track `job` and send it to the worker if the channel is up.
    ///
    /// Returns `Ok(true)` when the job was sent, `Ok(false)` when it was
    /// queued as pending. A job with the same identity that is already
    /// tracked is superseded: its result is discarded and, if it was
    /// started, the worker is told to stop it without a result.
    ///
    /// Fails with [`DispatchError::ConnectionUnbound`] if the connection is
    /// already dead; the caller should build a new one. A transport failure
    /// tears the connection down, completes every outstanding attempt
    /// (including this one) with `FailRetry` and is returned as
    /// [`DispatchError::Transport`].
    pub fn start_job(&self, job: &JobInvocation) -> Result<bool> {
        let mut state = self.state.lock();
        if state.unbound {
            return Err(DispatchError::ConnectionUnbound(self.target.clone()));
        }

        let identity = job.identity();
        if let Some(previous) = state.jobs.remove(&identity) {
            previous.pending.discard();
            if previous.state == JobRunState::Started {
                debug!(job = %identity, "stopping previous instance before restart");
                if let Err(e) = self.send_stop(&state, &previous.job, false) {
                    let pending = self.new_pending(job);
                    state.jobs.insert(
                        identity,
                        TrackedJob {
                            job: job.clone(),
                            state: JobRunState::Pending,
                            pending,
                        },
                    );
                    return Err(self.fail_transport(state, e));
                }
            }
        }

        let pending = self.new_pending(job);
        let channel = state.channel.clone();
        let Some(channel) = channel else {
            debug!(job = %identity, "not connected yet; queueing start");
            state.jobs.insert(
                identity,
                TrackedJob {
                    job: job.clone(),
                    state: JobRunState::Pending,
                    pending,
                },
            );
            return Ok(false);
        };

        let callback: Arc<dyn JobCallback> = pending.clone();
        let sent = channel.start(self.coder.encode(job), callback);
        let run_state = if sent.is_ok() {
            JobRunState::Started
        } else {
            JobRunState::Pending
        };
        state.jobs.insert(
            identity.clone(),
            TrackedJob {
                job: job.clone(),
                state: run_state,
                pending,
            },
        );

        match sent {
            Ok(()) => {
                debug!(job = %identity, "sent start request");
                Ok(true)
            }
            Err(e) => Err(self.fail_transport(state, e)),
        }
    }

    /// Stop `job` if it is tracked here.
    ///
    /// With `need_to_send_result`, a started job stays awaited until the
    /// worker reports, and a job that never got sent completes with
    /// `FailRetry` right away. Without it, the job is released: nothing
    /// waits for its result, and if nothing else is tracked the connection
    /// unbinds. A result the worker sends anyway is still reported.
    pub fn on_stop(&self, job: &JobInvocation, need_to_send_result: bool) {
        let mut state = self.state.lock();
        if state.unbound {
            warn!(target = %self.target, job = %job.tag(), "can't send stop request because connection was unbound");
            return;
        }

        let identity = job.identity();
        let Some(tracked) = state.jobs.remove(&identity) else {
            debug!(job = %identity, "stop requested for a job that is not tracked");
            return;
        };

        // Without a result request the handle is released, not spent: a
        // result the worker already sent still reaches the finish callback,
        // but the connection does not wait for it.
        let mut fail_now = None;
        match tracked.state {
            JobRunState::Started => {
                let sent = self.send_stop(&state, &tracked.job, need_to_send_result);
                if need_to_send_result {
                    state.awaiting.push(tracked.pending);
                }
                if let Err(e) = sent {
                    let _ = self.fail_transport(state, e);
                    return;
                }
            }
            JobRunState::Pending => {
                if need_to_send_result {
                    fail_now = Some(tracked.pending);
                }
            }
        }

        let teardown = if !need_to_send_result && state.is_idle() {
            debug!(target = %self.target, "no jobs left after stop; unbinding");
            self.begin_unbind(&mut state)
        } else {
            Teardown::none()
        };
        drop(state);

        self.finish_unbind(teardown);
        if let Some(pending) = fail_now {
            pending.deliver(JobResult::FailRetry);
        }
    }

    /// Forget `job` after its result was delivered, unbinding when nothing
    /// is left.
    pub fn on_job_finished(&self, job: &JobInvocation) {
        let identity = job.identity();
        self.retire(|state| {
            state.jobs.remove(&identity);
            state
                .awaiting
                .retain(|pending| pending.job().identity() != identity);
        });
    }

    /// Same as [`on_job_finished`](Self::on_job_finished), but only forgets
    /// the exact attempt that completed. A newer attempt for the same job
    /// stays tracked.
    pub(crate) fn on_result_delivered(&self, completed: &PendingResult) {
        self.retire(|state| {
            let identity = completed.job().identity();
            let is_current = state
                .jobs
                .get(&identity)
                .is_some_and(|tracked| std::ptr::eq(Arc::as_ptr(&tracked.pending), completed));
            if is_current {
                state.jobs.remove(&identity);
            }
            state
                .awaiting
                .retain(|pending| !std::ptr::eq(Arc::as_ptr(pending), completed));
        });
    }

    /// Accept the channel produced by a successful bind and send every
    /// pending job. Returns false if the connection is already unbound or
    /// connected, in which case `channel` is not used.
    pub fn on_connected(&self, channel: Arc<dyn RemoteWorker>) -> bool {
        let mut state = self.state.lock();
        if state.unbound {
            warn!(target = %self.target, "connected after unbind; ignoring channel");
            return false;
        }
        if state.channel.is_some() {
            warn!(target = %self.target, "already connected; ignoring second channel");
            return false;
        }

        info!(target = %self.target, "connected to worker");
        state.channel = Some(Arc::clone(&channel));

        let mut queued: Vec<JobIdentity> = state
            .jobs
            .iter()
            .filter(|(_, tracked)| tracked.state == JobRunState::Pending)
            .map(|(id, _)| id.clone())
            .collect();
        queued.sort();

        for identity in queued {
            let Some(tracked) = state.jobs.get_mut(&identity) else {
                continue;
            };
            let callback: Arc<dyn JobCallback> = tracked.pending.clone();
            match channel.start(self.coder.encode(&tracked.job), callback) {
                Ok(()) => {
                    debug!(job = %identity, "sent queued start request");
                    tracked.state = JobRunState::Started;
                }
                Err(e) => {
                    let _ = self.fail_transport(state, e);
                    return true;
                }
            }
        }
        true
    }

    /// The worker went away. Equivalent to [`unbind`](Self::unbind).
    pub fn on_disconnected(&self) {
        warn!(target = %self.target, "worker disconnected");
        self.unbind();
    }

    /// Tear the connection down. Idempotent.
    ///
    /// The first call removes the connection from the registry, releases
    /// the binding and completes every outstanding attempt with
    /// `FailRetry`.
    pub fn unbind(&self) {
        let teardown = {
            let mut state = self.state.lock();
            self.begin_unbind(&mut state)
        };
        self.finish_unbind(teardown);
    }

    fn new_pending(&self, job: &JobInvocation) -> Arc<PendingResult> {
        PendingResult::new(
            job.clone(),
            self.coder.clone(),
            self.this.clone(),
            self.sink.clone(),
        )
    }

    fn send_stop(
        &self,
        state: &ConnectionState,
        job: &JobInvocation,
        need_to_send_result: bool,
    ) -> std::result::Result<(), TransportError> {
        match &state.channel {
            Some(channel) => channel.stop(self.coder.encode(job), need_to_send_result),
            None => Ok(()),
        }
    }

    /// Apply `update`, then unbind if the connection became idle.
    fn retire(&self, update: impl FnOnce(&mut ConnectionState)) {
        let teardown = {
            let mut state = self.state.lock();
            if state.unbound {
                return;
            }
            update(&mut *state);
            if state.is_idle() {
                debug!(target = %self.target, "no jobs left; unbinding");
                self.begin_unbind(&mut state)
            } else {
                Teardown::none()
            }
        };
        self.finish_unbind(teardown);
    }

    /// Unbind after a failed remote call. Consumes the guard so the lock is
    /// released before teardown runs.
    fn fail_transport(
        &self,
        mut state: MutexGuard<'_, ConnectionState>,
        e: TransportError,
    ) -> DispatchError {
        error!(target = %self.target, error = %e, "remote call failed; unbinding");
        let teardown = self.begin_unbind(&mut state);
        drop(state);
        self.finish_unbind(teardown);
        DispatchError::Transport(e)
    }

    fn begin_unbind(&self, state: &mut ConnectionState) -> Teardown {
        if !state.mark_unbound() {
            return Teardown::none();
        }
        Teardown {
            won: true,
            outstanding: state.drain_outstanding(),
        }
    }

    fn finish_unbind(&self, teardown: Teardown) {
        if !teardown.won {
            return;
        }

        info!(target = %self.target, failed = teardown.outstanding.len(), "unbinding connection");
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.target, self);
        }
        self.binder.unbind(self);

        for pending in teardown.outstanding {
            pending.deliver(JobResult::FailRetry);
        }
    }
}
