// src/dispatch/transport.rs

//! Collaborator interfaces at the process boundary.
//!
//! The dispatcher never talks to a transport directly. It goes through
//! these traits so that an in-process worker ([`LocalBinder`]) and fakes in
//! tests are interchangeable with a real IPC layer.
//!
//! None of these calls may block on I/O, and none may call back into the
//! [`WorkerConnection`] synchronously: the connection issues remote calls
//! while holding its own lock.
//!
//! [`LocalBinder`]: crate::worker::LocalBinder

use std::sync::Arc;

use crate::dispatch::connection::WorkerConnection;
use crate::errors::TransportError;
use crate::job::{JobData, JobInvocation};
use crate::types::JobResult;

/// The remote side of an established channel to a worker target.
pub trait RemoteWorker: Send + Sync {
    /// Ask the worker to start `job`. The final status is reported later
    /// through `callback`.
    fn start(&self, job: JobData, callback: Arc<dyn JobCallback>) -> Result<(), TransportError>;

    /// Ask the worker to stop `job`. When `need_to_send_result` is false the
    /// worker must not report a result for it.
    fn stop(&self, job: JobData, need_to_send_result: bool) -> Result<(), TransportError>;
}

/// Capability to report the final status of one job.
///
/// Implemented both by the in-process handle the dispatcher gives to its
/// workers ([`PendingResult`]) and by whatever carries results back to an
/// external scheduling backend.
///
/// [`PendingResult`]: crate::dispatch::PendingResult
pub trait JobCallback: Send + Sync {
    fn job_finished(&self, job: JobData, result: JobResult) -> Result<(), TransportError>;
}

/// Process-boundary connection primitive.
pub trait Binder: Send + Sync {
    /// Start connecting to `connection.target()`.
    ///
    /// Must return without waiting for the worker. The outcome is reported
    /// later by calling [`WorkerConnection::on_connected`] or
    /// [`WorkerConnection::on_disconnected`]. An `Err` means the attempt
    /// could not even be made.
    fn bind(&self, connection: Arc<WorkerConnection>) -> Result<(), TransportError>;

    /// Release whatever `bind` set up for this connection. Called exactly
    /// once per connection, after it became unbound.
    fn unbind(&self, connection: &WorkerConnection);
}

/// Receives the terminal result of every execution attempt.
pub trait JobFinishedCallback: Send + Sync {
    fn on_job_finished(&self, job: &JobInvocation, result: JobResult);
}

impl<F> JobFinishedCallback for F
where
    F: Fn(&JobInvocation, JobResult) + Send + Sync,
{
    fn on_job_finished(&self, job: &JobInvocation, result: JobResult) {
        self(job, result)
    }
}
