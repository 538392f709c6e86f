// src/dispatch/mod.rs

//! Dispatcher side: routing jobs to worker targets.
//!
//! - [`delegator`] is the entry point ([`ExecutionDelegator`]).
//! - [`connection`] holds the per-target lifecycle state machine.
//! - [`registry`] maps targets to their live connection.
//! - [`pending_result`] makes sure each attempt reports exactly once.
//! - [`transport`] defines the collaborator traits at the process boundary.
//! - [`receiver`] adapts an external scheduling backend.

pub mod connection;
pub mod constraint_checker;
pub mod delegator;
pub mod pending_result;
pub mod receiver;
pub mod registry;
pub mod transport;

pub use connection::{JobRunState, WorkerConnection};
pub use constraint_checker::{ConstraintChecker, NetworkInfo, NetworkMonitor, SharedNetworkState};
pub use delegator::ExecutionDelegator;
pub use pending_result::{FinishSink, PendingResult};
pub use receiver::JobReceiver;
pub use registry::ConnectionRegistry;
pub use transport::{Binder, JobCallback, JobFinishedCallback, RemoteWorker};
