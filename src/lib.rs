// src/lib.rs

//! Job dispatching between a scheduling backend and in-process or remote
//! workers.
//!
//! The dispatcher side ([`dispatch`]) routes each job to a per-target
//! [`WorkerConnection`](dispatch::WorkerConnection) and guarantees one
//! terminal result per execution attempt. The worker side ([`worker`])
//! sequences start and stop requests for user [`JobService`]s.

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod job;
pub mod logging;
pub mod types;
pub mod worker;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::{DispatchConfig, load_and_validate};
use crate::dispatch::{Binder, JobReceiver, NetworkMonitor};

pub use crate::dispatch::{ExecutionDelegator, JobFinishedCallback};
pub use crate::errors::{DispatchError, TransportError};
pub use crate::job::{JobInvocation, JobInvocationBuilder};
pub use crate::types::JobResult;
pub use crate::worker::{JobService, WorkerEndpoint};

/// Load and validate the config at `path`, then install logging at its
/// configured level.
pub fn init_from_config(path: impl AsRef<Path>) -> Result<DispatchConfig> {
    let cfg = load_and_validate(path.as_ref())?;
    logging::init_logging(cfg.log_level)?;
    info!(path = %path.as_ref().display(), "configuration loaded");
    Ok(cfg)
}

/// Build a backend-facing receiver using the configured coder.
pub fn build_receiver(
    cfg: &DispatchConfig,
    binder: Arc<dyn Binder>,
    network: Arc<dyn NetworkMonitor>,
) -> JobReceiver {
    JobReceiver::new(cfg.coder(), binder, network)
}
