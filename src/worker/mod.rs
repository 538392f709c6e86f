// src/worker/mod.rs

//! Worker side: running jobs on behalf of the dispatcher.
//!
//! A [`JobService`] implements the work. A [`WorkerEndpoint`] sequences
//! start and stop requests for it and reports results. [`LocalBinder`]
//! wires endpoints to an in-process dispatcher.

pub mod endpoint;
pub mod local_binder;
pub mod main_context;
pub mod service;

pub use endpoint::{WorkerEndpoint, format_elapsed};
pub use local_binder::LocalBinder;
pub use main_context::{InlineContext, MainContext, MainLoop, MainTask, MainThread, main_thread};
pub use service::{JobFinisher, JobService};
