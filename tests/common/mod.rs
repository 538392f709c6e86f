#![allow(dead_code)]

use std::sync::Arc;

use jobdispatch::dispatch::{ConnectionRegistry, ExecutionDelegator, NetworkMonitor};
use jobdispatch_test_utils::fakes::{FixedNetwork, RecordingBinder, RecordingFinishCallback};

/// A delegator wired to recording fakes.
pub struct Harness {
    pub registry: Arc<ConnectionRegistry>,
    pub binder: Arc<RecordingBinder>,
    pub finished: Arc<RecordingFinishCallback>,
    pub delegator: ExecutionDelegator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_network(FixedNetwork::unmetered())
    }

    pub fn with_network(network: Arc<dyn NetworkMonitor>) -> Self {
        jobdispatch_test_utils::init_tracing();

        let registry = Arc::new(ConnectionRegistry::new());
        let binder = RecordingBinder::new();
        let finished = RecordingFinishCallback::new();
        let delegator = ExecutionDelegator::new(
            Arc::clone(&registry),
            binder.clone(),
            network,
            finished.clone(),
        );

        Self {
            registry,
            binder,
            finished,
            delegator,
        }
    }
}
