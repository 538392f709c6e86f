// src/worker/local_binder.rs

//! In-process [`Binder`] that connects dispatcher connections to
//! [`WorkerEndpoint`]s registered by target name.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::dispatch::connection::WorkerConnection;
use crate::dispatch::transport::{Binder, RemoteWorker};
use crate::errors::TransportError;
use crate::worker::endpoint::WorkerEndpoint;

/// Live connection ids per target.
type BindingTable = Arc<Mutex<HashMap<String, HashSet<u64>>>>;

pub struct LocalBinder {
    runtime: Handle,
    endpoints: Mutex<HashMap<String, WorkerEndpoint>>,
    bindings: BindingTable,
}

impl std::fmt::Debug for LocalBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut targets: Vec<String> = self.endpoints.lock().keys().cloned().collect();
        targets.sort();
        f.debug_struct("LocalBinder")
            .field("targets", &targets)
            .finish_non_exhaustive()
    }
}

impl LocalBinder {
    /// Connections are completed asynchronously on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            endpoints: Mutex::new(HashMap::new()),
            bindings: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Make `endpoint` reachable as `target`, replacing any earlier one.
    pub fn register(&self, target: impl Into<String>, endpoint: WorkerEndpoint) {
        let target = target.into();
        debug!(target = %target, endpoint = %endpoint.name(), "registered worker endpoint");
        self.endpoints.lock().insert(target, endpoint);
    }

    pub fn endpoint(&self, target: &str) -> Option<WorkerEndpoint> {
        self.endpoints.lock().get(target).cloned()
    }

    /// Number of connections currently bound to `target`.
    pub fn binding_count(&self, target: &str) -> usize {
        self.bindings.lock().get(target).map_or(0, HashSet::len)
    }
}

/// Forget `connection_id`. When it was the last binding for `target`, the
/// endpoint is told to stop everything.
fn release(bindings: &BindingTable, endpoint: &WorkerEndpoint, target: &str, connection_id: u64) {
    let last = {
        let mut table = bindings.lock();
        let Some(ids) = table.get_mut(target) else {
            return;
        };
        if !ids.remove(&connection_id) {
            return;
        }
        let last = ids.is_empty();
        if last {
            table.remove(target);
        }
        last
    };

    if last {
        info!(target = %target, "last connection released; unbinding worker");
        endpoint.on_unbind();
    }
}

impl Binder for LocalBinder {
    fn bind(&self, connection: Arc<WorkerConnection>) -> Result<(), TransportError> {
        let target = connection.target().to_string();
        let Some(endpoint) = self.endpoint(&target) else {
            return Err(TransportError::BindFailed(
                target,
                "no worker registered for target".to_string(),
            ));
        };

        let bindings = Arc::clone(&self.bindings);
        self.runtime.spawn(async move {
            bindings
                .lock()
                .entry(target.clone())
                .or_default()
                .insert(connection.id());

            let channel: Arc<dyn RemoteWorker> = Arc::new(endpoint.clone());
            if !connection.on_connected(channel) {
                release(&bindings, &endpoint, &target, connection.id());
            }
        });
        Ok(())
    }

    fn unbind(&self, connection: &WorkerConnection) {
        let Some(endpoint) = self.endpoint(connection.target()) else {
            return;
        };
        release(&self.bindings, &endpoint, connection.target(), connection.id());
    }
}
