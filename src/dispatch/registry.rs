// src/dispatch/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::dispatch::connection::WorkerConnection;

/// Mapping from worker target to the connection currently serving it.
///
/// One instance is owned by the dispatcher and handed to every connection
/// it creates. All access goes through a single mutex. Lock order is
/// registry first, then connection; connections only touch the registry
/// after releasing their own lock.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<String, Arc<WorkerConnection>>>,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let targets = self.targets();
        f.debug_struct("ConnectionRegistry")
            .field("targets", &targets)
            .finish()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The connection installed for `target`, if any.
    ///
    /// The returned connection may become unbound at any time; callers act
    /// through its own methods, which re-check that under its lock.
    pub fn get(&self, target: &str) -> Option<Arc<WorkerConnection>> {
        self.connections.lock().get(target).cloned()
    }

    /// Install `connection`, replacing whatever was registered for its
    /// target. The caller makes sure a replaced entry is already dead.
    pub fn put(&self, connection: Arc<WorkerConnection>) {
        let target = connection.target().to_string();
        if let Some(old) = self.connections.lock().insert(target, connection) {
            debug!(target = %old.target(), unbound = old.was_unbound(), "replaced registry entry");
        }
    }

    /// Return the live connection for `target`, or install the one built by
    /// `make` if there is none or the installed one is unbound.
    ///
    /// The boolean is true when a new connection was installed.
    pub fn get_or_insert_live<F>(&self, target: &str, make: F) -> (Arc<WorkerConnection>, bool)
    where
        F: FnOnce() -> Arc<WorkerConnection>,
    {
        let mut connections = self.connections.lock();
        if let Some(existing) = connections.get(target) {
            if !existing.was_unbound() {
                return (Arc::clone(existing), false);
            }
            debug!(target = %target, "registered connection is unbound; replacing");
        }

        let fresh = make();
        connections.insert(target.to_string(), Arc::clone(&fresh));
        (fresh, true)
    }

    /// Drop the entry for `target` if it is still `connection`.
    ///
    /// An entry installed by a later execution is left alone.
    pub fn remove(&self, target: &str, connection: &WorkerConnection) -> bool {
        let mut connections = self.connections.lock();
        match connections.get(target) {
            Some(current) if std::ptr::eq(Arc::as_ptr(current), connection) => {
                connections.remove(target);
                true
            }
            _ => false,
        }
    }

    /// Drop every entry. Intended for resetting state between tests.
    pub fn clear(&self) {
        self.connections.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    pub fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.connections.lock().keys().cloned().collect();
        targets.sort();
        targets
    }
}
