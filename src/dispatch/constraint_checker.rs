// src/dispatch/constraint_checker.rs

//! Decides whether a job's declared constraints hold right now.
//!
//! Only network constraints are checked. Charging and idle are assumed to
//! be satisfied; the scheduling backend enforces them before it triggers a
//! job.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::job::{Constraint, ConstraintSet, JobInvocation};

/// Snapshot of the active network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Whether the network can pass data.
    pub connected: bool,
    pub metered: bool,
}

impl NetworkInfo {
    pub fn unmetered() -> Self {
        Self {
            connected: true,
            metered: false,
        }
    }

    pub fn metered() -> Self {
        Self {
            connected: true,
            metered: true,
        }
    }
}

/// Source of network reachability.
pub trait NetworkMonitor: Send + Sync {
    /// The currently active network, or `None` when nothing is known.
    fn active_network(&self) -> Option<NetworkInfo>;
}

/// A [`NetworkMonitor`] the embedding keeps up to date on connectivity
/// changes. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SharedNetworkState {
    active: Arc<RwLock<Option<NetworkInfo>>>,
}

impl SharedNetworkState {
    pub fn new(initial: Option<NetworkInfo>) -> Self {
        Self {
            active: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn set(&self, network: Option<NetworkInfo>) {
        *self.active.write() = network;
    }
}

impl NetworkMonitor for SharedNetworkState {
    fn active_network(&self) -> Option<NetworkInfo> {
        *self.active.read()
    }
}

#[derive(Clone)]
pub struct ConstraintChecker {
    network: Arc<dyn NetworkMonitor>,
}

impl std::fmt::Debug for ConstraintChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintChecker").finish_non_exhaustive()
    }
}

impl ConstraintChecker {
    pub fn new(network: Arc<dyn NetworkMonitor>) -> Self {
        Self { network }
    }

    /// True iff the job's constraints are satisfied. Only network
    /// constraints are evaluated.
    pub fn are_constraints_satisfied(&self, job: &JobInvocation) -> bool {
        self.network_constraints_satisfied(job.constraints())
    }

    fn network_constraints_satisfied(&self, constraints: ConstraintSet) -> bool {
        if !wants_network(constraints) {
            return true;
        }

        let Some(network) = self.network.active_network() else {
            debug!("no active network info; assuming network inaccessible");
            return false;
        };
        if !network.connected {
            return false;
        }

        // Any and unmetered are mutually exclusive; unmetered wins when both
        // are present.
        !constraints.contains(Constraint::OnUnmeteredNetwork) || !network.metered
    }
}

fn wants_network(constraints: ConstraintSet) -> bool {
    constraints.contains(Constraint::OnAnyNetwork)
        || constraints.contains(Constraint::OnUnmeteredNetwork)
}
