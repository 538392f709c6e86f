use std::sync::{Arc, Weak};

use jobdispatch::dispatch::{
    ConnectionRegistry, ConstraintChecker, FinishSink, NetworkInfo, PendingResult,
    SharedNetworkState, WorkerConnection,
};
use jobdispatch::job::{Constraint, JobCoder};
use jobdispatch::types::JobResult;
use jobdispatch_test_utils::builders::{TestJobBuilder, job};
use jobdispatch_test_utils::fakes::RecordingBinder;

struct NoopSink;

impl FinishSink for NoopSink {
    fn on_finished_message(&self, _pending: &PendingResult, _result: JobResult) {}
}

fn connection(target: &str, registry: &Arc<ConnectionRegistry>) -> Arc<WorkerConnection> {
    let sink: Weak<dyn FinishSink> = Weak::<NoopSink>::new();
    WorkerConnection::new(
        target,
        JobCoder::default(),
        RecordingBinder::new(),
        registry,
        sink,
    )
}

#[test]
fn constraint_checker_follows_network_state() {
    let network = SharedNetworkState::new(None);
    let checker = ConstraintChecker::new(Arc::new(network.clone()));

    let plain = job("plain", "W");
    let any = TestJobBuilder::new("any", "W").on_any_network().build();
    let unmetered = TestJobBuilder::new("unmetered", "W")
        .on_unmetered_network()
        .build();
    let both = TestJobBuilder::new("both", "W")
        .on_any_network()
        .on_unmetered_network()
        .build();
    let charging = TestJobBuilder::new("charging", "W")
        .constraint(Constraint::DeviceCharging)
        .constraint(Constraint::DeviceIdle)
        .build();

    // No network info at all.
    assert!(checker.are_constraints_satisfied(&plain));
    assert!(checker.are_constraints_satisfied(&charging));
    assert!(!checker.are_constraints_satisfied(&any));
    assert!(!checker.are_constraints_satisfied(&unmetered));

    network.set(Some(NetworkInfo {
        connected: false,
        metered: false,
    }));
    assert!(!checker.are_constraints_satisfied(&any));

    network.set(Some(NetworkInfo::metered()));
    assert!(checker.are_constraints_satisfied(&any));
    assert!(!checker.are_constraints_satisfied(&unmetered));
    assert!(!checker.are_constraints_satisfied(&both));

    network.set(Some(NetworkInfo::unmetered()));
    assert!(checker.are_constraints_satisfied(&any));
    assert!(checker.are_constraints_satisfied(&unmetered));
    assert!(checker.are_constraints_satisfied(&both));
}

#[test]
fn registry_remove_only_drops_the_same_instance() {
    let registry = Arc::new(ConnectionRegistry::new());
    let old = connection("W", &registry);
    let new = connection("W", &registry);

    registry.put(Arc::clone(&old));
    registry.put(Arc::clone(&new));

    assert!(!registry.remove("W", &old));
    assert_eq!(registry.get("W").map(|c| c.id()), Some(new.id()));

    assert!(registry.remove("W", &new));
    assert!(registry.get("W").is_none());
}

#[test]
fn registry_replaces_only_unbound_entries() {
    let registry = Arc::new(ConnectionRegistry::new());

    let (first, created) = registry.get_or_insert_live("W", || connection("W", &registry));
    assert!(created);

    let (same, created) = registry.get_or_insert_live("W", || connection("W", &registry));
    assert!(!created);
    assert_eq!(same.id(), first.id());

    first.unbind();
    assert!(registry.is_empty());

    registry.put(Arc::clone(&first));
    let (fresh, created) = registry.get_or_insert_live("W", || connection("W", &registry));
    assert!(created);
    assert_ne!(fresh.id(), first.id());
    assert_eq!(registry.len(), 1);
}

#[test]
fn registry_clear_and_targets() {
    let registry = Arc::new(ConnectionRegistry::new());
    registry.put(connection("b", &registry));
    registry.put(connection("a", &registry));

    assert_eq!(registry.targets(), vec!["a".to_string(), "b".to_string()]);

    registry.clear();
    assert!(registry.is_empty());
}
