mod common;

use common::Harness;
use jobdispatch::dispatch::JobRunState;
use jobdispatch::types::JobResult;
use jobdispatch_test_utils::builders::job;
use jobdispatch_test_utils::fakes::{RecordingWorker, RemoteCall};

#[test]
fn stop_without_result_unbinds_when_last_job_and_still_reports_late_result() {
    let h = Harness::new();
    let t1 = job("t1", "W");
    h.delegator.execute_job(&t1);
    let worker = RecordingWorker::new();
    h.binder.connect("W", worker.clone());
    let conn = h.registry.get("W").expect("connection");

    h.delegator.stop_job(&t1, false);

    assert_eq!(
        worker.calls().last(),
        Some(&RemoteCall::Stop {
            tag: "t1".into(),
            need_result: false
        })
    );
    assert!(conn.was_unbound());
    assert!(h.registry.is_empty());

    // The worker had already finished before the stop reached it.
    worker.finish(&t1, JobResult::Success);
    worker.finish(&t1, JobResult::FailRetry);
    assert_eq!(h.finished.results_for(&t1), vec![JobResult::Success]);
}

#[test]
fn late_result_after_stop_without_result_keeps_other_jobs_tracked() {
    let h = Harness::new();
    let a = job("a", "W");
    let b = job("b", "W");
    h.delegator.execute_job(&a);
    h.delegator.execute_job(&b);
    let worker = RecordingWorker::new();
    h.binder.connect("W", worker.clone());
    let conn = h.registry.get("W").expect("connection");

    h.delegator.stop_job(&a, false);
    assert!(!conn.is_awaiting_result(&a.identity()));

    worker.finish(&a, JobResult::FailRetry);

    assert_eq!(h.finished.results_for(&a), vec![JobResult::FailRetry]);
    assert!(!conn.was_unbound());
    assert_eq!(conn.tracked_jobs(), vec![(b.identity(), JobRunState::Started)]);
}

#[test]
fn stop_without_result_keeps_connection_for_other_jobs() {
    let h = Harness::new();
    let a = job("a", "W");
    let b = job("b", "W");
    h.delegator.execute_job(&a);
    h.delegator.execute_job(&b);
    h.binder.connect("W", RecordingWorker::new());
    let conn = h.registry.get("W").expect("connection");

    h.delegator.stop_job(&a, false);

    assert!(!conn.was_unbound());
    assert_eq!(conn.tracked_jobs(), vec![(b.identity(), JobRunState::Started)]);
}

#[test]
fn stop_with_result_waits_for_worker_then_unbinds() {
    let h = Harness::new();
    let t1 = job("t1", "W");
    h.delegator.execute_job(&t1);
    let worker = RecordingWorker::new();
    h.binder.connect("W", worker.clone());
    let conn = h.registry.get("W").expect("connection");

    h.delegator.stop_job(&t1, true);

    assert!(!conn.was_unbound());
    assert!(conn.is_awaiting_result(&t1.identity()));
    assert!(conn.tracked_jobs().is_empty());

    worker.finish(&t1, JobResult::FailRetry);

    assert_eq!(h.finished.results_for(&t1), vec![JobResult::FailRetry]);
    assert!(conn.was_unbound());
}

#[test]
fn stopping_pending_job_with_result_fails_it_immediately() {
    let h = Harness::new();
    let t1 = job("t1", "W");
    h.delegator.execute_job(&t1);
    let conn = h.registry.get("W").expect("connection");

    h.delegator.stop_job(&t1, true);

    assert_eq!(h.finished.results_for(&t1), vec![JobResult::FailRetry]);
    assert!(conn.was_unbound());
}

#[test]
fn stopping_pending_job_without_result_reports_nothing() {
    let h = Harness::new();
    let t1 = job("t1", "W");
    h.delegator.execute_job(&t1);
    let conn = h.registry.get("W").expect("connection");

    h.delegator.stop_job(&t1, false);

    assert_eq!(h.finished.count(), 0);
    assert!(conn.was_unbound());
}

#[test]
fn stop_for_untracked_job_is_ignored() {
    let h = Harness::new();
    h.delegator.execute_job(&job("a", "W"));
    let worker = RecordingWorker::new();
    h.binder.connect("W", worker.clone());
    let conn = h.registry.get("W").expect("connection");

    h.delegator.stop_job(&job("other", "W"), false);

    assert!(!conn.was_unbound());
    assert_eq!(worker.calls().len(), 1);
}

#[test]
fn failed_start_on_connect_unbinds_and_fails_every_job() {
    let h = Harness::new();
    let a = job("a", "W");
    let b = job("b", "W");
    h.delegator.execute_job(&a);
    h.delegator.execute_job(&b);
    let conn = h.registry.get("W").expect("connection");

    let worker = RecordingWorker::new();
    worker.fail_starts(true);
    h.binder.connect("W", worker.clone());

    assert!(conn.was_unbound());
    assert!(h.registry.is_empty());
    assert_eq!(h.finished.results_for(&a), vec![JobResult::FailRetry]);
    assert_eq!(h.finished.results_for(&b), vec![JobResult::FailRetry]);
    // The first failure ends the connection; no further starts are sent.
    assert_eq!(worker.calls().len(), 1);
}

#[test]
fn failed_start_on_live_connection_fails_the_new_attempt() {
    let h = Harness::new();
    let a = job("a", "W");
    let b = job("b", "W");
    h.delegator.execute_job(&a);
    let worker = RecordingWorker::new();
    h.binder.connect("W", worker.clone());

    worker.fail_starts(true);
    h.delegator.execute_job(&b);

    assert_eq!(h.finished.results_for(&a), vec![JobResult::FailRetry]);
    assert_eq!(h.finished.results_for(&b), vec![JobResult::FailRetry]);
    assert!(h.registry.is_empty());
}

#[test]
fn failed_stop_unbinds_and_completes_outstanding_jobs() {
    let h = Harness::new();
    let a = job("a", "W");
    let b = job("b", "W");
    h.delegator.execute_job(&a);
    h.delegator.execute_job(&b);
    let worker = RecordingWorker::new();
    h.binder.connect("W", worker.clone());
    let conn = h.registry.get("W").expect("connection");

    worker.fail_stops(true);
    h.delegator.stop_job(&a, true);

    assert!(conn.was_unbound());
    assert_eq!(h.finished.results_for(&a), vec![JobResult::FailRetry]);
    assert_eq!(h.finished.results_for(&b), vec![JobResult::FailRetry]);
}

#[test]
fn disconnect_fails_outstanding_jobs_once() {
    let h = Harness::new();
    let t1 = job("t1", "W");
    h.delegator.execute_job(&t1);
    let worker = RecordingWorker::new();
    h.binder.connect("W", worker.clone());
    let conn = h.registry.get("W").expect("connection");

    conn.on_disconnected();
    conn.on_disconnected();
    conn.unbind();

    assert_eq!(h.finished.results_for(&t1), vec![JobResult::FailRetry]);
    assert_eq!(h.binder.unbind_calls(), vec![conn.id()]);

    worker.finish(&t1, JobResult::Success);
    assert_eq!(h.finished.count(), 1);
}

#[test]
fn connect_after_unbind_is_ignored() {
    let h = Harness::new();
    h.delegator.execute_job(&job("t1", "W"));
    let conn = h.registry.get("W").expect("connection");
    conn.unbind();

    let worker = RecordingWorker::new();
    assert!(!h.binder.connect("W", worker.clone()));
    assert!(worker.calls().is_empty());
    assert!(!conn.is_connected());
}

#[test]
fn second_connect_is_ignored() {
    let h = Harness::new();
    h.delegator.execute_job(&job("t1", "W"));
    let first = RecordingWorker::new();
    let second = RecordingWorker::new();

    assert!(h.binder.connect("W", first.clone()));
    assert!(!h.binder.connect("W", second.clone()));
    assert!(second.calls().is_empty());
}

#[test]
fn unbound_connection_rejects_new_jobs() {
    let h = Harness::new();
    h.delegator.execute_job(&job("t1", "W"));
    let conn = h.registry.get("W").expect("connection");
    conn.unbind();

    let err = conn.start_job(&job("t2", "W")).expect_err("dead connection");
    assert!(matches!(
        err,
        jobdispatch::errors::DispatchError::ConnectionUnbound(_)
    ));
}

#[test]
fn explicit_job_finished_unbinds_when_empty() {
    let h = Harness::new();
    let t1 = job("t1", "W");
    h.delegator.execute_job(&t1);
    h.binder.connect("W", RecordingWorker::new());
    let conn = h.registry.get("W").expect("connection");

    conn.on_job_finished(&t1);

    assert!(conn.was_unbound());
    assert!(h.registry.is_empty());
}
