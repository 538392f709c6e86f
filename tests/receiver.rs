use std::sync::Arc;

use jobdispatch::dispatch::JobReceiver;
use jobdispatch::job::{JobCoder, JobData};
use jobdispatch::types::JobResult;
use jobdispatch_test_utils::builders::{TestJobBuilder, job};
use jobdispatch_test_utils::fakes::{
    FixedNetwork, RecordingBinder, RecordingJobCallback, RecordingWorker,
};

fn backend_coder() -> JobCoder {
    JobCoder::new("backend.", true)
}

fn receiver(network: Arc<FixedNetwork>) -> (JobReceiver, Arc<RecordingBinder>) {
    jobdispatch_test_utils::init_tracing();
    let binder = RecordingBinder::new();
    (JobReceiver::new(backend_coder(), binder.clone(), network), binder)
}

#[test]
fn result_is_relayed_to_backend_once() {
    let (receiver, binder) = receiver(FixedNetwork::unmetered());
    let t1 = job("t1", "W");
    let backend = RecordingJobCallback::new();

    receiver.on_start_request(&backend_coder().encode(&t1), backend.clone());
    assert!(receiver.is_awaiting(&t1.identity()));

    let worker = RecordingWorker::new();
    binder.connect("W", worker.clone());
    worker.finish(&t1, JobResult::Success);
    worker.finish(&t1, JobResult::FailRetry);

    assert_eq!(backend.results(), vec![JobResult::Success]);
    let (data, _) = &backend.received()[0];
    let decoded = backend_coder().decode(data).unwrap();
    assert_eq!(decoded.identity(), t1.identity());
    assert!(receiver.is_idle());
}

#[test]
fn undecodable_request_fails_without_retry() {
    let (receiver, binder) = receiver(FixedNetwork::unmetered());
    let backend = RecordingJobCallback::new();

    // Unprefixed keys are invisible to the backend coder.
    receiver.on_start_request(&JobCoder::default().encode(&job("t1", "W")), backend.clone());

    assert_eq!(backend.results(), vec![JobResult::FailNoRetry]);
    assert_eq!(binder.bind_count(), 0);
    assert!(receiver.is_idle());
}

#[test]
fn unmet_constraints_are_reported_as_retry() {
    let (receiver, binder) = receiver(FixedNetwork::none());
    let t1 = TestJobBuilder::new("t1", "W").on_any_network().build();
    let backend = RecordingJobCallback::new();

    receiver.on_start_request(&backend_coder().encode(&t1), backend.clone());

    assert_eq!(backend.results(), vec![JobResult::FailRetry]);
    assert_eq!(binder.bind_count(), 0);
}

#[test]
fn failing_backend_callback_is_not_fatal() {
    let (receiver, binder) = receiver(FixedNetwork::unmetered());
    let t1 = job("t1", "W");
    let backend = RecordingJobCallback::new();
    backend.fail(true);

    receiver.on_start_request(&backend_coder().encode(&t1), backend.clone());
    let worker = RecordingWorker::new();
    binder.connect("W", worker.clone());
    worker.finish(&t1, JobResult::Success);

    assert_eq!(backend.received().len(), 1);
    assert!(receiver.is_idle());
}

#[test]
fn stop_request_is_forwarded() {
    let (receiver, binder) = receiver(FixedNetwork::unmetered());
    let t1 = job("t1", "W");
    let backend = RecordingJobCallback::new();

    receiver.on_start_request(&backend_coder().encode(&t1), backend.clone());
    binder.connect("W", RecordingWorker::new());

    receiver.on_stop_request(&backend_coder().encode(&t1), false);
    receiver.on_stop_request(&JobData::new(), true);

    let conn = binder.last_bound("W").unwrap();
    assert!(conn.was_unbound());
    assert!(backend.results().is_empty());
    assert!(!receiver.is_awaiting(&t1.identity()));
    assert!(receiver.is_idle());
}

#[test]
fn stop_with_result_keeps_backend_callback_until_worker_reports() {
    let (receiver, binder) = receiver(FixedNetwork::unmetered());
    let t1 = job("t1", "W");
    let backend = RecordingJobCallback::new();

    receiver.on_start_request(&backend_coder().encode(&t1), backend.clone());
    let worker = RecordingWorker::new();
    binder.connect("W", worker.clone());

    receiver.on_stop_request(&backend_coder().encode(&t1), true);
    assert!(receiver.is_awaiting(&t1.identity()));

    worker.finish(&t1, JobResult::FailRetry);

    assert_eq!(backend.results(), vec![JobResult::FailRetry]);
    assert!(receiver.is_idle());
}

#[test]
fn result_sent_before_stop_without_result_reaches_backend() {
    let (receiver, binder) = receiver(FixedNetwork::unmetered());
    let t1 = job("t1", "W");
    let backend = RecordingJobCallback::new();

    receiver.on_start_request(&backend_coder().encode(&t1), backend.clone());
    let worker = RecordingWorker::new();
    binder.connect("W", worker.clone());

    worker.finish(&t1, JobResult::Success);
    receiver.on_stop_request(&backend_coder().encode(&t1), false);

    assert_eq!(backend.results(), vec![JobResult::Success]);
    assert!(receiver.is_idle());
}
