use std::sync::Arc;
use std::time::Duration;

use jobdispatch::dispatch::RemoteWorker;
use jobdispatch::job::{JobCoder, JobData};
use jobdispatch::types::JobResult;
use jobdispatch::worker::{InlineContext, WorkerEndpoint, format_elapsed, main_thread};
use jobdispatch_test_utils::builders::job;
use jobdispatch_test_utils::fakes::{RecordingJobCallback, RecordingService};
use jobdispatch_test_utils::{init_tracing, wait_until};

fn spawn(service: &Arc<RecordingService>) -> WorkerEndpoint {
    init_tracing();
    WorkerEndpoint::spawn("svc", service.clone(), Arc::new(InlineContext))
}

fn encoded(tag: &str) -> JobData {
    JobCoder::default().encode(&job(tag, "svc"))
}

#[tokio::test]
async fn start_runs_service_and_explicit_finish_reports_once() {
    let service = RecordingService::new(true, false);
    let endpoint = spawn(&service);
    let callback = RecordingJobCallback::new();

    endpoint.start(encoded("t1"), callback.clone()).unwrap();
    wait_until("t1 started", || service.started() == vec!["t1".to_string()]).await;
    assert!(endpoint.is_running("t1"));

    let finisher = service.finisher("t1").unwrap();
    finisher.finish(false);
    finisher.finish(true);
    endpoint.job_finished(&job("t1", "svc"), true);

    // A later request acts as a barrier for everything queued before it.
    endpoint.start(encoded("t2"), RecordingJobCallback::new()).unwrap();
    wait_until("t2 started", || service.started().len() == 2).await;

    assert_eq!(callback.results(), vec![JobResult::Success]);
    assert!(!endpoint.is_running("t1"));
}

#[tokio::test]
async fn start_without_more_work_reports_success_immediately() {
    let service = RecordingService::new(false, false);
    let endpoint = spawn(&service);
    let callback = RecordingJobCallback::new();

    endpoint.start(encoded("quick"), callback.clone()).unwrap();

    wait_until("result sent", || callback.results().len() == 1).await;
    assert_eq!(callback.results(), vec![JobResult::Success]);
    assert!(!endpoint.is_running("quick"));
}

#[tokio::test]
async fn duplicate_start_for_running_tag_is_ignored() {
    let service = RecordingService::new(true, false);
    let endpoint = spawn(&service);
    let first = RecordingJobCallback::new();
    let second = RecordingJobCallback::new();

    endpoint.start(encoded("t1"), first.clone()).unwrap();
    endpoint.start(encoded("t1"), second.clone()).unwrap();
    endpoint.job_finished(&job("t1", "svc"), false);

    wait_until("result sent", || first.results().len() == 1).await;
    assert_eq!(service.started(), vec!["t1".to_string()]);
    assert!(second.results().is_empty());
}

#[tokio::test]
async fn stop_without_result_sends_nothing() {
    let service = RecordingService::new(true, false);
    let endpoint = spawn(&service);
    let callback = RecordingJobCallback::new();

    endpoint.start(encoded("t1"), callback.clone()).unwrap();
    endpoint.stop(encoded("t1"), false).unwrap();

    wait_until("t1 stopped", || service.stopped() == vec!["t1".to_string()]).await;
    endpoint.start(encoded("t2"), RecordingJobCallback::new()).unwrap();
    wait_until("t2 started", || service.started().len() == 2).await;

    assert!(callback.results().is_empty());
}

#[tokio::test]
async fn finisher_of_replaced_instance_does_not_finish_new_one() {
    let service = RecordingService::new(true, false);
    let endpoint = spawn(&service);
    let first = RecordingJobCallback::new();
    let second = RecordingJobCallback::new();

    endpoint.start(encoded("t1"), first.clone()).unwrap();
    wait_until("t1 started", || service.started().len() == 1).await;
    let stale = service.finisher("t1").unwrap();

    endpoint.stop(encoded("t1"), false).unwrap();
    endpoint.start(encoded("t1"), second.clone()).unwrap();
    wait_until("t1 restarted", || service.started().len() == 2).await;

    stale.finish(false);
    endpoint.start(encoded("t2"), RecordingJobCallback::new()).unwrap();
    wait_until("t2 started", || service.started().len() == 3).await;

    assert!(endpoint.is_running("t1"));
    assert!(first.results().is_empty());
    assert!(second.results().is_empty());

    service.finisher("t1").unwrap().finish(true);
    wait_until("result sent", || second.results().len() == 1).await;
    assert_eq!(second.results(), vec![JobResult::FailRetry]);
}

#[tokio::test]
async fn stop_with_result_reports_success_or_retry() {
    let plain = RecordingService::new(true, false);
    let endpoint = spawn(&plain);
    let callback = RecordingJobCallback::new();
    endpoint.start(encoded("t1"), callback.clone()).unwrap();
    endpoint.stop(encoded("t1"), true).unwrap();
    wait_until("result sent", || callback.results().len() == 1).await;
    assert_eq!(callback.results(), vec![JobResult::Success]);

    let retrying = RecordingService::new(true, true);
    let endpoint = spawn(&retrying);
    let callback = RecordingJobCallback::new();
    endpoint.start(encoded("t1"), callback.clone()).unwrap();
    endpoint.stop(encoded("t1"), true).unwrap();
    wait_until("result sent", || callback.results().len() == 1).await;
    assert_eq!(callback.results(), vec![JobResult::FailRetry]);
}

#[tokio::test]
async fn stop_for_finished_job_is_ignored() {
    let service = RecordingService::new(false, false);
    let endpoint = spawn(&service);
    let callback = RecordingJobCallback::new();

    endpoint.start(encoded("t1"), callback.clone()).unwrap();
    wait_until("result sent", || callback.results().len() == 1).await;
    endpoint.stop(encoded("t1"), true).unwrap();
    endpoint.start(encoded("t2"), RecordingJobCallback::new()).unwrap();
    wait_until("t2 started", || service.started().len() == 2).await;

    assert!(service.stopped().is_empty());
    assert_eq!(callback.results().len(), 1);
}

#[tokio::test]
async fn unbind_stops_everything_without_retry() {
    let service = RecordingService::new(true, false);
    let endpoint = spawn(&service);
    let a = RecordingJobCallback::new();
    let b = RecordingJobCallback::new();

    endpoint.start(encoded("a"), a.clone()).unwrap();
    endpoint.start(encoded("b"), b.clone()).unwrap();
    endpoint.on_unbind();

    wait_until("both reported", || a.results().len() == 1 && b.results().len() == 1).await;
    assert_eq!(a.results(), vec![JobResult::FailNoRetry]);
    assert_eq!(b.results(), vec![JobResult::FailNoRetry]);
    assert!(endpoint.running_tags().is_empty());
}

#[tokio::test]
async fn unbind_honours_retry_request() {
    let service = RecordingService::new(true, true);
    let endpoint = spawn(&service);
    let callback = RecordingJobCallback::new();

    endpoint.start(encoded("a"), callback.clone()).unwrap();
    endpoint.on_unbind();

    wait_until("reported", || callback.results().len() == 1).await;
    assert_eq!(callback.results(), vec![JobResult::FailRetry]);
}

#[tokio::test]
async fn undecodable_start_is_dropped() {
    let service = RecordingService::new(true, false);
    let endpoint = spawn(&service);

    assert!(endpoint.start(JobData::new(), RecordingJobCallback::new()).is_ok());
    endpoint.start(encoded("t1"), RecordingJobCallback::new()).unwrap();

    wait_until("t1 started", || service.started().len() == 1).await;
    assert_eq!(service.started(), vec!["t1".to_string()]);
}

#[tokio::test]
async fn dump_lists_running_jobs() {
    let service = RecordingService::new(true, false);
    let endpoint = spawn(&service);
    assert_eq!(endpoint.dump(), "No running jobs\n");

    endpoint.start(encoded("t1"), RecordingJobCallback::new()).unwrap();
    wait_until("t1 running", || endpoint.is_running("t1")).await;

    let dump = endpoint.dump();
    assert!(dump.starts_with("Running jobs:\n"));
    assert!(dump.contains("    * \"t1\" has been running for 00:0"));
}

#[test]
fn elapsed_time_formatting() {
    assert_eq!(format_elapsed(Duration::ZERO), "00:00");
    assert_eq!(format_elapsed(Duration::from_secs(75)), "01:15");
    assert_eq!(format_elapsed(Duration::from_secs(3725)), "1:02:05");
}

#[tokio::test]
async fn hooks_run_on_the_main_loop() {
    init_tracing();
    let (main, mut main_loop) = main_thread();
    let service = RecordingService::new(false, false);
    let endpoint = WorkerEndpoint::spawn("svc", service.clone(), Arc::new(main));
    let callback = RecordingJobCallback::new();

    endpoint.start(encoded("t1"), callback.clone()).unwrap();
    wait_until("t1 running", || endpoint.is_running("t1")).await;
    assert!(service.started().is_empty());

    let mut ran = 0;
    wait_until("hook posted", || {
        ran += main_loop.run_pending();
        ran > 0
    })
    .await;
    assert_eq!(service.started(), vec!["t1".to_string()]);

    wait_until("result sent", || callback.results().len() == 1).await;
    assert_eq!(callback.results(), vec![JobResult::Success]);
}
