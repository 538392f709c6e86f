#![allow(dead_code)]

//! Recording fakes for the collaborator traits.
//!
//! None of them call back into a connection on their own; tests drive
//! `on_connected` / `job_finished` explicitly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use jobdispatch::dispatch::{
    Binder, JobCallback, JobFinishedCallback, NetworkInfo, NetworkMonitor, RemoteWorker,
    WorkerConnection,
};
use jobdispatch::errors::TransportError;
use jobdispatch::job::{JobCoder, JobData, JobIdentity, JobInvocation};
use jobdispatch::types::JobResult;
use jobdispatch::worker::{JobFinisher, JobService};
use parking_lot::Mutex;

/// Ids of connections the binder was asked to unbind.
pub type UnboundIds = Arc<Mutex<HashSet<u64>>>;

/// Binder that records every call and never connects by itself.
#[derive(Default)]
pub struct RecordingBinder {
    bound: Mutex<Vec<Arc<WorkerConnection>>>,
    unbound: UnboundIds,
    unbind_calls: Mutex<Vec<u64>>,
    fail_binds: Mutex<bool>,
}

impl RecordingBinder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every following `bind` fail.
    pub fn fail_binds(&self, fail: bool) {
        *self.fail_binds.lock() = fail;
    }

    pub fn bind_count(&self) -> usize {
        self.bound.lock().len()
    }

    pub fn bind_count_for(&self, target: &str) -> usize {
        self.bound
            .lock()
            .iter()
            .filter(|c| c.target() == target)
            .count()
    }

    /// The most recent connection bound for `target`.
    pub fn last_bound(&self, target: &str) -> Option<Arc<WorkerConnection>> {
        self.bound
            .lock()
            .iter()
            .rev()
            .find(|c| c.target() == target)
            .cloned()
    }

    /// Complete the most recent bind for `target` with `worker`.
    pub fn connect(&self, target: &str, worker: Arc<RecordingWorker>) -> bool {
        let connection = self
            .last_bound(target)
            .expect("no connection was bound for target");
        let channel: Arc<dyn RemoteWorker> = worker;
        connection.on_connected(channel)
    }

    pub fn unbind_calls(&self) -> Vec<u64> {
        self.unbind_calls.lock().clone()
    }

    pub fn was_unbound(&self, connection: &WorkerConnection) -> bool {
        self.unbound.lock().contains(&connection.id())
    }

    pub fn unbound_ids(&self) -> UnboundIds {
        Arc::clone(&self.unbound)
    }
}

impl Binder for RecordingBinder {
    fn bind(&self, connection: Arc<WorkerConnection>) -> Result<(), TransportError> {
        let target = connection.target().to_string();
        self.bound.lock().push(connection);
        if *self.fail_binds.lock() {
            return Err(TransportError::BindFailed(target, "refused by test".into()));
        }
        Ok(())
    }

    fn unbind(&self, connection: &WorkerConnection) {
        self.unbind_calls.lock().push(connection.id());
        self.unbound.lock().insert(connection.id());
    }
}

/// A call received by a [`RecordingWorker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Start { tag: String },
    Stop { tag: String, need_result: bool },
}

/// Remote worker channel that records calls and keeps the result
/// callbacks so tests can answer them.
#[derive(Default)]
pub struct RecordingWorker {
    coder: JobCoder,
    calls: Mutex<Vec<RemoteCall>>,
    callbacks: Mutex<HashMap<String, Vec<Arc<dyn JobCallback>>>>,
    fail_starts: Mutex<bool>,
    fail_stops: Mutex<bool>,
    watch: Option<(u64, UnboundIds)>,
    violations: Mutex<usize>,
}

impl RecordingWorker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A worker that counts calls made after connection `id` was unbound.
    pub fn watching(id: u64, unbound: UnboundIds) -> Arc<Self> {
        Arc::new(Self {
            watch: Some((id, unbound)),
            ..Self::default()
        })
    }

    pub fn fail_starts(&self, fail: bool) {
        *self.fail_starts.lock() = fail;
    }

    pub fn fail_stops(&self, fail: bool) {
        *self.fail_stops.lock() = fail;
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    pub fn start_count(&self, tag: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, RemoteCall::Start { tag: t } if t == tag))
            .count()
    }

    pub fn calls_after_unbind(&self) -> usize {
        *self.violations.lock()
    }

    /// The callback handed over with the `n`-th start of `tag`.
    pub fn callback(&self, tag: &str, n: usize) -> Option<Arc<dyn JobCallback>> {
        self.callbacks.lock().get(tag).and_then(|v| v.get(n)).cloned()
    }

    pub fn latest_callback(&self, tag: &str) -> Option<Arc<dyn JobCallback>> {
        self.callbacks.lock().get(tag).and_then(|v| v.last()).cloned()
    }

    /// Report `result` for the latest start of `job`.
    pub fn finish(&self, job: &JobInvocation, result: JobResult) {
        let callback = self
            .latest_callback(job.tag())
            .expect("job was never started on this worker");
        callback
            .job_finished(self.coder.encode(job), result)
            .expect("result callback failed");
    }

    fn check_watch(&self) {
        if let Some((id, unbound)) = &self.watch {
            if unbound.lock().contains(id) {
                *self.violations.lock() += 1;
            }
        }
    }

    fn decode_tag(&self, job: &JobData) -> String {
        self.coder
            .decode(job)
            .map(|j| j.tag().to_string())
            .unwrap_or_default()
    }
}

impl RemoteWorker for RecordingWorker {
    fn start(&self, job: JobData, callback: Arc<dyn JobCallback>) -> Result<(), TransportError> {
        self.check_watch();
        let tag = self.decode_tag(&job);
        self.calls.lock().push(RemoteCall::Start { tag: tag.clone() });
        if *self.fail_starts.lock() {
            return Err(TransportError::Remote("start refused by test".into()));
        }
        self.callbacks.lock().entry(tag).or_default().push(callback);
        Ok(())
    }

    fn stop(&self, job: JobData, need_to_send_result: bool) -> Result<(), TransportError> {
        self.check_watch();
        let tag = self.decode_tag(&job);
        self.calls.lock().push(RemoteCall::Stop {
            tag,
            need_result: need_to_send_result,
        });
        if *self.fail_stops.lock() {
            return Err(TransportError::Remote("stop refused by test".into()));
        }
        Ok(())
    }
}

/// Finish callback that records every terminal result.
#[derive(Default)]
pub struct RecordingFinishCallback {
    results: Mutex<Vec<(JobIdentity, JobResult)>>,
}

impl RecordingFinishCallback {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn results(&self) -> Vec<(JobIdentity, JobResult)> {
        self.results.lock().clone()
    }

    pub fn results_for(&self, job: &JobInvocation) -> Vec<JobResult> {
        let identity = job.identity();
        self.results
            .lock()
            .iter()
            .filter(|(id, _)| *id == identity)
            .map(|(_, r)| *r)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.results.lock().len()
    }
}

impl JobFinishedCallback for RecordingFinishCallback {
    fn on_job_finished(&self, job: &JobInvocation, result: JobResult) {
        self.results.lock().push((job.identity(), result));
    }
}

/// Backend-side result callback for receiver tests.
#[derive(Default)]
pub struct RecordingJobCallback {
    received: Mutex<Vec<(JobData, JobResult)>>,
    fail: Mutex<bool>,
}

impl RecordingJobCallback {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn received(&self) -> Vec<(JobData, JobResult)> {
        self.received.lock().clone()
    }

    pub fn results(&self) -> Vec<JobResult> {
        self.received.lock().iter().map(|(_, r)| *r).collect()
    }
}

impl JobCallback for RecordingJobCallback {
    fn job_finished(&self, job: JobData, result: JobResult) -> Result<(), TransportError> {
        self.received.lock().push((job, result));
        if *self.fail.lock() {
            return Err(TransportError::Remote("backend unreachable".into()));
        }
        Ok(())
    }
}

/// Network monitor that always reports the same network.
#[derive(Debug, Clone, Copy)]
pub struct FixedNetwork(pub Option<NetworkInfo>);

impl FixedNetwork {
    pub fn unmetered() -> Arc<Self> {
        Arc::new(Self(Some(NetworkInfo::unmetered())))
    }

    pub fn metered() -> Arc<Self> {
        Arc::new(Self(Some(NetworkInfo::metered())))
    }

    pub fn none() -> Arc<Self> {
        Arc::new(Self(None))
    }
}

impl NetworkMonitor for FixedNetwork {
    fn active_network(&self) -> Option<NetworkInfo> {
        self.0
    }
}

/// Job service that records hook calls and keeps finishers.
pub struct RecordingService {
    more_work: bool,
    retry_on_stop: bool,
    started: Mutex<Vec<String>>,
    stopped: Mutex<Vec<String>>,
    finishers: Mutex<HashMap<String, JobFinisher>>,
}

impl RecordingService {
    /// `more_work`: what `on_start_job` returns. `retry_on_stop`: what
    /// `on_stop_job` returns.
    pub fn new(more_work: bool, retry_on_stop: bool) -> Arc<Self> {
        Arc::new(Self {
            more_work,
            retry_on_stop,
            started: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            finishers: Mutex::new(HashMap::new()),
        })
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().clone()
    }

    pub fn finisher(&self, tag: &str) -> Option<JobFinisher> {
        self.finishers.lock().get(tag).cloned()
    }
}

impl JobService for RecordingService {
    fn on_start_job(&self, job: &JobInvocation, finisher: JobFinisher) -> bool {
        self.started.lock().push(job.tag().to_string());
        self.finishers.lock().insert(job.tag().to_string(), finisher);
        self.more_work
    }

    fn on_stop_job(&self, job: &JobInvocation) -> bool {
        self.stopped.lock().push(job.tag().to_string());
        self.retry_on_stop
    }
}
