// src/worker/endpoint.rs

//! Worker-side request sequencer.
//!
//! A [`WorkerEndpoint`] receives start and stop requests from the
//! dispatcher and feeds them, one at a time, through a background Tokio
//! task. The task owns the table of running jobs; service hooks are posted
//! to the [`MainContext`] and report back to the task through the same
//! queue. Result sends happen on the background task.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dispatch::transport::{JobCallback, RemoteWorker};
use crate::errors::TransportError;
use crate::job::{JobCoder, JobData, JobInvocation};
use crate::types::JobResult;
use crate::worker::main_context::MainContext;
use crate::worker::service::{JobFinisher, JobService};

/// One unit of work for the sequencer.
pub(crate) enum WorkItem {
    Start {
        job: JobInvocation,
        callback: Arc<dyn JobCallback>,
    },
    Stop {
        job: JobInvocation,
        need_to_send_result: bool,
    },
    /// Completion reported by the service. Ignored if the job is no longer
    /// running. With an `attempt`, only that instance of the tag is
    /// finished.
    RemoveAndFinish {
        job: JobInvocation,
        attempt: Option<u64>,
        result: JobResult,
    },
    /// Result computed after a stop; the job is already out of the table.
    SendResult { running: RunningJob, result: JobResult },
    Unbind,
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkItem::Start { job, .. } => write!(f, "Start({})", job.identity()),
            WorkItem::Stop {
                job,
                need_to_send_result,
            } => write!(f, "Stop({}, {need_to_send_result})", job.identity()),
            WorkItem::RemoveAndFinish { job, result, .. } => {
                write!(f, "RemoveAndFinish({}, {result})", job.identity())
            }
            WorkItem::SendResult { running, result } => {
                write!(f, "SendResult({}, {result})", running.job.identity())
            }
            WorkItem::Unbind => f.write_str("Unbind"),
        }
    }
}

pub(crate) struct RunningJob {
    job: JobInvocation,
    attempt: u64,
    callback: Arc<dyn JobCallback>,
    started_at: Instant,
}

impl RunningJob {
    fn send_result(&self, coder: &JobCoder, result: JobResult) {
        info!(job = %self.job.identity(), %result, "sending job result");
        if let Err(e) = self.callback.job_finished(coder.encode(&self.job), result) {
            error!(job = %self.job.identity(), error = %e, "failed to send job result");
        }
    }
}

type RunningTable = Arc<Mutex<HashMap<String, RunningJob>>>;

/// Handle to a spawned worker endpoint. Clones talk to the same sequencer.
#[derive(Clone)]
pub struct WorkerEndpoint {
    name: Arc<str>,
    coder: JobCoder,
    tx: mpsc::UnboundedSender<WorkItem>,
    running: RunningTable,
}

impl std::fmt::Debug for WorkerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerEndpoint")
            .field("name", &self.name)
            .field("running", &self.running_tags())
            .finish()
    }
}

impl WorkerEndpoint {
    /// Spawn the sequencer for `service`. Must be called within a Tokio
    /// runtime.
    pub fn spawn(
        name: impl Into<String>,
        service: Arc<dyn JobService>,
        main: Arc<dyn MainContext>,
    ) -> Self {
        Self::spawn_with_coder(name, service, main, JobCoder::default())
    }

    /// `coder` must match the one the dispatcher encodes jobs with.
    pub fn spawn_with_coder(
        name: impl Into<String>,
        service: Arc<dyn JobService>,
        main: Arc<dyn MainContext>,
        coder: JobCoder,
    ) -> Self {
        let name: Arc<str> = Arc::from(name.into());
        let (tx, mut rx) = mpsc::unbounded_channel::<WorkItem>();
        let running: RunningTable = Arc::new(Mutex::new(HashMap::new()));

        let sequencer = Sequencer {
            name: Arc::clone(&name),
            coder: coder.clone(),
            service,
            main,
            running: Arc::clone(&running),
            tx: tx.downgrade(),
            next_attempt: AtomicU64::new(1),
        };

        tokio::spawn(async move {
            info!(endpoint = %sequencer.name, "worker endpoint started");
            while let Some(item) = rx.recv().await {
                debug!(endpoint = %sequencer.name, ?item, "processing work item");
                sequencer.handle(item);
            }
            info!(endpoint = %sequencer.name, "worker endpoint finished (channel closed)");
        });

        Self {
            name,
            coder,
            tx,
            running,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Complete `job` from outside the service hooks. Has no effect if the
    /// job is not running any more.
    pub fn job_finished(&self, job: &JobInvocation, needs_reschedule: bool) {
        let result = if needs_reschedule {
            JobResult::FailRetry
        } else {
            JobResult::Success
        };
        self.enqueue(WorkItem::RemoveAndFinish {
            job: job.clone(),
            attempt: None,
            result,
        });
    }

    /// The dispatcher released its last connection: stop everything.
    ///
    /// Every running job is stopped and reported as `FailNoRetry`, or
    /// `FailRetry` if the service asks for a retry.
    pub fn on_unbind(&self) {
        self.enqueue(WorkItem::Unbind);
    }

    pub fn is_running(&self, tag: &str) -> bool {
        self.running.lock().contains_key(tag)
    }

    pub fn running_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.running.lock().keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Human-readable list of running jobs and how long each has run.
    pub fn dump(&self) -> String {
        let running = self.running.lock();
        if running.is_empty() {
            return "No running jobs\n".to_string();
        }

        let now = Instant::now();
        let mut entries: Vec<(&String, &RunningJob)> = running.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut out = String::from("Running jobs:\n");
        for (tag, job) in entries {
            let _ = writeln!(
                out,
                "    * {} has been running for {}",
                Value::from(tag.as_str()),
                format_elapsed(now.saturating_duration_since(job.started_at)),
            );
        }
        out
    }

    fn enqueue(&self, item: WorkItem) -> bool {
        if self.tx.send(item).is_err() {
            warn!(endpoint = %self.name, "worker endpoint is gone; dropping request");
            return false;
        }
        true
    }
}

impl RemoteWorker for WorkerEndpoint {
    fn start(&self, job: JobData, callback: Arc<dyn JobCallback>) -> Result<(), TransportError> {
        let job = match self.coder.decode(&job) {
            Ok(job) => job,
            Err(e) => {
                error!(endpoint = %self.name, error = %e, "start: unknown invocation provided");
                return Ok(());
            }
        };
        self.tx
            .send(WorkItem::Start { job, callback })
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn stop(&self, job: JobData, need_to_send_result: bool) -> Result<(), TransportError> {
        let job = match self.coder.decode(&job) {
            Ok(job) => job,
            Err(e) => {
                error!(endpoint = %self.name, error = %e, "stop: unknown invocation provided");
                return Ok(());
            }
        };
        self.tx
            .send(WorkItem::Stop {
                job,
                need_to_send_result,
            })
            .map_err(|_| TransportError::ChannelClosed)
    }
}

/// State owned by the background task.
struct Sequencer {
    name: Arc<str>,
    coder: JobCoder,
    service: Arc<dyn JobService>,
    main: Arc<dyn MainContext>,
    running: RunningTable,
    tx: mpsc::WeakUnboundedSender<WorkItem>,
    next_attempt: AtomicU64,
}

impl Sequencer {
    fn handle(&self, item: WorkItem) {
        match item {
            WorkItem::Start { job, callback } => self.handle_start(job, callback),
            WorkItem::Stop {
                job,
                need_to_send_result,
            } => self.handle_stop(&job, need_to_send_result),
            WorkItem::RemoveAndFinish {
                job,
                attempt,
                result,
            } => self.handle_finish(&job, attempt, result),
            WorkItem::SendResult { running, result } => running.send_result(&self.coder, result),
            WorkItem::Unbind => self.handle_unbind(),
        }
    }

    fn handle_start(&self, job: JobInvocation, callback: Arc<dyn JobCallback>) {
        let attempt = self.next_attempt.fetch_add(1, Ordering::Relaxed);
        {
            let mut running = self.running.lock();
            if running.contains_key(job.tag()) {
                warn!(endpoint = %self.name, tag = %job.tag(), "job with this tag is already running; ignoring start");
                return;
            }
            running.insert(
                job.tag().to_string(),
                RunningJob {
                    job: job.clone(),
                    attempt,
                    callback,
                    started_at: Instant::now(),
                },
            );
        }

        let Some(tx) = self.tx.upgrade() else {
            return;
        };
        let service = Arc::clone(&self.service);
        let finisher = JobFinisher::new(job.clone(), attempt, tx.clone());
        self.main.post(Box::new(move || {
            let more_work = service.on_start_job(&job, finisher);
            if !more_work {
                let _ = tx.send(WorkItem::RemoveAndFinish {
                    job,
                    attempt: Some(attempt),
                    result: JobResult::Success,
                });
            }
        }));
    }

    fn handle_stop(&self, job: &JobInvocation, need_to_send_result: bool) {
        let removed = self.running.lock().remove(job.tag());
        match removed {
            Some(running) => self.post_stop(running, need_to_send_result, JobResult::Success),
            None => debug!(endpoint = %self.name, tag = %job.tag(), "stop: job already finished"),
        }
    }

    fn handle_finish(&self, job: &JobInvocation, attempt: Option<u64>, result: JobResult) {
        let removed = {
            let mut running = self.running.lock();
            let replaced = running
                .get(job.tag())
                .is_some_and(|current| attempt.is_some_and(|a| a != current.attempt));
            if replaced {
                debug!(endpoint = %self.name, tag = %job.tag(), "finish: completion is for a replaced instance");
                return;
            }
            running.remove(job.tag())
        };
        match removed {
            Some(running) => running.send_result(&self.coder, result),
            None => debug!(endpoint = %self.name, tag = %job.tag(), "finish: job already finished"),
        }
    }

    fn handle_unbind(&self) {
        let drained: Vec<RunningJob> = self.running.lock().drain().map(|(_, job)| job).collect();
        if !drained.is_empty() {
            info!(endpoint = %self.name, count = drained.len(), "unbound; stopping running jobs");
        }
        for running in drained {
            self.post_stop(running, true, JobResult::FailNoRetry);
        }
    }

    /// Ask the service to stop `running`. If a result is wanted it is
    /// `FailRetry` when the service asks for a retry, `otherwise` if not.
    fn post_stop(&self, running: RunningJob, need_to_send_result: bool, otherwise: JobResult) {
        let Some(tx) = self.tx.upgrade() else {
            return;
        };
        let service = Arc::clone(&self.service);
        self.main.post(Box::new(move || {
            let retry = service.on_stop_job(&running.job);
            if need_to_send_result {
                let result = if retry { JobResult::FailRetry } else { otherwise };
                let _ = tx.send(WorkItem::SendResult { running, result });
            }
        }));
    }
}

/// `MM:SS`, or `H:MM:SS` once an hour has passed.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
