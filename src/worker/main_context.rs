// src/worker/main_context.rs

//! Where [`JobService`](crate::worker::JobService) hooks run.
//!
//! Start and stop hooks always run on one designated context, never on the
//! endpoint's background task. [`InlineContext`] runs them immediately,
//! which is enough for tests and services that don't care about threads.
//! [`main_thread`] gives a queue that a dedicated thread drains.

use tokio::sync::mpsc;
use tracing::debug;

pub type MainTask = Box<dyn FnOnce() + Send + 'static>;

pub trait MainContext: Send + Sync {
    fn post(&self, task: MainTask);
}

/// Runs every task on the posting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineContext;

impl MainContext for InlineContext {
    fn post(&self, task: MainTask) {
        task();
    }
}

/// Handle for posting work to a [`MainLoop`].
#[derive(Debug, Clone)]
pub struct MainThread {
    tx: mpsc::UnboundedSender<MainTask>,
}

impl MainContext for MainThread {
    fn post(&self, task: MainTask) {
        if self.tx.send(task).is_err() {
            debug!("main loop is gone; dropping task");
        }
    }
}

/// The receiving half of [`main_thread`].
#[derive(Debug)]
pub struct MainLoop {
    rx: mpsc::UnboundedReceiver<MainTask>,
}

/// Create a connected main-thread handle and loop.
pub fn main_thread() -> (MainThread, MainLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MainThread { tx }, MainLoop { rx })
}

impl MainLoop {
    /// Run tasks until every [`MainThread`] handle is dropped.
    ///
    /// Blocks the calling thread, so it must not be called from inside an
    /// async runtime.
    pub fn run(mut self) {
        while let Some(task) = self.rx.blocking_recv() {
            task();
        }
        debug!("main loop finished (all handles dropped)");
    }

    /// Async variant of [`run`](Self::run).
    pub async fn run_async(mut self) {
        while let Some(task) = self.rx.recv().await {
            task();
        }
        debug!("main loop finished (all handles dropped)");
    }

    /// Run whatever is queued right now and return how many tasks ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }
}
