//! Single-task background execution for the flush.
//!
//! Each registration produces exactly one [`FlushTask`]. The worker runs it off
//! the calling thread and hands back a [`FlushHandle`] whose only job is to
//! signal completion. Waiting on the handle can be abandoned at any time;
//! dropping it never cancels the task.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::trace;

use crate::FLUSH_TARGET;
use crate::report::FlushReporter;
use crate::sender::Sender;

const WORKER_THREAD_NAME: &str = "cacheflush-sender";

/// Errors raised by the background worker itself, never by the sender.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker thread could not be started.
    #[error("failed to spawn flush worker: {source}")]
    Spawn {
        /// Underlying IO error from the thread builder.
        #[source]
        source: io::Error,
    },
    /// The sender panicked while flushing.
    #[error("sender panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },
    /// The worker exited without reporting an outcome.
    #[error("flush worker exited without reporting an outcome")]
    Lost,
}

/// Terminal state of a flush task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The sender returned successfully.
    Sent,
    /// The sender returned an error or panicked. Already reported.
    Failed,
}

/// The unit of work: call [`Sender::send`] once and report the result.
pub struct FlushTask {
    sender: Box<dyn Sender>,
    reporter: Arc<dyn FlushReporter>,
}

impl FlushTask {
    /// Binds a sender to the reporter that will observe its outcome.
    #[must_use]
    pub fn new(sender: Box<dyn Sender>, reporter: Arc<dyn FlushReporter>) -> Self {
        Self { sender, reporter }
    }

    /// Runs the sender once. Errors and panics stop here.
    pub fn run(self) -> TaskOutcome {
        let Self { sender, reporter } = self;
        match panic::catch_unwind(AssertUnwindSafe(|| sender.send())) {
            Ok(Ok(())) => {
                reporter.flush_completed();
                TaskOutcome::Sent
            }
            Ok(Err(error)) => {
                reporter.flush_failed(&error);
                TaskOutcome::Failed
            }
            Err(payload) => {
                let error = WorkerError::Panicked {
                    message: panic_message(payload.as_ref()),
                };
                reporter.worker_failed(&error);
                TaskOutcome::Failed
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}

/// Result of a bounded wait on a [`FlushHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The task finished within the budget.
    Finished(TaskOutcome),
    /// The budget elapsed; the task is still running.
    TimedOut,
    /// The worker went away without an outcome.
    Lost,
}

/// One-shot completion signal for a submitted task.
#[derive(Debug)]
pub struct FlushHandle {
    completion: Receiver<TaskOutcome>,
}

impl FlushHandle {
    /// Wraps the receiving end of a completion channel.
    #[must_use]
    pub fn new(completion: Receiver<TaskOutcome>) -> Self {
        Self { completion }
    }

    /// Blocks for at most `timeout` waiting for the task to finish.
    pub fn wait_timeout(&self, timeout: Duration) -> WaitOutcome {
        match self.completion.recv_timeout(timeout) {
            Ok(outcome) => WaitOutcome::Finished(outcome),
            Err(RecvTimeoutError::Timeout) => WaitOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => WaitOutcome::Lost,
        }
    }

    /// Stops observing the task. The task itself keeps running.
    pub fn detach(self) {
        drop(self.completion);
    }
}

/// Executes flush tasks off the calling thread.
pub trait BackgroundWorker: Send + Sync {
    /// Starts the task and returns its completion handle.
    fn submit(&self, task: FlushTask) -> Result<FlushHandle, WorkerError>;
}

/// Worker that runs each task on its own named thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadWorker;

impl ThreadWorker {
    /// Builds a new worker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl BackgroundWorker for ThreadWorker {
    fn submit(&self, task: FlushTask) -> Result<FlushHandle, WorkerError> {
        let (completion, receiver) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_owned())
            .spawn(move || {
                let outcome = task.run();
                if completion.send(outcome).is_err() {
                    trace!(
                        target: FLUSH_TARGET,
                        ?outcome,
                        "flush finished after the caller stopped waiting"
                    );
                }
            })
            .map_err(|source| WorkerError::Spawn { source })?;
        Ok(FlushHandle::new(receiver))
    }
}
