//! Startup flush coordination.
//!
//! [`FlushCoordinator::register`] decides how the cached envelopes left by the
//! previous run are delivered. Normal startups submit the flush to the
//! background worker and return at once. When the previous run crashed during
//! startup the caller blocks until the flush finishes, but never longer than
//! the configured budget: once it elapses the same task carries on in the
//! background and startup proceeds.

use std::sync::Arc;
use std::time::Duration;

use cacheflush_config::Config;

use crate::marker::StartupCrashMarkerProbe;
use crate::report::{DispatchMode, FlushReporter};
use crate::sender::SenderFactory;
use crate::transport::FlushContext;
use crate::worker::{
    BackgroundWorker, FlushTask, TaskOutcome, ThreadWorker, WaitOutcome, WorkerError,
};

/// Terminal path taken by a single registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// No cache directory is configured; nothing happened.
    Disabled,
    /// The factory declined to build a sender; nothing was submitted.
    SenderUnavailable,
    /// The flush was submitted and the caller did not wait.
    Dispatched,
    /// The caller waited and the flush finished within the budget.
    Completed(TaskOutcome),
    /// The budget elapsed; the flush continues in the background.
    Detached,
    /// The worker could not run the flush.
    WorkerFailed,
}

/// Coordinates the one-shot flush of cached envelopes at startup.
pub struct FlushCoordinator<F, W = ThreadWorker> {
    factory: F,
    probe: StartupCrashMarkerProbe,
    worker: W,
    reporter: Arc<dyn FlushReporter>,
}

impl<F> FlushCoordinator<F> {
    /// Builds a coordinator that runs flushes on a dedicated thread.
    pub fn new(
        factory: F,
        probe: StartupCrashMarkerProbe,
        reporter: Arc<dyn FlushReporter>,
    ) -> Self {
        Self::with_worker(factory, probe, ThreadWorker::new(), reporter)
    }
}

impl<F, W> FlushCoordinator<F, W> {
    /// Builds a coordinator over a custom background worker.
    pub fn with_worker(
        factory: F,
        probe: StartupCrashMarkerProbe,
        worker: W,
        reporter: Arc<dyn FlushReporter>,
    ) -> Self {
        Self {
            factory,
            probe,
            worker,
            reporter,
        }
    }

    /// Memoised startup crash marker, evaluated on first use.
    pub fn has_startup_crash_marker(&self) -> bool {
        self.probe.has_startup_crash_marker()
    }
}

impl<F, W> FlushCoordinator<F, W>
where
    F: SenderFactory,
    W: BackgroundWorker,
{
    /// Flushes cached envelopes for this startup.
    ///
    /// Never fails: every error is reported and folded into the returned
    /// [`FlushOutcome`]. The sender is invoked at most once per call.
    pub fn register(&self, context: &FlushContext, config: &Config) -> FlushOutcome {
        if !self.factory.has_valid_path(config, context) {
            self.reporter.flush_disabled();
            return FlushOutcome::Disabled;
        }

        let Some(sender) = self.factory.create(context, config) else {
            self.reporter.sender_unavailable(config.cache_dir_path());
            return FlushOutcome::SenderUnavailable;
        };
        let task = FlushTask::new(sender, Arc::clone(&self.reporter));

        if !self.probe.has_startup_crash_marker() {
            return self.dispatch_in_background(task);
        }

        let timeout = config.startup_crash_flush_timeout();
        if timeout.is_zero() {
            self.reporter.sync_wait_skipped();
            return self.dispatch_in_background(task);
        }

        self.dispatch_and_wait(task, timeout)
    }

    fn dispatch_in_background(&self, task: FlushTask) -> FlushOutcome {
        match self.worker.submit(task) {
            Ok(handle) => {
                self.reporter.flush_dispatched(DispatchMode::Background);
                handle.detach();
                FlushOutcome::Dispatched
            }
            Err(error) => {
                self.reporter.worker_failed(&error);
                FlushOutcome::WorkerFailed
            }
        }
    }

    fn dispatch_and_wait(&self, task: FlushTask, timeout: Duration) -> FlushOutcome {
        let handle = match self.worker.submit(task) {
            Ok(handle) => handle,
            Err(error) => {
                self.reporter.worker_failed(&error);
                return FlushOutcome::WorkerFailed;
            }
        };
        self.reporter
            .flush_dispatched(DispatchMode::Synchronous { timeout });

        match handle.wait_timeout(timeout) {
            WaitOutcome::Finished(outcome) => FlushOutcome::Completed(outcome),
            WaitOutcome::TimedOut => {
                self.reporter.sync_wait_timed_out(timeout);
                handle.detach();
                FlushOutcome::Detached
            }
            WaitOutcome::Lost => {
                self.reporter.worker_failed(&WorkerError::Lost);
                FlushOutcome::WorkerFailed
            }
        }
    }
}
