//! Structured reporting for flush lifecycle events.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;

use crate::FLUSH_TARGET;
use crate::sender::SendError;
use crate::worker::WorkerError;

/// Diagnostic emitted when the bounded wait after a startup crash elapses.
pub const SYNC_TIMEOUT_MESSAGE: &str = "Synchronous send timed out, continuing in the background.";

/// How a flush task was handed to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Fire-and-forget; the caller does not wait.
    Background,
    /// The caller waits up to the given budget.
    Synchronous {
        /// Maximum time the caller blocks.
        timeout: Duration,
    },
}

/// Observer for flush lifecycle events.
///
/// Completion events may arrive on the worker thread, after `register` has
/// returned.
pub trait FlushReporter: Send + Sync {
    /// No cache directory is configured; the flush is disabled.
    fn flush_disabled(&self);

    /// The factory could not build a sender.
    fn sender_unavailable(&self, cache_dir: Option<&Utf8Path>);

    /// The flush task was submitted to the worker.
    fn flush_dispatched(&self, mode: DispatchMode);

    /// A startup crash was detected but the configured budget is zero.
    fn sync_wait_skipped(&self);

    /// The bounded wait elapsed; the task keeps running in the background.
    fn sync_wait_timed_out(&self, timeout: Duration);

    /// The sender finished without error.
    fn flush_completed(&self);

    /// The sender failed. The failure is terminal.
    fn flush_failed(&self, error: &SendError);

    /// The worker could not run the task or exited without an outcome.
    fn worker_failed(&self, error: &WorkerError);
}

impl<T> FlushReporter for Arc<T>
where
    T: FlushReporter + ?Sized,
{
    fn flush_disabled(&self) {
        (**self).flush_disabled();
    }

    fn sender_unavailable(&self, cache_dir: Option<&Utf8Path>) {
        (**self).sender_unavailable(cache_dir);
    }

    fn flush_dispatched(&self, mode: DispatchMode) {
        (**self).flush_dispatched(mode);
    }

    fn sync_wait_skipped(&self) {
        (**self).sync_wait_skipped();
    }

    fn sync_wait_timed_out(&self, timeout: Duration) {
        (**self).sync_wait_timed_out(timeout);
    }

    fn flush_completed(&self) {
        (**self).flush_completed();
    }

    fn flush_failed(&self, error: &SendError) {
        (**self).flush_failed(error);
    }

    fn worker_failed(&self, error: &WorkerError) {
        (**self).worker_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredFlushReporter;

impl StructuredFlushReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FlushReporter for StructuredFlushReporter {
    fn flush_disabled(&self) {
        tracing::info!(
            target: FLUSH_TARGET,
            event = "flush_disabled",
            "no cache directory configured; skipping cached envelope flush"
        );
    }

    fn sender_unavailable(&self, cache_dir: Option<&Utf8Path>) {
        tracing::debug!(
            target: FLUSH_TARGET,
            event = "sender_unavailable",
            cache_dir = cache_dir.map(Utf8Path::as_str),
            "no sender available for cached envelopes"
        );
    }

    fn flush_dispatched(&self, mode: DispatchMode) {
        match mode {
            DispatchMode::Background => tracing::debug!(
                target: FLUSH_TARGET,
                event = "flush_dispatched",
                mode = "background",
                "cached envelope flush submitted"
            ),
            DispatchMode::Synchronous { timeout } => tracing::debug!(
                target: FLUSH_TARGET,
                event = "flush_dispatched",
                mode = "synchronous",
                timeout_ms = timeout.as_millis(),
                "startup crash detected; awaiting cached envelope flush"
            ),
        }
    }

    fn sync_wait_skipped(&self) {
        tracing::debug!(
            target: FLUSH_TARGET,
            event = "sync_wait_skipped",
            "startup crash detected but flush timeout is zero; sending in the background"
        );
    }

    fn sync_wait_timed_out(&self, timeout: Duration) {
        tracing::debug!(
            target: FLUSH_TARGET,
            event = "sync_wait_timed_out",
            timeout_ms = timeout.as_millis(),
            "{}",
            SYNC_TIMEOUT_MESSAGE
        );
    }

    fn flush_completed(&self) {
        tracing::debug!(
            target: FLUSH_TARGET,
            event = "flush_completed",
            "cached envelope flush completed"
        );
    }

    fn flush_failed(&self, error: &SendError) {
        tracing::error!(
            target: FLUSH_TARGET,
            event = "flush_failed",
            error = %error,
            "cached envelope flush failed"
        );
    }

    fn worker_failed(&self, error: &WorkerError) {
        tracing::error!(
            target: FLUSH_TARGET,
            event = "worker_failed",
            error = %error,
            "flush worker failed"
        );
    }
}
