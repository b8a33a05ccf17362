//! Startup-safe flush of cached telemetry envelopes.
//!
//! Applications persist diagnostic envelopes (crash reports, events) to a
//! cache directory when they cannot be sent right away. On the next start the
//! [`FlushCoordinator`] hands them to a [`Sender`] without holding up startup:
//! the send runs on a background worker and `register` returns immediately.
//!
//! The exception is a run that follows a crash during startup. That crash
//! report has to leave the machine before the process gets a chance to die
//! again, so the coordinator waits for the send on the calling thread, bounded
//! by `startup_crash_flush_timeout_ms`. When the budget elapses the wait is
//! abandoned, not the send: the same in-flight task finishes in the
//! background.
//!
//! Collaborators sit behind traits so hosts and tests can substitute them:
//!
//! - [`SenderFactory`] validates the cache path and builds the [`Sender`];
//!   [`CacheDirSenderFactory`] drains `*.envelope` files through an
//!   [`EnvelopeTransport`].
//! - [`StartupCrashMarkerProbe`] memoises the startup crash check;
//!   [`StartupCrashMarkerFile`] backs it with a marker in the cache directory.
//! - [`BackgroundWorker`] runs the task; [`ThreadWorker`] uses one named thread.
//! - [`FlushReporter`] observes the lifecycle; [`StructuredFlushReporter`]
//!   emits `tracing` events.
//!
//! [`flush_on_startup`] wires all of the above from a loaded [`Config`].
//!
//! [`Config`]: cacheflush_config::Config

mod cache;
mod coordinator;
mod marker;
mod report;
mod sender;
mod startup;
pub mod telemetry;
mod transport;
mod worker;

pub(crate) const FLUSH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::flush");
pub(crate) const CACHE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cache");

pub use cache::{CacheDirSenderFactory, CachedEnvelopeSender};
pub use coordinator::{FlushCoordinator, FlushOutcome};
pub use marker::{StartupCrashMarkerFile, StartupCrashMarkerProbe};
pub use report::{DispatchMode, FlushReporter, SYNC_TIMEOUT_MESSAGE, StructuredFlushReporter};
pub use sender::{SendError, Sender, SenderFactory, has_cache_dir};
pub use startup::{
    ConfigLoader, StartupError, StaticConfigLoader, SystemConfigLoader, flush_on_startup,
    flush_with_config,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{Envelope, EnvelopeTransport, FlushContext, TransportError};
pub use worker::{
    BackgroundWorker, FlushHandle, FlushTask, TaskOutcome, ThreadWorker, WaitOutcome, WorkerError,
};
