//! Test doubles and scenario harness shared by the flush suites.

use std::ffi::OsString;
use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use cacheflush_config::Config;

use crate::coordinator::{FlushCoordinator, FlushOutcome};
use crate::marker::{StartupCrashMarkerFile, StartupCrashMarkerProbe};
use crate::report::{DispatchMode, FlushReporter};
use crate::sender::{SendError, Sender, SenderFactory, has_cache_dir};
use crate::startup::ConfigLoader;
use crate::transport::{Envelope, EnvelopeTransport, FlushContext, TransportError};
use crate::worker::{BackgroundWorker, FlushHandle, FlushTask, WorkerError};

/// Builds a configuration with the given cache path and timeout.
pub fn config_with(cache_dir: &str, timeout_ms: u64) -> Config {
    Config {
        startup_crash_flush_timeout_ms: timeout_ms,
        debug: true,
        ..Config::with_cache_dir(cache_dir)
    }
}

/// Context over a transport that accepts everything.
pub fn context() -> FlushContext {
    FlushContext::new(Arc::new(RecordingTransport::default()))
}

/// Lifecycle events captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    /// No cache directory was configured.
    Disabled,
    /// The factory returned no sender.
    SenderUnavailable,
    /// The task was submitted.
    Dispatched(DispatchMode),
    /// Zero budget after a startup crash.
    SyncWaitSkipped,
    /// The bounded wait elapsed.
    SyncWaitTimedOut(Duration),
    /// The sender succeeded.
    Completed,
    /// The sender failed with the rendered error.
    Failed(String),
    /// The worker failed with the rendered error.
    WorkerFailed(String),
}

/// Records reporter events; completion events may arrive from the worker.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
    changed: Condvar,
}

impl RecordingReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<ReportEvent> {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .clone()
    }

    /// Waits until an event matching `predicate` is recorded.
    pub fn wait_for(&self, predicate: impl Fn(&ReportEvent) -> bool, timeout: Duration) -> bool {
        let guard = self.events.lock().expect("reporter mutex poisoned");
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |events| !events.iter().any(&predicate))
            .expect("reporter mutex poisoned during wait");
        guard.iter().any(predicate)
    }

    fn record(&self, event: ReportEvent) {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .push(event);
        self.changed.notify_all();
    }
}

impl FlushReporter for RecordingReporter {
    fn flush_disabled(&self) {
        self.record(ReportEvent::Disabled);
    }

    fn sender_unavailable(&self, _cache_dir: Option<&Utf8Path>) {
        self.record(ReportEvent::SenderUnavailable);
    }

    fn flush_dispatched(&self, mode: DispatchMode) {
        self.record(ReportEvent::Dispatched(mode));
    }

    fn sync_wait_skipped(&self) {
        self.record(ReportEvent::SyncWaitSkipped);
    }

    fn sync_wait_timed_out(&self, timeout: Duration) {
        self.record(ReportEvent::SyncWaitTimedOut(timeout));
    }

    fn flush_completed(&self) {
        self.record(ReportEvent::Completed);
    }

    fn flush_failed(&self, error: &SendError) {
        self.record(ReportEvent::Failed(error.to_string()));
    }

    fn worker_failed(&self, error: &WorkerError) {
        self.record(ReportEvent::WorkerFailed(error.to_string()));
    }
}

#[derive(Default)]
struct SendCounts {
    calls: usize,
    completed: usize,
}

#[derive(Default)]
struct SenderState {
    counts: Mutex<SendCounts>,
    changed: Condvar,
}

/// Sender that counts invocations, optionally sleeping and failing.
#[derive(Clone, Default)]
pub struct RecordingSender {
    state: Arc<SenderState>,
    delay: Duration,
    failure: Option<String>,
}

impl RecordingSender {
    /// Sender that takes `delay` to finish.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Sender that fails with the given message, mimicking a wrapped
    /// execution failure.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_owned()),
            ..Self::default()
        }
    }

    /// Number of times `send` was entered.
    pub fn calls(&self) -> usize {
        self.counts().calls
    }

    /// Number of times `send` returned.
    pub fn completed(&self) -> usize {
        self.counts().completed
    }

    /// Waits until `send` has returned at least `expected` times.
    pub fn wait_for_completions(&self, expected: usize, timeout: Duration) -> bool {
        let guard = self.state.counts.lock().expect("sender mutex poisoned");
        let (guard, _) = self
            .state
            .changed
            .wait_timeout_while(guard, timeout, |counts| counts.completed < expected)
            .expect("sender mutex poisoned during wait");
        guard.completed >= expected
    }

    fn counts(&self) -> std::sync::MutexGuard<'_, SendCounts> {
        self.state.counts.lock().expect("sender mutex poisoned")
    }
}

impl Sender for RecordingSender {
    fn send(&self) -> Result<(), SendError> {
        self.counts().calls += 1;
        thread::sleep(self.delay);
        self.counts().completed += 1;
        self.state.changed.notify_all();
        match &self.failure {
            Some(message) => Err(SendError::failed_with(
                message.clone(),
                io::Error::other("execution failed"),
            )),
            None => Ok(()),
        }
    }
}

/// Factory handing out clones of one recording sender.
#[derive(Clone, Default)]
pub struct RecordingSenderFactory {
    sender: Option<RecordingSender>,
    creates: Arc<Mutex<usize>>,
}

impl RecordingSenderFactory {
    /// Factory that always returns the given sender.
    pub fn returning(sender: RecordingSender) -> Self {
        Self {
            sender: Some(sender),
            ..Self::default()
        }
    }

    /// Factory that never produces a sender.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Number of `create` calls.
    pub fn creates(&self) -> usize {
        *self.creates.lock().expect("factory mutex poisoned")
    }
}

impl SenderFactory for RecordingSenderFactory {
    fn create(&self, _context: &FlushContext, config: &Config) -> Option<Box<dyn Sender>> {
        *self.creates.lock().expect("factory mutex poisoned") += 1;
        assert!(has_cache_dir(config), "create called without a cache path");
        self.sender
            .clone()
            .map(|sender| Box::new(sender) as Box<dyn Sender>)
    }
}

/// Transport that records deliveries and can reject one envelope by name.
#[derive(Default)]
pub struct RecordingTransport {
    delivered: Mutex<Vec<(String, Vec<u8>)>>,
    reject: Option<String>,
}

impl RecordingTransport {
    /// Transport rejecting the envelope with the given file name.
    pub fn rejecting(name: &str) -> Self {
        Self {
            reject: Some(name.to_owned()),
            ..Self::default()
        }
    }

    /// Envelopes accepted so far, as `(name, payload)` pairs.
    pub fn delivered(&self) -> Vec<(String, Vec<u8>)> {
        self.delivered
            .lock()
            .expect("transport mutex poisoned")
            .clone()
    }
}

impl EnvelopeTransport for RecordingTransport {
    fn send_envelope(&self, envelope: &Envelope) -> Result<(), TransportError> {
        if self.reject.as_deref() == Some(envelope.name()) {
            return Err(TransportError::new(envelope.name(), "rejected by test"));
        }
        self.delivered
            .lock()
            .expect("transport mutex poisoned")
            .push((envelope.name().to_owned(), envelope.payload().to_vec()));
        Ok(())
    }
}

/// Loader whose command line never parses.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("cacheflush"),
            OsString::from("--log-format"),
            OsString::from("pretty"),
        ];
        Config::load_from_iter(args)
    }
}

/// Worker that cannot start threads.
pub struct FailingWorker;

impl BackgroundWorker for FailingWorker {
    fn submit(&self, _task: FlushTask) -> Result<FlushHandle, WorkerError> {
        Err(WorkerError::Spawn {
            source: io::Error::other("thread limit reached"),
        })
    }
}

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    pub cache_dir: Option<String>,
    pub crash_marker: bool,
    pub timeout_ms: u64,
    pub factory: RecordingSenderFactory,
    pub sender: RecordingSender,
    pub reporter: Arc<RecordingReporter>,
    outcome: Option<FlushOutcome>,
    elapsed: Option<Duration>,
}

impl TestWorld {
    /// Builds a world with a valid cache path, no crash marker and an
    /// instantaneous sender.
    pub fn new() -> Self {
        let sender = RecordingSender::default();
        Self {
            cache_dir: Some(String::from("abc")),
            crash_marker: false,
            timeout_ms: 5_000,
            factory: RecordingSenderFactory::returning(sender.clone()),
            sender,
            reporter: Arc::new(RecordingReporter::default()),
            outcome: None,
            elapsed: None,
        }
    }

    /// Replaces the sender handed out by the factory.
    pub fn use_sender(&mut self, sender: RecordingSender) {
        self.factory = RecordingSenderFactory::returning(sender.clone());
        self.sender = sender;
    }

    /// Makes the factory decline to build a sender.
    pub fn use_unavailable_factory(&mut self) {
        self.factory = RecordingSenderFactory::unavailable();
    }

    /// Runs `register` once, timing how long the caller was held.
    pub fn register(&mut self) {
        let config = Config {
            cache_dir_path: self.cache_dir.as_deref().map(Utf8PathBuf::from),
            startup_crash_flush_timeout_ms: self.timeout_ms,
            ..Config::default()
        };
        let coordinator = FlushCoordinator::new(
            self.factory.clone(),
            StartupCrashMarkerProbe::fixed(self.crash_marker),
            self.reporter.clone(),
        );
        let started = Instant::now();
        self.outcome = Some(coordinator.register(&context(), &config));
        self.elapsed = Some(started.elapsed());
    }

    /// Outcome of the last registration.
    pub fn outcome(&self) -> Option<FlushOutcome> {
        self.outcome
    }

    /// How long the last registration blocked its caller.
    pub fn elapsed(&self) -> Duration {
        self.elapsed.expect("register has not run")
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Temporary cache directory with helpers for seeding envelopes.
pub struct TempCache {
    _dir: TempDir,
    path: Utf8PathBuf,
}

impl TempCache {
    /// Creates an empty cache directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create cache dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .expect("temporary path should be UTF-8");
        Self { _dir: dir, path }
    }

    /// Path of the cache directory.
    pub fn path(&self) -> &Utf8Path {
        self.path.as_path()
    }

    /// Writes an envelope file with the given stem.
    pub fn seed_envelope(&self, stem: &str, payload: &str) {
        let file = self.path.join(format!("{stem}.envelope"));
        std::fs::write(file.as_std_path(), payload).expect("seed envelope");
    }

    /// Writes the startup crash marker.
    pub fn mark_startup_crash(&self) {
        StartupCrashMarkerFile::in_cache_dir(&self.path)
            .write()
            .expect("write startup crash marker");
    }

    /// Number of envelope files still cached.
    pub fn remaining_envelopes(&self) -> usize {
        self.path
            .read_dir_utf8()
            .expect("read cache dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension() == Some("envelope"))
            .count()
    }
}

impl Default for TempCache {
    fn default() -> Self {
        Self::new()
    }
}
