//! Startup crash detection.
//!
//! A crash handler drops a marker file into the cache directory when the
//! process dies before startup completes. The next run consumes the marker
//! once and memoises the answer, so later reads from any thread see the same
//! value without touching the filesystem again.

use std::fmt;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use cacheflush_config::STARTUP_CRASH_MARKER_FILE;

use crate::CACHE_TARGET;

/// Memoised answer to "did the previous run crash during startup?".
///
/// The evaluation closure runs at most once, on whichever thread asks first.
pub struct StartupCrashMarkerProbe {
    value: OnceCell<bool>,
    evaluate: Box<dyn Fn() -> bool + Send + Sync>,
}

impl StartupCrashMarkerProbe {
    /// Builds a probe around a lazily evaluated check.
    pub fn new(evaluate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            value: OnceCell::new(),
            evaluate: Box::new(evaluate),
        }
    }

    /// Builds a probe with a known answer.
    #[must_use]
    pub fn fixed(value: bool) -> Self {
        Self {
            value: OnceCell::with_value(value),
            evaluate: Box::new(move || value),
        }
    }

    /// Builds a probe that consumes the marker file on first evaluation.
    #[must_use]
    pub fn from_marker_file(marker: StartupCrashMarkerFile) -> Self {
        Self::new(move || marker.consume())
    }

    /// Returns the memoised answer, evaluating it on first use.
    pub fn has_startup_crash_marker(&self) -> bool {
        *self.value.get_or_init(|| (self.evaluate)())
    }

    /// Returns `true` once the answer has been computed.
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.value.get().is_some()
    }
}

impl fmt::Debug for StartupCrashMarkerProbe {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StartupCrashMarkerProbe")
            .field("value", &self.value.get())
            .finish_non_exhaustive()
    }
}

/// Marker file recording that a run crashed during startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupCrashMarkerFile {
    path: Utf8PathBuf,
}

impl StartupCrashMarkerFile {
    /// Locates the marker inside the given cache directory.
    #[must_use]
    pub fn in_cache_dir(cache_dir: &Utf8Path) -> Self {
        Self {
            path: cache_dir.join(STARTUP_CRASH_MARKER_FILE),
        }
    }

    /// Path of the marker file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        self.path.as_path()
    }

    /// Returns `true` when the marker currently exists.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.path.is_file()
    }

    /// Writes the marker. Called by crash handlers during startup.
    pub fn write(&self) -> io::Result<()> {
        fs::write(self.path.as_std_path(), b"")
    }

    /// Checks for the marker and removes it.
    ///
    /// Returns `true` when the marker was present, even if removing it failed;
    /// a stale marker only costs the next run one bounded wait.
    pub fn consume(&self) -> bool {
        if !self.is_present() {
            return false;
        }

        match fs::remove_file(self.path.as_std_path()) {
            Ok(()) => debug!(
                target: CACHE_TARGET,
                marker = %self.path,
                "startup crash marker consumed"
            ),
            Err(error) => warn!(
                target: CACHE_TARGET,
                marker = %self.path,
                error = %error,
                "failed to remove startup crash marker"
            ),
        }
        true
    }
}
