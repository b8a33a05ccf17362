//! Shared configuration for the cached envelope flush.
//!
//! Values are layered by `ortho_config`: built-in defaults first, then an
//! optional configuration file (`--config-path` or `CACHEFLUSH_CONFIG_PATH`),
//! then `CACHEFLUSH_*` environment variables, and finally command-line flags.
//! The resolved [`Config`] is immutable once loaded; the flush coordinator
//! reads it for the duration of a single registration.

mod defaults;
mod logging;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEBUG_LOG_FILTER, DEFAULT_LOG_FILTER, DEFAULT_STARTUP_CRASH_FLUSH_TIMEOUT_MS,
    ENVELOPE_EXTENSION, STARTUP_CRASH_MARKER_FILE, default_log_filter, default_log_filter_string,
    default_log_format, default_startup_crash_flush_timeout,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved flush configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "CACHEFLUSH")]
pub struct Config {
    /// Directory holding envelopes persisted by a previous run. When unset the
    /// startup flush is disabled.
    #[serde(default)]
    pub cache_dir_path: Option<Utf8PathBuf>,
    /// Upper bound, in milliseconds, on how long startup blocks flushing a
    /// startup crash report. Zero skips the synchronous wait.
    ///
    /// Defaults to 5000 ms. Hosts sensitive to startup latency usually want a
    /// budget of a few hundred milliseconds instead.
    #[ortho_config(default = DEFAULT_STARTUP_CRASH_FLUSH_TIMEOUT_MS)]
    pub startup_crash_flush_timeout_ms: u64,
    /// Enables debug diagnostics regardless of the configured filter.
    #[serde(default)]
    pub debug: bool,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for telemetry.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir_path: None,
            startup_crash_flush_timeout_ms: DEFAULT_STARTUP_CRASH_FLUSH_TIMEOUT_MS,
            debug: false,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Builds a configuration pointing at the given cache directory, keeping
    /// every other value at its default.
    #[must_use]
    pub fn with_cache_dir(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            cache_dir_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Cache directory, when configured.
    #[must_use]
    pub fn cache_dir_path(&self) -> Option<&Utf8Path> {
        self.cache_dir_path.as_deref()
    }

    /// Synchronous flush budget used after a startup crash.
    #[must_use]
    pub fn startup_crash_flush_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_crash_flush_timeout_ms)
    }

    /// Whether debug diagnostics were requested.
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Effective log filter. `debug` overrides the configured expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        if self.debug {
            DEBUG_LOG_FILTER
        } else {
            self.log_filter.as_str()
        }
    }

    /// Configured telemetry output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
