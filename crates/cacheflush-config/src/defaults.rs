use std::time::Duration;

/// Default budget, in milliseconds, for the synchronous flush that follows a
/// startup crash. Hosts sensitive to startup latency usually lower it.
pub const DEFAULT_STARTUP_CRASH_FLUSH_TIMEOUT_MS: u64 = 5_000;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log filter applied when debug diagnostics are requested.
pub const DEBUG_LOG_FILTER: &str = "debug";

/// File extension carried by cached envelopes awaiting delivery.
pub const ENVELOPE_EXTENSION: &str = "envelope";

/// Name of the marker file written when a run crashes during startup.
pub const STARTUP_CRASH_MARKER_FILE: &str = "startup_crash";

/// Default log filter expression.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}

/// Default synchronous flush budget as a [`Duration`].
pub fn default_startup_crash_flush_timeout() -> Duration {
    Duration::from_millis(DEFAULT_STARTUP_CRASH_FLUSH_TIMEOUT_MS)
}
