//! Sender capability and the factory that produces it.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use cacheflush_config::Config;

use crate::transport::FlushContext;

/// Errors raised by a [`Sender`] while flushing cached envelopes.
#[derive(Debug, Error)]
pub enum SendError {
    /// The cache directory could not be read.
    #[error("failed to read cache directory '{path}': {source}")]
    Io {
        /// Directory or file that failed.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Some envelopes were rejected by the transport and remain cached.
    #[error("{failed} of {attempted} cached envelopes could not be sent")]
    Partial {
        /// Number of envelopes left in the cache.
        failed: usize,
        /// Number of envelopes the sender tried to deliver.
        attempted: usize,
    },
    /// The sender failed for a reason of its own.
    #[error("send failed: {message}")]
    Failed {
        /// Human-readable description.
        message: String,
        /// Optional source error reported by the sender implementation.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl SendError {
    /// Builds a [`SendError::Failed`] without an underlying source.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a [`SendError::Failed`] wrapping the implementation's error.
    #[must_use]
    pub fn failed_with(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Failed {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// Flushes everything the factory bound it to. Blocks until done.
pub trait Sender: Send {
    /// Performs the flush once.
    fn send(&self) -> Result<(), SendError>;
}

impl<F> Sender for F
where
    F: Fn() -> Result<(), SendError> + Send,
{
    fn send(&self) -> Result<(), SendError> {
        self()
    }
}

/// Validates the cache location and builds a fresh [`Sender`] per
/// registration.
pub trait SenderFactory: Send + Sync {
    /// Returns `true` when the configuration names a usable cache path.
    ///
    /// This is pure validation and does not touch the filesystem. The default
    /// accepts any non-empty cache directory path.
    fn has_valid_path(&self, config: &Config, _context: &FlushContext) -> bool {
        has_cache_dir(config)
    }

    /// Builds a sender, or `None` when no sender can be built for this
    /// configuration.
    fn create(&self, context: &FlushContext, config: &Config) -> Option<Box<dyn Sender>>;
}

/// Returns `true` when a non-empty cache directory is configured.
#[must_use]
pub fn has_cache_dir(config: &Config) -> bool {
    config
        .cache_dir_path()
        .is_some_and(|path| !path.as_str().trim().is_empty())
}
