//! Sender backed by the on-disk envelope cache.
//!
//! Envelopes persisted by a previous run live as `*.envelope` files directly
//! inside the cache directory. The sender hands each one to the host's
//! transport in file-name order and removes it once accepted. Rejected
//! envelopes stay on disk for a later run; nothing is retried here.

use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use cacheflush_config::{Config, ENVELOPE_EXTENSION};

use crate::CACHE_TARGET;
use crate::sender::{SendError, Sender, SenderFactory};
use crate::transport::{Envelope, EnvelopeTransport, FlushContext};

/// Factory producing [`CachedEnvelopeSender`]s for the configured directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheDirSenderFactory;

impl CacheDirSenderFactory {
    /// Builds a new factory.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SenderFactory for CacheDirSenderFactory {
    fn create(&self, context: &FlushContext, config: &Config) -> Option<Box<dyn Sender>> {
        let cache_dir = config.cache_dir_path()?;
        if !cache_dir.is_dir() {
            debug!(
                target: CACHE_TARGET,
                cache_dir = %cache_dir,
                "cache directory does not exist; nothing to flush"
            );
            return None;
        }
        Some(Box::new(CachedEnvelopeSender::new(
            cache_dir.to_path_buf(),
            context.transport(),
        )))
    }
}

/// Sends every cached envelope in one pass.
pub struct CachedEnvelopeSender {
    cache_dir: Utf8PathBuf,
    transport: Arc<dyn EnvelopeTransport>,
}

impl CachedEnvelopeSender {
    /// Binds the cache directory to the transport that will deliver it.
    pub fn new(cache_dir: impl Into<Utf8PathBuf>, transport: Arc<dyn EnvelopeTransport>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            transport,
        }
    }

    /// Directory this sender drains.
    #[must_use]
    pub fn cache_dir(&self) -> &Utf8Path {
        self.cache_dir.as_path()
    }

    /// Lists cached envelope files in delivery order.
    pub fn pending(&self) -> Result<Vec<Utf8PathBuf>, SendError> {
        let io_error = |source| SendError::Io {
            path: self.cache_dir.clone(),
            source,
        };
        let mut envelopes = Vec::new();
        for entry in self.cache_dir.read_dir_utf8().map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let path = entry.path();
            let is_envelope = path.extension() == Some(ENVELOPE_EXTENSION);
            if is_envelope && entry.file_type().map_err(io_error)?.is_file() {
                envelopes.push(path.to_path_buf());
            }
        }
        envelopes.sort();
        Ok(envelopes)
    }

    fn deliver(&self, path: &Utf8Path) -> bool {
        let payload = match fs::read(path.as_std_path()) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(
                    target: CACHE_TARGET,
                    envelope = %path,
                    error = %error,
                    "failed to read cached envelope"
                );
                return false;
            }
        };
        let name = path.file_name().unwrap_or(path.as_str());
        let envelope = Envelope::new(name, payload);

        if let Err(error) = self.transport.send_envelope(&envelope) {
            warn!(
                target: CACHE_TARGET,
                envelope = %path,
                error = %error,
                "cached envelope rejected; keeping it for the next run"
            );
            return false;
        }

        if let Err(error) = fs::remove_file(path.as_std_path()) {
            warn!(
                target: CACHE_TARGET,
                envelope = %path,
                error = %error,
                "failed to remove delivered envelope"
            );
        }
        true
    }
}

impl Sender for CachedEnvelopeSender {
    fn send(&self) -> Result<(), SendError> {
        let pending = self.pending()?;
        let attempted = pending.len();
        let failed = pending.iter().filter(|path| !self.deliver(path)).count();

        info!(
            target: CACHE_TARGET,
            cache_dir = %self.cache_dir,
            attempted,
            delivered = attempted - failed,
            "cached envelopes flushed"
        );

        if failed == 0 {
            Ok(())
        } else {
            Err(SendError::Partial { failed, attempted })
        }
    }
}
