//! Startup wiring for the cached envelope flush.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use cacheflush_config::Config;

use crate::cache::CacheDirSenderFactory;
use crate::coordinator::{FlushCoordinator, FlushOutcome};
use crate::marker::{StartupCrashMarkerFile, StartupCrashMarkerProbe};
use crate::report::FlushReporter;
use crate::telemetry::{self, TelemetryError};
use crate::transport::{EnvelopeTransport, FlushContext};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the flush configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration resolved by the host application.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Failures that happen before the coordinator runs. The flush itself never
/// fails.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

/// Loads configuration, initialises telemetry and flushes the envelope cache.
pub fn flush_on_startup(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn FlushReporter>,
    transport: Arc<dyn EnvelopeTransport>,
) -> Result<FlushOutcome, StartupError> {
    let config = loader
        .load()
        .map_err(|source| StartupError::Configuration { source })?;
    telemetry::initialise(&config).map_err(|source| StartupError::Telemetry { source })?;
    Ok(flush_with_config(&config, reporter, transport))
}

/// Flushes the configured envelope cache through `transport`.
///
/// The startup crash marker is read from, and consumed in, the same cache
/// directory.
pub fn flush_with_config(
    config: &Config,
    reporter: Arc<dyn FlushReporter>,
    transport: Arc<dyn EnvelopeTransport>,
) -> FlushOutcome {
    let probe = match config.cache_dir_path() {
        Some(cache_dir) => StartupCrashMarkerProbe::from_marker_file(
            StartupCrashMarkerFile::in_cache_dir(cache_dir),
        ),
        None => StartupCrashMarkerProbe::fixed(false),
    };
    let coordinator = FlushCoordinator::new(CacheDirSenderFactory::new(), probe, reporter);
    coordinator.register(&FlushContext::new(transport), config)
}
