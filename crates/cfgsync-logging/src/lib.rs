//! Structured logging for cfgsync
//!
//! Console output (JSONL or human-readable) plus optional rotated JSONL
//! files, with the device/vault term attached to every span.
//!
//! # Quick Start
//!
//! ```ignore
//! use cfgsync_logging::{CfgSyncSubscriberBuilder, LogConfig, RotationStrategy};
//!
//! // JSONL to console
//! let _guard = CfgSyncSubscriberBuilder::new().init();
//!
//! // Pretty output at debug, plus daily JSONL files
//! let _guard = CfgSyncSubscriberBuilder::new()
//!     .with_config(
//!         LogConfig::default()
//!             .with_verbosity(1)
//!             .pretty()
//!             .with_log_dir(".cfgsync/logs", RotationStrategy::Daily),
//!     )
//!     .init();
//! ```
//!
//! # Device Context
//!
//! ```ignore
//! use cfgsync_logging::DeviceContextGuard;
//!
//! let _guard = DeviceContextGuard::new("laptop");
//! // Spans opened in this scope carry term = "laptop"
//! tracing::info_span!("scan").in_scope(|| tracing::info!("Scanning customizations..."));
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleFormat, FileConfig, LogConfig, RotationStrategy};
pub use context::{DeviceContextData, DeviceContextGuard};
pub use layers::{DeviceContextExtension, DeviceContextLayer};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors setting up logging
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("log file appender error: {0}")]
    Appender(#[from] InitError),

    #[error("a global subscriber is already set: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Builder for configuring and initializing the logging subscriber
///
/// By default console output uses JSONL. Use [`LogConfig::pretty`] for
/// human-readable output.
pub struct CfgSyncSubscriberBuilder {
    config: LogConfig,
}

impl CfgSyncSubscriberBuilder {
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the level used when `RUST_LOG` is unset
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// The returned guard flushes file output when dropped; keep it alive
    /// for the duration of the program.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.level));
        let location = self.config.include_location;

        let console = match self.config.console {
            ConsoleFormat::Off => None,
            ConsoleFormat::Pretty => Some(
                fmt::layer()
                    .with_ansi(self.config.ansi)
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .boxed(),
            ),
            ConsoleFormat::Jsonl => Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .flatten_event(true)
                    .with_file(location)
                    .with_line_number(location)
                    .with_writer(std::io::stderr)
                    .boxed(),
            ),
        };

        let (file, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = file_writer(file_config)?;
                let layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .flatten_event(true)
                    .with_file(location)
                    .with_line_number(location)
                    .with_writer(writer)
                    .boxed();
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        Registry::default()
            .with(env_filter)
            .with(DeviceContextLayer::new())
            .with(console)
            .with(file)
            .try_init()?;
        Ok(guard)
    }

    /// Install the subscriber globally, reporting failure on stderr
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {e}");
                None
            }
        }
    }
}

impl Default for CfgSyncSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking writer for the configured file output
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory)?;
    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let file = File::create(config.directory.join(format!("{}.log", config.prefix)))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("jsonl");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder.build(&config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}
