//! Logging and tracing setup for attune.
//!
//! Every attune crate logs through `tracing`. This crate owns the one place
//! where a subscriber gets installed, so binaries and tests agree on the
//! format and filtering rules.
//!
//! `RUST_LOG` always wins over the configured level, which keeps
//! per-module debugging possible without touching config files.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines (default for terminals).
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive (e.g. `info`, `attune_core=debug`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Whether to emit ANSI colors in pretty mode.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Override the level, keeping everything else.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Override the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Build the filter, preferring `RUST_LOG` when it is set.
    pub fn env_filter(&self) -> Result<EnvFilter, ObserveError> {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return Ok(EnvFilter::from_default_env());
        }
        EnvFilter::try_new(&self.level).map_err(|e| ObserveError::InvalidFilter {
            directive: self.level.clone(),
            reason: e.to_string(),
        })
    }
}

/// Error type for logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum ObserveError {
    /// The configured level is not a valid filter directive.
    #[error("invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },

    /// A global subscriber is already installed.
    #[error("failed to set global subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global tracing subscriber described by `config`.
///
/// Logs go to stderr; stdout stays free for command output.
///
/// Fails if a subscriber has already been installed in this process.
pub fn init_logging(config: &LogConfig) -> Result<(), ObserveError> {
    let filter = config.env_filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(config.ansi)
                    .with_target(true),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()?,
    }

    tracing::debug!(level = %config.level, format = ?config.format, "Logging initialized");
    Ok(())
}
