//! Structured logging infrastructure for ny511-dash

use crate::error::{DashError, Result};
use std::fs::{File, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "ny511_pipeline=debug")
    pub level: String,
    /// Whether to emit one JSON object per event
    pub json_format: bool,
    /// Whether to enable pretty formatting with colors
    pub pretty_format: bool,
    /// Optional file path for log output
    pub file_path: Option<String>,
    /// Whether to include span open/close events in the output
    pub include_spans: bool,
    /// Whether to include target module information
    pub include_targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            pretty_format: false,
            file_path: None,
            include_spans: false,
            include_targets: true,
        }
    }
}

impl LoggingConfig {
    /// Development preset: pretty output, debug level, span events.
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            pretty_format: true,
            include_spans: true,
            ..Self::default()
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn open_file(&self) -> Result<Option<Mutex<File>>> {
        match &self.file_path {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Ok(Some(Mutex::new(file)))
            }
            None => Ok(None),
        }
    }
}

/// Build the environment filter, falling back to `info` when the level string
/// does not parse.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the tracing subscriber with the given configuration.
///
/// Fails if a global subscriber is already installed or the log file cannot be opened.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(build_filter(&config.level));
    let span_events = config.span_events();
    let file = config.open_file()?;

    let installed = if config.json_format {
        let layer = fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_target(config.include_targets);
        match file {
            Some(file) => registry.with(layer.with_writer(file)).try_init(),
            None => registry.with(layer).try_init(),
        }
    } else if config.pretty_format {
        let layer = fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_target(config.include_targets);
        match file {
            Some(file) => registry
                .with(layer.with_ansi(false).with_writer(file))
                .try_init(),
            None => registry.with(layer).try_init(),
        }
    } else {
        let layer = fmt::layer()
            .compact()
            .with_span_events(span_events)
            .with_target(config.include_targets);
        match file {
            Some(file) => registry
                .with(layer.with_ansi(false).with_writer(file))
                .try_init(),
            None => registry.with(layer).try_init(),
        }
    };

    installed.map_err(|e| DashError::config_with_source("Failed to install log subscriber", e))
}

/// Initialize logging with default configuration
pub fn init_default_logging() -> Result<()> {
    init_logging(LoggingConfig::default())
}
