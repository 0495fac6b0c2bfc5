//! Error types and utilities for ny511-dash

use thiserror::Error;

/// Result type alias for dashboard operations
pub type Result<T> = std::result::Result<T, DashError>;

/// Main error type for dashboard operations
#[derive(Error, Debug)]
pub enum DashError {
    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A request against the dataset service failed, timed out, or returned rows
    /// that could not be decoded
    #[error("Remote fetch error: {message}")]
    RemoteFetch {
        message: String,
        status_code: Option<u16>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Chart rendering errors
    #[error("Chart error: {message}")]
    Chart {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors for user input or data
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Generic {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DashError {
    /// Create a new generic error with a custom message
    pub fn new(msg: impl Into<String>) -> Self {
        Self::Generic {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a new generic error with a custom message and source
    pub fn with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Generic {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a new configuration error with source
    pub fn config_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new remote fetch error
    pub fn remote_fetch(msg: impl Into<String>) -> Self {
        Self::RemoteFetch {
            message: msg.into(),
            status_code: None,
            source: None,
        }
    }

    /// Create a new remote fetch error carrying the HTTP status
    pub fn remote_fetch_with_status(msg: impl Into<String>, status: u16) -> Self {
        Self::RemoteFetch {
            message: msg.into(),
            status_code: Some(status),
            source: None,
        }
    }

    /// Create a new remote fetch error with source
    pub fn remote_fetch_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::RemoteFetch {
            message: msg.into(),
            status_code: None,
            source: Some(Box::new(source)),
        }
    }

    /// Create a new chart error
    pub fn chart(msg: impl Into<String>) -> Self {
        Self::Chart {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a new chart error with source
    pub fn chart_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Chart {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a new validation error with field name
    pub fn validation_field(msg: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Whether a failed request is worth retrying: transport failures, throttling
    /// and server-side errors are, anything else is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RemoteFetch { status_code, .. } => match status_code {
                Some(status) => *status == 429 || *status >= 500,
                None => true,
            },
            _ => false,
        }
    }

    /// Whether this error is a `RemoteFetch` failure
    pub fn is_remote_fetch(&self) -> bool {
        matches!(self, Self::RemoteFetch { .. })
    }

    /// Whether this error is a validation failure
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

// Error conversion implementations for external types

/// Convert from reqwest::Error to DashError
impl From<reqwest::Error> for DashError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::remote_fetch_with_source("Request timeout", err)
        } else if err.is_connect() {
            Self::remote_fetch_with_source("Connection failed", err)
        } else if err.is_status() {
            let status_code = err.status().map(|s| s.as_u16());
            Self::RemoteFetch {
                message: format!("HTTP error: {}", status_code.unwrap_or(0)),
                status_code,
                source: Some(Box::new(err)),
            }
        } else if err.is_decode() {
            Self::remote_fetch_with_source("Response body could not be decoded", err)
        } else {
            Self::remote_fetch_with_source("Network request failed", err)
        }
    }
}

/// Convert from toml::de::Error to DashError
impl From<toml::de::Error> for DashError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("TOML parsing error", err)
    }
}

/// Convert from serde_yaml::Error to DashError
impl From<serde_yaml::Error> for DashError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::config_with_source("YAML parsing error", err)
    }
}

#[cfg(feature = "plotters")]
/// Convert from plotters drawing errors to DashError
impl<T> From<plotters::drawing::DrawingAreaErrorKind<T>> for DashError
where
    T: std::error::Error + Send + Sync + 'static,
{
    fn from(err: plotters::drawing::DrawingAreaErrorKind<T>) -> Self {
        Self::chart_with_source("Chart rendering failed", err)
    }
}
