//! Application-wide error types using thiserror.

use ny511_common::DashError;
use std::path::PathBuf;

/// Main application error type.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Configuration, validation or pipeline error.
    #[error(transparent)]
    Dash(#[from] DashError),

    /// An output file could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A dataset could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Some views could not be loaded. Everything else was still written.
    #[error("{failed} of 3 dashboard views failed to load: {views}")]
    Incomplete { failed: usize, views: String },
}

impl AppError {
    pub fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Output {
            path: path.into(),
            source,
        }
    }
}

/// Result type for the dashboard application.
pub type AppResult<T> = Result<T, AppError>;
