//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid manifest {}: {message}", path.display())]
    InvalidManifest { path: PathBuf, message: String },

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_manifest(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the job was rejected before any media work started.
    pub fn is_rejected(&self) -> bool {
        match self {
            WorkerError::InvalidManifest { .. }
            | WorkerError::InvalidJob(_)
            | WorkerError::ConfigError(_) => true,
            WorkerError::Media(e) => e.is_input_error(),
            _ => false,
        }
    }
}
