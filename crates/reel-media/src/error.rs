//! Error types for media operations.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Encoder pipe closed early after {frames_written} frames")]
    PipeClosed { frames_written: u64 },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Font not found (searched: {0})")]
    FontNotFound(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("All strategies failed for {operation}: {reasons}")]
    StrategiesExhausted { operation: String, reasons: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an input validation error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error was raised before any external process ran.
    pub fn is_input_error(&self) -> bool {
        matches!(self, MediaError::InvalidInput(_) | MediaError::FileNotFound(_))
    }
}

/// A fallback strategy that failed, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub reason: String,
}

impl StrategyFailure {
    pub fn new(strategy: &'static str, reason: impl ToString) -> Self {
        Self {
            strategy,
            reason: reason.to_string(),
        }
    }
}

/// Collapse failures into a single error once every strategy is exhausted.
pub(crate) fn exhausted(operation: &str, failures: &[StrategyFailure]) -> MediaError {
    let reasons = failures
        .iter()
        .map(|f| format!("{}: {}", f.strategy, f.reason))
        .collect::<Vec<_>>()
        .join("; ");
    MediaError::StrategiesExhausted {
        operation: operation.to_string(),
        reasons,
    }
}
