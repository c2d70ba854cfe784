//! Job identifiers and the tri-state outcome reported to callers.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of every top-level operation: success, output size and duration.
///
/// A failed job always reports zero size and duration; the output path is
/// never left holding a partial file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobOutcome {
    pub success: bool,
    pub size_bytes: u64,
    pub duration_sec: f64,
    /// Failure description, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl JobOutcome {
    pub fn succeeded(size_bytes: u64, duration_sec: f64) -> Self {
        Self {
            success: true,
            size_bytes,
            duration_sec,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            size_bytes: 0,
            duration_sec: 0.0,
            error: Some(error.into()),
            finished_at: Utc::now(),
        }
    }

    /// Output size in mebibytes.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    /// The `(success, size, duration)` triple.
    pub fn as_tuple(&self) -> (bool, u64, f64) {
        (self.success, self.size_bytes, self.duration_sec)
    }
}
