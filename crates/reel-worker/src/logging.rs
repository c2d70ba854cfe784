//! Structured job logging.
//!
//! Every event carries the job ID and the operation kind so a single job can
//! be followed through interleaved worker output.

use reel_models::JobId;
use tracing::{error, info, warn, Span};

/// Job-scoped logger.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a logger for `job_id` running `operation` (e.g. "broll", "captions").
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    /// Log a strategy that failed but was recovered from.
    pub fn log_fallback(&self, strategy: &str, reason: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            strategy,
            "Job fallback: {}", reason
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, size_bytes: u64, duration_sec: f64, elapsed_sec: f64) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            size_bytes,
            duration_sec,
            elapsed_sec,
            "Job completed"
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span that engine events are recorded under while the job runs.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::from_string("job-7");
        let logger = JobLogger::new(&job_id, "captions");

        assert_eq!(logger.job_id(), "job-7");
        assert_eq!(logger.operation(), "captions");
    }

    #[test]
    fn test_logging_without_subscriber() {
        let logger = JobLogger::new(&JobId::new(), "text_short");
        let _guard = logger.create_span().entered();
        logger.log_start("3 cards");
        logger.log_fallback("stream_copy", "codec mismatch");
        logger.log_completion(2048, 12.0, 4.5);
    }
}
