//! Worker metrics and the Prometheus exporter.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_TOTAL: &str = "reel_jobs_total";
    pub const JOB_DURATION_SECONDS: &str = "reel_job_duration_seconds";
}

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter on {}: {}", addr, e)))
}

/// Record a finished job.
pub fn record_job(kind: &'static str, success: bool, elapsed_sec: f64) {
    let status = if success { "succeeded" } else { "failed" };
    counter!(names::JOBS_TOTAL, "kind" => kind, "status" => status).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "kind" => kind).record(elapsed_sec);
}
