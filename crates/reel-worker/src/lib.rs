//! Render worker.
//!
//! This crate provides:
//! - Environment configuration
//! - JSON job manifests for every engine operation
//! - A job executor that always reports a `JobOutcome`
//! - Job-scoped structured logging and job metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod manifest;
pub mod metrics;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobExecutor, JobReport};
pub use logging::JobLogger;
pub use manifest::{JobKind, JobManifest, TextShortSettings};
