//! Integration tests for the render worker.
//!
//! Tests marked ignored need ffmpeg and ffprobe on PATH.
//! Run with: `cargo test --test integration -- --ignored`

pub mod executor_tests;
pub mod render_tests;
