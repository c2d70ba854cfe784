//! Metrics recorded by the engine.
//!
//! Only the `metrics` facade is used here; installing an exporter is up to
//! the binary.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FFMPEG_DURATION_SECONDS: &str = "reel_ffmpeg_duration_seconds";
    pub const SEGMENTS_RENDERED_TOTAL: &str = "reel_segments_rendered_total";
    pub const SEGMENTS_SKIPPED_TOTAL: &str = "reel_segments_skipped_total";
    pub const CONCAT_STRATEGY_TOTAL: &str = "reel_concat_strategy_total";
    pub const STRATEGY_FALLBACKS_TOTAL: &str = "reel_strategy_fallbacks_total";
    pub const FRAMES_PROCESSED_TOTAL: &str = "reel_frames_processed_total";
    pub const FRAMES_COMPOSITED_TOTAL: &str = "reel_frames_composited_total";
}

pub fn record_ffmpeg_duration(duration_secs: f64) {
    histogram!(names::FFMPEG_DURATION_SECONDS).record(duration_secs);
}

pub fn record_segment(skipped: bool) {
    if skipped {
        counter!(names::SEGMENTS_SKIPPED_TOTAL).increment(1);
    } else {
        counter!(names::SEGMENTS_RENDERED_TOTAL).increment(1);
    }
}

/// Record which join strategy produced a track.
pub fn record_concat_strategy(strategy: &'static str) {
    counter!(names::CONCAT_STRATEGY_TOTAL, "strategy" => strategy).increment(1);
}

/// Record a degraded fallback (a strategy that failed but was recovered from).
pub fn record_fallback(operation: &'static str, strategy: &'static str) {
    counter!(
        names::STRATEGY_FALLBACKS_TOTAL,
        "operation" => operation,
        "strategy" => strategy
    )
    .increment(1);
}

pub fn record_frames(total: u64, composited: u64) {
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(total);
    counter!(names::FRAMES_COMPOSITED_TOTAL).increment(composited);
}
