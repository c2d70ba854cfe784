//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Calculate progress percentage given total duration in seconds.
    pub fn percentage(&self, total_duration_sec: f64) -> f64 {
        if total_duration_sec <= 0.0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / 1000.0 / total_duration_sec) * 100.0).min(100.0)
    }
}

/// Callback that logs every 10% step of a long encode.
pub fn log_every_tenth(
    label: &'static str,
    total_duration_sec: f64,
) -> impl Fn(FfmpegProgress) + Send + 'static {
    let last_step = AtomicU8::new(0);
    move |progress| {
        let step = (progress.percentage(total_duration_sec) / 10.0).floor() as u8;
        if step > last_step.fetch_max(step, Ordering::Relaxed) {
            tracing::info!(
                stage = label,
                percent = step * 10,
                speed = progress.speed,
                "Encode progress"
            );
        }
    }
}
