//! 16:9 to 9:16 crop.

use reel_models::{CropStrategy, EncodingConfig, ResolutionClass};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{exhausted, MediaError, MediaResult, StrategyFailure};
use crate::fs_utils::{finalize_output, partial_path, remove_if_exists, MIN_OUTPUT_BYTES};
use crate::metrics;
use crate::mux::summarize;

/// Horizontal offset expression of the 9:16 window.
pub fn crop_x(strategy: CropStrategy) -> &'static str {
    match strategy {
        CropStrategy::LeftThird => "0",
        CropStrategy::Center => "max((iw-ih*9/16)/2\\,0)",
        CropStrategy::RightThird => "max(iw-ih*9/16\\,0)",
    }
}

/// Crop a full-height 9:16 window and scale it to `target`.
pub fn crop_filter(strategy: CropStrategy, target: ResolutionClass) -> String {
    let (width, height) = target.dimensions();
    format!(
        "crop=ih*9/16:ih:{}:0,scale={}:{}:flags=lanczos,setsar=1",
        crop_x(strategy),
        width,
        height
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct CropReport {
    pub strategy: CropStrategy,
    pub size_bytes: u64,
    pub duration_sec: f64,
    pub failures: Vec<StrategyFailure>,
}

/// Crops landscape video to portrait.
#[derive(Debug, Clone)]
pub struct VerticalCropper {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
    target: ResolutionClass,
}

impl VerticalCropper {
    pub fn new(runner: FfmpegRunner, encoding: EncodingConfig, target: ResolutionClass) -> Self {
        Self {
            runner,
            encoding,
            target,
        }
    }

    /// Crop `input` into `output`. The audio is copied when possible.
    pub async fn crop(
        &self,
        input: &Path,
        strategy: CropStrategy,
        output: &Path,
    ) -> MediaResult<CropReport> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        if !self.target.is_vertical() {
            return Err(MediaError::invalid_input(format!(
                "crop target {} is not a vertical resolution",
                self.target
            )));
        }
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let filter = crop_filter(strategy, self.target);
        info!(strategy = %strategy, "Cropping {} to vertical", input.display());

        let mut failures = Vec::new();
        for audio_strategy in ["audio_copy", "audio_encode"] {
            let partial = partial_path(output);
            let cmd = FfmpegCommand::new(input, &partial)
                .video_filter(filter.clone())
                .output_args(self.encoding.video_args())
                .faststart();
            let cmd = if audio_strategy == "audio_copy" {
                cmd.audio_codec("copy")
            } else {
                cmd.output_args(self.encoding.audio_args())
            };

            let result = self.runner.run(&cmd).await;
            let attempt = match finalize_output(result, &partial, output).await {
                Ok(()) => summarize(output).await,
                Err(e) => Err(e),
            };
            match attempt {
                Ok(summary) if summary.size_bytes >= MIN_OUTPUT_BYTES => {
                    info!(size_bytes = summary.size_bytes, "Vertical crop ready");
                    return Ok(CropReport {
                        strategy,
                        size_bytes: summary.size_bytes,
                        duration_sec: summary.duration_sec,
                        failures,
                    });
                }
                Ok(summary) => {
                    // Nothing to fall back to for an empty encode
                    remove_if_exists(output).await;
                    return Err(MediaError::InvalidVideo(format!(
                        "vertical crop output is only {} bytes",
                        summary.size_bytes
                    )));
                }
                Err(e) => {
                    warn!(strategy = audio_strategy, error = %e, "Vertical crop attempt failed");
                    metrics::record_fallback("crop_vertical", audio_strategy);
                    remove_if_exists(output).await;
                    failures.push(StrategyFailure::new(audio_strategy, e));
                }
            }
        }

        Err(exhausted("crop_vertical", &failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_crop_filters() {
        assert_eq!(
            crop_filter(CropStrategy::Center, ResolutionClass::Vertical1080),
            "crop=ih*9/16:ih:max((iw-ih*9/16)/2\\,0):0,scale=1080:1920:flags=lanczos,setsar=1"
        );
        assert!(crop_filter(CropStrategy::LeftThird, ResolutionClass::Vertical1080)
            .starts_with("crop=ih*9/16:ih:0:0,"));
        assert!(crop_filter(CropStrategy::RightThird, ResolutionClass::Vertical4k)
            .ends_with("scale=2160:3840:flags=lanczos,setsar=1"));
    }

    #[tokio::test]
    async fn test_missing_input_fails_before_ffmpeg() {
        let dir = TempDir::new().unwrap();
        let cropper = VerticalCropper::new(
            FfmpegRunner::new(),
            EncodingConfig::for_shorts(),
            ResolutionClass::Vertical1080,
        );
        let err = cropper
            .crop(&dir.path().join("in.mp4"), CropStrategy::Center, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn test_landscape_target_is_rejected() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"x").unwrap();
        let cropper =
            VerticalCropper::new(FfmpegRunner::new(), EncodingConfig::for_shorts(), ResolutionClass::Hd1080);
        let err = cropper
            .crop(&input, CropStrategy::Center, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }
}
