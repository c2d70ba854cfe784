//! Time-range extraction from a longer video.

use reel_models::EncodingConfig;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{exhausted, MediaError, MediaResult, StrategyFailure};
use crate::fs_utils::{finalize_output, partial_path, remove_if_exists};
use crate::metrics;
use crate::mux::{summarize, MuxSummary};
use crate::probe::get_duration;

/// A stream copy smaller than this is treated as a failed cut.
const MIN_COPY_BYTES: u64 = 1024;

/// A stream copy must cover at least this share of the requested range.
/// Copies can only cut on keyframes, which loses the start of the range.
const MIN_COPY_COVERAGE: f64 = 0.5;

/// Start and length of the range that can actually be cut.
///
/// `end_sec` is clamped to the source length. A start within the last
/// second of the source is rejected. A zero source duration means unknown,
/// and no clamping is done.
pub fn clip_window(start_sec: f64, end_sec: f64, source_sec: f64) -> MediaResult<(f64, f64)> {
    if start_sec < 0.0 {
        return Err(MediaError::invalid_input(format!(
            "clip start {:.2}s is negative",
            start_sec
        )));
    }
    let end_sec = if source_sec > 0.0 {
        if start_sec >= source_sec - 1.0 {
            return Err(MediaError::invalid_input(format!(
                "clip start {:.2}s is at or past the end of a {:.2}s video",
                start_sec, source_sec
            )));
        }
        end_sec.min(source_sec)
    } else {
        end_sec
    };

    let duration = end_sec - start_sec;
    if duration <= 0.0 {
        return Err(MediaError::invalid_input(format!(
            "clip range {:.2}s-{:.2}s is empty",
            start_sec, end_sec
        )));
    }
    Ok((start_sec, duration))
}

#[derive(Debug, Clone, Serialize)]
pub struct ClipReport {
    pub start_sec: f64,
    pub requested_sec: f64,
    pub strategy: &'static str,
    pub size_bytes: u64,
    pub duration_sec: f64,
    pub failures: Vec<StrategyFailure>,
}

/// Cuts time ranges out of videos.
#[derive(Debug, Clone)]
pub struct ClipExtractor {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

impl ClipExtractor {
    pub fn new(runner: FfmpegRunner, encoding: EncodingConfig) -> Self {
        Self { runner, encoding }
    }

    /// Seek before the input so both strategies start decoding at the
    /// nearest keyframe rather than reading from the top.
    pub fn command(
        &self,
        input: &Path,
        start_sec: f64,
        duration_sec: f64,
        output: &Path,
        copy: bool,
    ) -> FfmpegCommand {
        let cmd = FfmpegCommand::with_output(output)
            .input_with_args(["-ss".to_string(), format!("{:.3}", start_sec)], input)
            .duration(duration_sec);
        let cmd = if copy {
            cmd.codec_copy()
        } else {
            cmd.output_args(self.encoding.video_args())
                .output_args(self.encoding.audio_args())
        };
        cmd.faststart()
    }

    /// Cut `[start_sec, end_sec)` of `input` into `output`.
    ///
    /// A stream copy is tried first. It is rejected when it fails, comes out
    /// nearly empty, or covers under half of the range; the range is then
    /// re-encoded.
    pub async fn extract(
        &self,
        input: &Path,
        start_sec: f64,
        end_sec: f64,
        output: &Path,
    ) -> MediaResult<ClipReport> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        let source_sec = get_duration(input).await?;
        let (start_sec, requested_sec) = clip_window(start_sec, end_sec, source_sec)?;
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        info!(start_sec, requested_sec, "Extracting clip from {}", input.display());

        let mut failures = Vec::new();
        for (strategy, copy) in [("stream_copy", true), ("reencode", false)] {
            let partial = partial_path(output);
            let cmd = self.command(input, start_sec, requested_sec, &partial, copy);
            let result = self.runner.run(&cmd).await;
            let attempt = match finalize_output(result, &partial, output).await {
                Ok(()) => summarize(output).await.and_then(|s| accept(s, copy, requested_sec)),
                Err(e) => Err(e),
            };

            match attempt {
                Ok(summary) => {
                    info!(strategy, size_bytes = summary.size_bytes, "Clip ready");
                    return Ok(ClipReport {
                        start_sec,
                        requested_sec,
                        strategy,
                        size_bytes: summary.size_bytes,
                        duration_sec: summary.duration_sec,
                        failures,
                    });
                }
                Err(e) => {
                    warn!(strategy, error = %e, "Clip extraction attempt failed");
                    metrics::record_fallback("extract_clip", strategy);
                    remove_if_exists(output).await;
                    failures.push(StrategyFailure::new(strategy, e));
                }
            }
        }

        Err(exhausted("extract_clip", &failures))
    }
}

/// Reject stream copies that came out empty or cut well short.
fn accept(summary: MuxSummary, copy: bool, requested_sec: f64) -> MediaResult<MuxSummary> {
    if !copy {
        return Ok(summary);
    }
    if summary.size_bytes < MIN_COPY_BYTES {
        return Err(MediaError::InvalidVideo(format!(
            "stream copy is only {} bytes",
            summary.size_bytes
        )));
    }
    if summary.duration_sec < requested_sec * MIN_COPY_COVERAGE {
        return Err(MediaError::InvalidVideo(format!(
            "stream copy covers {:.1}s of {:.1}s",
            summary.duration_sec, requested_sec
        )));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_window_clamps_end_to_source() {
        assert_eq!(clip_window(10.0, 40.0, 30.0).unwrap(), (10.0, 20.0));
        assert_eq!(clip_window(5.0, 12.5, 0.0).unwrap(), (5.0, 7.5));
    }

    #[test]
    fn test_window_rejects_empty_ranges() {
        assert!(clip_window(29.5, 40.0, 30.0).unwrap_err().is_input_error());
        assert!(clip_window(8.0, 8.0, 30.0).is_err());
        assert!(clip_window(-1.0, 4.0, 30.0).is_err());
    }

    #[test]
    fn test_short_stream_copy_is_rejected() {
        let short = MuxSummary {
            size_bytes: 50_000,
            duration_sec: 4.0,
        };
        assert!(accept(short, true, 10.0).is_err());
        assert!(accept(short, false, 10.0).is_ok());
        let tiny = MuxSummary {
            size_bytes: 300,
            duration_sec: 10.0,
        };
        assert!(accept(tiny, true, 10.0).is_err());
    }

    #[test]
    fn test_copy_command_seeks_before_input() {
        let extractor = ClipExtractor::new(FfmpegRunner::new(), EncodingConfig::for_shorts());
        let args = extractor
            .command(Path::new("talk.mp4"), 12.0, 30.0, Path::new("clip.mp4"), true)
            .build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-ss 12.000 -i talk.mp4"));
        assert!(joined.contains("-t 30.000"));
        assert!(joined.contains("-c copy"));

        let joined = extractor
            .command(Path::new("talk.mp4"), 12.0, 30.0, Path::new("clip.mp4"), false)
            .build_args()
            .join(" ");
        assert!(joined.contains("-maxrate 2500k"));
        assert!(joined.contains("-c:a aac"));
    }

    #[tokio::test]
    async fn test_missing_source_fails_before_ffmpeg() {
        let dir = TempDir::new().unwrap();
        let extractor = ClipExtractor::new(FfmpegRunner::new(), EncodingConfig::for_shorts());
        let err = extractor
            .extract(&dir.path().join("talk.mp4"), 0.0, 10.0, &dir.path().join("clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
