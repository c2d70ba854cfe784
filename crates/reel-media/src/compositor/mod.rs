//! Frame-pipe compositor.
//!
//! A decoder process writes raw RGB24 frames to its stdout; frames are read
//! one at a time, drawn on, and written to an encoder process's stdin. Pipe
//! buffers provide the backpressure between the two processes. The input's
//! audio is extracted up front and remuxed onto the silent re-encode.

mod overlay;
mod pump;

pub use overlay::{
    CaptionOverlay, CaptionRasterizer, CaptionRenderer, FrameOverlay, FrameView, HookOverlay,
};
pub use pump::{pump_frames, FrameGeometry, FrameStats};

use reel_models::{CaptionPosition, CaptionSegment, CaptionStyle, EncodingConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::audio::AudioMixer;
use crate::captions::CaptionTimeline;
use crate::command::{
    check_ffmpeg, spawn_ffmpeg, wait_with_timeout, FfmpegCommand, FfmpegRunner, StderrCollector,
};
use crate::error::{exhausted, MediaError, MediaResult, StrategyFailure};
use crate::fs_utils::{finalize_output, partial_path, remove_if_exists, MIN_OUTPUT_BYTES};
use crate::metrics;
use crate::mux::{summarize, MuxSummary, Muxer};
use crate::probe::{probe_video, VideoInfo};
use crate::progress::log_every_tenth;
use crate::text::FontSet;
use crate::workspace::JobWorkspace;

/// Result of a composite pass.
#[derive(Debug, Clone, Serialize)]
pub struct CompositeReport {
    pub frames: FrameStats,
    pub size_bytes: u64,
    pub duration_sec: f64,
    /// Degraded steps that were recovered from
    pub failures: Vec<StrategyFailure>,
}

/// Burns overlays into existing videos.
#[derive(Debug, Clone)]
pub struct Compositor {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
    work_dir: PathBuf,
}

impl Compositor {
    pub fn new(runner: FfmpegRunner, encoding: EncodingConfig, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            encoding,
            work_dir: work_dir.into(),
        }
    }

    /// Burn caption segments into `input`.
    pub async fn burn_captions(
        &self,
        input: &Path,
        output: &Path,
        segments: Vec<CaptionSegment>,
        style: CaptionStyle,
        position: CaptionPosition,
        fonts: FontSet,
    ) -> MediaResult<CompositeReport> {
        let timeline = CaptionTimeline::new(segments);
        info!(
            segments = timeline.len(),
            style = %style,
            position = %position,
            "Burning captions into {}",
            input.display()
        );
        let mut overlay = CaptionOverlay::new(timeline, CaptionRenderer::new(fonts, style, position));
        self.composite(input, output, "captions", &mut overlay).await
    }

    /// Burn a headline into the first `duration_sec` of `input`.
    pub async fn burn_hook(
        &self,
        input: &Path,
        output: &Path,
        text: &str,
        duration_sec: f64,
        fonts: FontSet,
    ) -> MediaResult<CompositeReport> {
        if text.trim().is_empty() {
            return Err(MediaError::invalid_input("hook text is empty"));
        }
        let mut overlay = HookOverlay::new(fonts, text, duration_sec);
        self.composite(input, output, "hook", &mut overlay).await
    }

    /// Run `overlay` over every frame of `input` and write `output`.
    pub async fn composite<O>(
        &self,
        input: &Path,
        output: &Path,
        purpose: &str,
        overlay: &mut O,
    ) -> MediaResult<CompositeReport>
    where
        O: FrameOverlay + ?Sized,
    {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let info = probe_video(input).await?;
        let workspace = JobWorkspace::create(&self.work_dir, output, purpose).await?;
        let mut failures = Vec::new();

        let mixer = AudioMixer::new(self.runner.clone(), self.encoding.clone());
        let audio = match mixer.extract(input, workspace.path()).await? {
            Some((path, extract_failures)) => {
                failures.extend(extract_failures);
                Some(path)
            }
            None => {
                info!("{} has no audio track", input.display());
                None
            }
        };

        let silent = workspace.file("composited_silent.mp4");
        let frames = self.stream_frames(input, &silent, &info, overlay).await?;
        metrics::record_frames(frames.frames, frames.composited);

        let summary = match audio {
            Some(audio) => self.remux(&silent, &audio, output, &mut failures).await?,
            None => self.faststart_copy(&silent, output).await?,
        };
        if summary.size_bytes < MIN_OUTPUT_BYTES {
            remove_if_exists(output).await;
            return Err(MediaError::InvalidVideo(format!(
                "composited output is only {} bytes",
                summary.size_bytes
            )));
        }

        workspace.cleanup().await;
        info!(
            frames = frames.frames,
            composited = frames.composited,
            size_bytes = summary.size_bytes,
            "Composited {}",
            output.display()
        );

        Ok(CompositeReport {
            frames,
            size_bytes: summary.size_bytes,
            duration_sec: summary.duration_sec,
            failures,
        })
    }

    /// Decode `input`, pump frames through `overlay`, encode to `silent`.
    async fn stream_frames<O>(
        &self,
        input: &Path,
        silent: &Path,
        info: &VideoInfo,
        overlay: &mut O,
    ) -> MediaResult<FrameStats>
    where
        O: FrameOverlay + ?Sized,
    {
        check_ffmpeg()?;
        let geometry = FrameGeometry::new(info.width, info.height, info.fps);

        let decode = FfmpegCommand::new(input, "-")
            .without_progress()
            .output_args(["-an", "-f", "rawvideo", "-pix_fmt", "rgb24"]);
        let encode = FfmpegCommand::with_output(silent)
            .input_with_args(["-f", "rawvideo", "-pix_fmt", "rgb24"], "-")
            .input_arg("-s")
            .input_arg(format!("{}x{}", info.width, info.height))
            .input_arg("-r")
            .input_arg(format!("{:.6}", info.fps))
            .output_arg("-an")
            .output_args(self.encoding.video_args());

        let started = Instant::now();
        let mut decoder = spawn_ffmpeg(&decode.build_args(), Stdio::null(), Stdio::piped())?;
        let mut encoder = spawn_ffmpeg(&encode.build_args(), Stdio::piped(), Stdio::null())?;

        let (Some(mut frames_in), Some(decoder_err)) = (decoder.stdout.take(), decoder.stderr.take())
        else {
            return Err(MediaError::internal("decoder pipes not captured"));
        };
        let (Some(mut frames_out), Some(encoder_err)) = (encoder.stdin.take(), encoder.stderr.take())
        else {
            return Err(MediaError::internal("encoder pipes not captured"));
        };
        let decoder_diag = StderrCollector::spawn(decoder_err, |_| {});
        let encoder_diag =
            StderrCollector::spawn(encoder_err, log_every_tenth("composite", info.duration));

        let pump = pump_frames(&mut frames_in, &mut frames_out, geometry, overlay);
        let pumped = match self.runner.timeout() {
            Some(limit) => match tokio::time::timeout(limit, pump).await {
                Ok(result) => result,
                Err(_) => Err(MediaError::Timeout(limit.as_secs())),
            },
            None => pump.await,
        };
        drop(frames_in);
        drop(frames_out);

        let stats = match pumped {
            Ok(stats) => stats,
            Err(e) => {
                let _ = decoder.start_kill();
                let _ = encoder.start_kill();
                let _ = decoder.wait().await;
                let _ = encoder.wait().await;
                let tail = encoder_diag.finish().await;
                decoder_diag.finish().await;
                error!(error = %e, stderr = %tail, "Frame pipe aborted");
                return Err(e);
            }
        };

        let encoder_code = wait_with_timeout(&mut encoder, self.runner.timeout()).await;
        let decoder_code = wait_with_timeout(&mut decoder, self.runner.timeout()).await;
        let encoder_tail = encoder_diag.finish().await;
        let decoder_tail = decoder_diag.finish().await;
        metrics::record_ffmpeg_duration(started.elapsed().as_secs_f64());

        match decoder_code? {
            Some(0) => {}
            code => {
                warn!(exit_code = ?code, stderr = %decoder_tail, "Decoder failed");
                return Err(MediaError::ffmpeg_failed(
                    "decoder exited with non-zero status",
                    Some(decoder_tail),
                    code,
                ));
            }
        }
        match encoder_code? {
            Some(0) => {}
            code => {
                warn!(exit_code = ?code, stderr = %encoder_tail, "Encoder failed");
                return Err(MediaError::ffmpeg_failed(
                    "encoder exited with non-zero status",
                    Some(encoder_tail),
                    code,
                ));
            }
        }

        if stats.frames == 0 {
            return Err(MediaError::InvalidVideo(format!(
                "decoder produced no frames from {}",
                input.display()
            )));
        }
        Ok(stats)
    }

    /// Attach extracted audio, copying it when the container allows.
    async fn remux(
        &self,
        silent: &Path,
        audio: &Path,
        output: &Path,
        failures: &mut Vec<StrategyFailure>,
    ) -> MediaResult<MuxSummary> {
        let muxer = Muxer::new(self.runner.clone(), self.encoding.clone());
        let copy = FfmpegCommand::with_output(partial_path(output))
            .input(silent)
            .input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .codec_copy()
            .shortest()
            .faststart();
        let encode = muxer.command(silent, audio, &partial_path(output));

        let mut attempts = Vec::new();
        for (strategy, cmd) in [("copy_audio", copy), ("encode_audio", encode)] {
            let partial = partial_path(output);
            let result = self.runner.run(&cmd).await;
            let result = match finalize_output(result, &partial, output).await {
                Ok(()) => summarize(output).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(summary) => {
                    failures.extend(attempts);
                    return Ok(summary);
                }
                Err(e) => {
                    warn!(strategy, error = %e, "Remux failed");
                    metrics::record_fallback("remux", strategy);
                    remove_if_exists(output).await;
                    attempts.push(StrategyFailure::new(strategy, e));
                }
            }
        }

        Err(exhausted("remux", &attempts))
    }

    async fn faststart_copy(&self, silent: &Path, output: &Path) -> MediaResult<MuxSummary> {
        let partial = partial_path(output);
        let cmd = FfmpegCommand::new(silent, &partial).codec_copy().faststart();
        let result = self.runner.run(&cmd).await;
        finalize_output(result, &partial, output).await?;
        summarize(output).await
    }
}
