//! Segment planning and rendering.
//!
//! A segment is one still image rendered with one motion preset into a
//! silent clip. Output paths are derived from the segment's parameters, so a
//! re-run of a partially completed job skips everything already on disk.

use futures::future::join_all;
use reel_models::{EncodingConfig, ResolutionClass};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{finalize_output, partial_path};
use crate::metrics;
use crate::motion::{MotionPlan, MotionSet};

/// Shortest clip the renderer will encode.
pub const MIN_SEGMENT_DURATION: f64 = 0.5;

/// One motion-rendered clip.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub image: PathBuf,
    pub motion_index: usize,
    pub duration_sec: f64,
    pub resolution: ResolutionClass,
    pub fps: u32,
    pub output: PathBuf,
}

impl Segment {
    /// Create a segment whose output lives in `dir` under a name derived
    /// from its parameters.
    pub fn new(
        image: impl Into<PathBuf>,
        motion_index: usize,
        duration_sec: f64,
        resolution: ResolutionClass,
        fps: u32,
        dir: &Path,
    ) -> Self {
        let mut segment = Self {
            image: image.into(),
            motion_index,
            duration_sec: duration_sec.max(MIN_SEGMENT_DURATION),
            resolution,
            fps,
            output: PathBuf::new(),
        };
        segment.output = dir.join(format!("seg_{}.mp4", segment.content_key()));
        segment
    }

    /// Use an explicit output path instead of the derived one.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Stable key over everything that affects the rendered pixels.
    pub fn content_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.image.to_string_lossy().as_bytes());
        hasher.update(self.motion_index.to_le_bytes());
        hasher.update(format!("{:.3}", self.duration_sec).as_bytes());
        hasher.update(self.resolution.as_str().as_bytes());
        hasher.update(self.fps.to_le_bytes());
        let digest = hasher.finalize();
        format!("{:x}", digest)[..16].to_string()
    }
}

/// Whether the renderer did any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered,
    Skipped,
}

/// Per-segment durations so the crossfaded track exactly covers `audio_sec`.
///
/// Consecutive segments overlap by `crossfade_sec`, so each one after the
/// first advances the timeline by `segment_sec - crossfade_sec`. A trailing
/// segment shorter than `min_segment_sec` is folded into its predecessor.
pub fn plan_segments(
    audio_sec: f64,
    segment_sec: f64,
    crossfade_sec: f64,
    min_segment_sec: f64,
) -> MediaResult<Vec<f64>> {
    if audio_sec <= 0.0 {
        return Err(MediaError::invalid_input("audio duration must be positive"));
    }
    if segment_sec <= 0.0 {
        return Err(MediaError::invalid_input("segment duration must be positive"));
    }
    let crossfade = crossfade_sec.max(0.0);
    if crossfade >= segment_sec {
        return Err(MediaError::invalid_input(format!(
            "crossfade {:.2}s must be shorter than segment {:.2}s",
            crossfade, segment_sec
        )));
    }

    if audio_sec <= segment_sec {
        return Ok(vec![audio_sec]);
    }

    let step = segment_sec - crossfade;
    let count = ((audio_sec - segment_sec) / step).ceil() as usize + 1;
    let last = audio_sec - (count - 1) as f64 * step;

    let mut durations = vec![segment_sec; count];
    durations[count - 1] = last;
    if last < min_segment_sec.max(crossfade) && count > 1 {
        durations.pop();
        // The dropped segment contributed `last - crossfade` of new time
        if let Some(prev) = durations.last_mut() {
            *prev += last - crossfade;
        }
    }

    Ok(durations)
}

/// Renders segments through FFmpeg.
#[derive(Debug, Clone)]
pub struct SegmentRenderer {
    runner: FfmpegRunner,
    motions: MotionSet,
    encoding: EncodingConfig,
}

impl SegmentRenderer {
    pub fn new(runner: FfmpegRunner, motions: MotionSet, encoding: EncodingConfig) -> Self {
        Self {
            runner,
            motions,
            encoding,
        }
    }

    pub fn motions(&self) -> &MotionSet {
        &self.motions
    }

    /// Motion parameters for a segment.
    pub fn plan(&self, segment: &Segment) -> MotionPlan {
        self.motions.plan(
            segment.motion_index,
            segment.duration_sec.max(MIN_SEGMENT_DURATION),
            segment.fps,
            segment.resolution,
        )
    }

    /// Render one segment, or skip it if its output already exists.
    pub async fn render(&self, segment: &Segment) -> MediaResult<RenderOutcome> {
        if segment.output.exists() {
            debug!("Segment exists, skipping: {}", segment.output.display());
            metrics::record_segment(true);
            return Ok(RenderOutcome::Skipped);
        }

        if !segment.image.exists() {
            return Err(MediaError::FileNotFound(segment.image.clone()));
        }

        let plan = self.plan(segment);
        let partial = partial_path(&segment.output);

        let cmd = FfmpegCommand::new(&segment.image, &partial)
            .video_filter(plan.filter_chain())
            .output_args(["-frames:v".to_string(), plan.frames.to_string()])
            .output_arg("-an")
            .output_args(self.encoding.video_args());

        debug!(
            motion = plan.motion.name,
            frames = plan.frames,
            "Rendering segment {}",
            segment.output.display()
        );

        let result = self.runner.run(&cmd).await;
        finalize_output(result, &partial, &segment.output).await?;
        metrics::record_segment(false);
        Ok(RenderOutcome::Rendered)
    }

    /// Render segments with at most `parallelism` encoders running at once.
    ///
    /// Returns the output paths in input order. The first failure fails the
    /// whole batch. Finished segments are left in place; whether a later run
    /// can reuse them depends on who owns their directory. `Assembler` keeps
    /// them in a job workspace that is removed when the job fails.
    pub async fn render_all(
        &self,
        segments: &[Segment],
        parallelism: usize,
    ) -> MediaResult<Vec<PathBuf>> {
        if segments.is_empty() {
            return Err(MediaError::invalid_input("no segments to render"));
        }

        let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
        let total = segments.len();

        let futures = segments.iter().enumerate().map(|(idx, segment)| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| MediaError::internal("render semaphore closed"))?;
                let outcome = self.render(segment).await?;
                debug!("[{}/{}] segment {:?}", idx + 1, total, outcome);
                Ok::<_, MediaError>(outcome)
            }
        });

        let results = join_all(futures).await;

        let mut rendered = 0;
        let mut skipped = 0;
        for result in results {
            match result? {
                RenderOutcome::Rendered => rendered += 1,
                RenderOutcome::Skipped => skipped += 1,
            }
        }
        info!(rendered, skipped, "Segments ready");

        Ok(segments.iter().map(|s| s.output.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn total(durations: &[f64], crossfade: f64) -> f64 {
        durations.iter().sum::<f64>() - (durations.len() as f64 - 1.0) * crossfade
    }

    #[test]
    fn test_plan_covers_audio_exactly() {
        for &(audio, seg, xf) in &[(60.0, 8.0, 0.5), (61.3, 4.0, 0.3), (300.0, 120.0, 0.0)] {
            let durations = plan_segments(audio, seg, xf, 1.0).unwrap();
            assert!((total(&durations, xf) - audio).abs() < 1e-9, "{}", audio);
            assert!(durations.iter().all(|&d| d >= 1.0 && d <= seg + seg));
        }
    }

    #[test]
    fn test_plan_short_audio_is_one_segment() {
        assert_eq!(plan_segments(3.0, 8.0, 0.5, 1.0).unwrap(), vec![3.0]);
    }

    #[test]
    fn test_plan_folds_tiny_tail() {
        // A 0.6s tail is folded into the previous segment
        let durations = plan_segments(15.6, 8.0, 0.5, 1.0).unwrap();
        assert_eq!(durations.len(), 2);
        assert!((durations[1] - 8.1).abs() < 1e-9);
        assert!((total(&durations, 0.5) - 15.6).abs() < 1e-9);
    }

    #[test]
    fn test_plan_rejects_bad_input() {
        assert!(plan_segments(0.0, 8.0, 0.5, 1.0).unwrap_err().is_input_error());
        assert!(plan_segments(10.0, 0.5, 0.5, 0.1).is_err());
    }

    #[test]
    fn test_duration_is_clamped() {
        let seg = Segment::new("a.png", 0, 0.1, ResolutionClass::Hd1080, 30, Path::new("/tmp"));
        assert_eq!(seg.duration_sec, MIN_SEGMENT_DURATION);
    }

    #[test]
    fn test_content_key_changes_with_parameters() {
        let dir = Path::new("/work");
        let a = Segment::new("a.png", 0, 8.0, ResolutionClass::Hd1080, 30, dir);
        let b = Segment::new("a.png", 1, 8.0, ResolutionClass::Hd1080, 30, dir);
        let c = Segment::new("a.png", 0, 8.0, ResolutionClass::Hd1080, 30, dir);
        assert_ne!(a.output, b.output);
        assert_eq!(a.output, c.output);
        assert!(a.output.starts_with(dir));
    }

    #[tokio::test]
    async fn test_existing_output_is_skipped_without_ffmpeg() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("seg.mp4");
        tokio::fs::write(&output, b"already rendered").await.unwrap();

        // The image does not exist: any attempt to run FFmpeg would fail
        let segment = Segment::new(
            dir.path().join("missing.png"),
            3,
            4.0,
            ResolutionClass::Hd1080,
            30,
            dir.path(),
        )
        .with_output(&output);

        let renderer = SegmentRenderer::new(
            FfmpegRunner::new(),
            MotionSet::landscape(),
            EncodingConfig::default(),
        );
        let outcome = renderer.render(&segment).await.unwrap();
        assert_eq!(outcome, RenderOutcome::Skipped);
        assert_eq!(tokio::fs::read(&output).await.unwrap(), b"already rendered");
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_finished_segments() {
        let dir = TempDir::new().unwrap();
        let done = Segment::new(dir.path().join("a.png"), 0, 4.0, ResolutionClass::Hd1080, 30, dir.path());
        tokio::fs::write(&done.output, b"rendered earlier").await.unwrap();
        let broken = Segment::new(dir.path().join("b.png"), 1, 4.0, ResolutionClass::Hd1080, 30, dir.path());

        let renderer = SegmentRenderer::new(
            FfmpegRunner::new(),
            MotionSet::landscape(),
            EncodingConfig::default(),
        );
        let err = renderer
            .render_all(&[done.clone(), broken.clone()], 2)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(done.output.exists());
        assert!(!broken.output.exists());
    }

    #[tokio::test]
    async fn test_missing_image_fails_before_encoding() {
        let dir = TempDir::new().unwrap();
        let segment = Segment::new(
            dir.path().join("missing.png"),
            0,
            4.0,
            ResolutionClass::Hd1080,
            30,
            dir.path(),
        );
        let renderer = SegmentRenderer::new(
            FfmpegRunner::new(),
            MotionSet::landscape(),
            EncodingConfig::default(),
        );
        let err = renderer.render(&segment).await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(!segment.output.exists());
    }
}
