//! Base-video assembly: stills to motion segments to a joined, voiced video.

use reel_models::{EncodingConfig, RenderConfig};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::audio::{AudioMixer, BedLevels};
use crate::command::FfmpegRunner;
use crate::concat::{ConcatReport, Concatenator};
use crate::error::{MediaError, MediaResult, StrategyFailure};
use crate::fs_utils::{move_file, remove_if_exists, MIN_OUTPUT_BYTES};
use crate::motion::MotionSet;
use crate::mux::{summarize, MuxSummary, Muxer};
use crate::probe::get_duration;
use crate::segment::{plan_segments, Segment, SegmentRenderer, MIN_SEGMENT_DURATION};
use crate::workspace::JobWorkspace;

/// What an assembly produced.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyReport {
    pub size_bytes: u64,
    pub duration_sec: f64,
    pub segments: usize,
    pub join_strategy: &'static str,
    pub batches: usize,
    pub failures: Vec<StrategyFailure>,
}

impl AssemblyReport {
    fn new(summary: MuxSummary, segments: usize, concat: ConcatReport) -> Self {
        Self {
            size_bytes: summary.size_bytes,
            duration_sec: summary.duration_sec,
            segments,
            join_strategy: concat.strategy.as_str(),
            batches: concat.batches,
            failures: concat.failures,
        }
    }
}

/// Lay segments over the timeline, cycling images and motions.
pub fn plan_timeline(
    images: &[PathBuf],
    durations: &[f64],
    motions: &MotionSet,
    config: &RenderConfig,
    dir: &Path,
) -> Vec<Segment> {
    durations
        .iter()
        .enumerate()
        .map(|(i, &duration)| {
            Segment::new(
                images[i % images.len()].clone(),
                i % motions.len(),
                duration,
                config.resolution_class,
                config.fps,
                dir,
            )
        })
        .collect()
}

/// Segments with distinct outputs, in first-use order.
fn unique_segments(segments: &[Segment]) -> Vec<Segment> {
    let mut seen = HashSet::new();
    segments
        .iter()
        .filter(|s| seen.insert(s.output.clone()))
        .cloned()
        .collect()
}

/// Assembles image sets into finished videos.
#[derive(Debug, Clone)]
pub struct Assembler {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
    config: RenderConfig,
    work_dir: PathBuf,
    parallelism: usize,
}

impl Assembler {
    pub fn new(
        runner: FfmpegRunner,
        encoding: EncodingConfig,
        config: RenderConfig,
        work_dir: impl Into<PathBuf>,
        parallelism: usize,
    ) -> Self {
        Self {
            runner,
            encoding,
            config,
            work_dir: work_dir.into(),
            parallelism: parallelism.max(1),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Cover the voice track with motion segments and mux it on.
    ///
    /// Used for both landscape and vertical videos; the resolution class and
    /// motion set come from the render config.
    pub async fn assemble(
        &self,
        audio: &Path,
        images: &[PathBuf],
        output: &Path,
    ) -> MediaResult<AssemblyReport> {
        validate_images(images)?;
        let audio_duration = audio_duration(audio).await?;

        let durations = plan_segments(
            audio_duration,
            self.config.segment_duration_sec,
            self.config.crossfade_sec,
            MIN_SEGMENT_DURATION,
        )?;
        info!(
            audio_sec = audio_duration,
            segments = durations.len(),
            images = images.len(),
            resolution = %self.config.resolution_class,
            "Assembling video"
        );

        let workspace = JobWorkspace::create(&self.work_dir, output, "segments").await?;
        let (visual, segments, concat) = self.build_visual(images, &durations, &workspace).await?;

        let muxer = Muxer::new(self.runner.clone(), self.encoding.clone());
        let summary = muxer.mux(&visual, audio, output).await?;
        check_size(output, &summary).await?;
        workspace.cleanup().await;

        Ok(AssemblyReport::new(summary, segments, concat))
    }

    /// Long-form ambient video: the visual runs for `target_sec` and the
    /// audio bed is looped to match it.
    pub async fn assemble_ambient(
        &self,
        audio: &Path,
        images: &[PathBuf],
        target_sec: f64,
        output: &Path,
    ) -> MediaResult<AssemblyReport> {
        validate_images(images)?;
        if target_sec <= 0.0 {
            return Err(MediaError::invalid_input("ambient duration must be positive"));
        }
        audio_duration(audio).await?;

        let durations = plan_segments(
            target_sec,
            self.config.segment_duration_sec,
            self.config.crossfade_sec,
            MIN_SEGMENT_DURATION,
        )?;
        info!(
            target_sec,
            segments = durations.len(),
            "Assembling ambient video"
        );

        let workspace = JobWorkspace::create(&self.work_dir, output, "ambient").await?;
        let (visual, segments, concat) = self.build_visual(images, &durations, &workspace).await?;

        let visual_sec = get_duration(&visual).await?;
        let bed = workspace.file("ambient_bed.m4a");
        AudioMixer::new(self.runner.clone(), self.encoding.clone())
            .loop_to_duration(audio, visual_sec, &bed)
            .await?;

        let muxer = Muxer::new(self.runner.clone(), self.encoding.clone());
        let summary = muxer.mux(&visual, &bed, output).await?;
        check_size(output, &summary).await?;
        workspace.cleanup().await;

        Ok(AssemblyReport::new(summary, segments, concat))
    }

    /// Art slideshow: one long segment per image, each shown for
    /// `seconds_per_image`, with optional music looped quietly underneath.
    ///
    /// Without music the joined visual is the output. A music path that does
    /// not exist is skipped and reported as a failure.
    pub async fn assemble_slideshow(
        &self,
        images: &[PathBuf],
        seconds_per_image: f64,
        music: Option<(&Path, BedLevels)>,
        output: &Path,
    ) -> MediaResult<AssemblyReport> {
        validate_images(images)?;
        if seconds_per_image <= 0.0 {
            return Err(MediaError::invalid_input("seconds per image must be positive"));
        }

        let mut failures = Vec::new();
        let music = match music {
            Some((path, _)) if !path.exists() => {
                warn!(music = %path.display(), "Music bed not found, rendering without it");
                failures.push(StrategyFailure::new(
                    "music_bed",
                    MediaError::FileNotFound(path.to_path_buf()),
                ));
                None
            }
            other => other,
        };

        let durations = vec![seconds_per_image; images.len()];
        info!(
            images = images.len(),
            seconds_per_image,
            total_sec = seconds_per_image * images.len() as f64,
            music = music.is_some(),
            "Assembling art slideshow"
        );

        let workspace = JobWorkspace::create(&self.work_dir, output, "slideshow").await?;
        let (visual, segments, concat) = self.build_visual(images, &durations, &workspace).await?;

        let summary = match music {
            Some((path, levels)) => {
                let visual_sec = get_duration(&visual).await?;
                let bed = workspace.file("music_bed.m4a");
                AudioMixer::new(self.runner.clone(), self.encoding.clone())
                    .loop_bed(path, visual_sec, levels, &bed)
                    .await?;
                Muxer::new(self.runner.clone(), self.encoding.clone())
                    .mux(&visual, &bed, output)
                    .await?
            }
            None => {
                move_file(&visual, output).await?;
                summarize(output).await?
            }
        };
        check_size(output, &summary).await?;
        workspace.cleanup().await;

        let mut report = AssemblyReport::new(summary, segments, concat);
        report.failures.extend(failures);
        Ok(report)
    }

    /// Render the segments and join them into one silent track.
    async fn build_visual(
        &self,
        images: &[PathBuf],
        durations: &[f64],
        workspace: &JobWorkspace,
    ) -> MediaResult<(PathBuf, usize, ConcatReport)> {
        let motions = MotionSet::for_kind(self.config.motion_set_kind());
        let segment_dir = workspace.subdir("segments").await?;
        let segments = plan_timeline(images, durations, &motions, &self.config, &segment_dir);

        let renderer = SegmentRenderer::new(self.runner.clone(), motions, self.encoding.clone());
        renderer
            .render_all(&unique_segments(&segments), self.parallelism)
            .await?;

        let paths: Vec<PathBuf> = segments.iter().map(|s| s.output.clone()).collect();
        let visual = workspace.file("visual.mp4");
        let concat = Concatenator::new(self.runner.clone(), self.encoding.clone(), &self.config)
            .concat(&paths, self.config.crossfade_sec, &visual, workspace.path())
            .await?;

        Ok((visual, segments.len(), concat))
    }
}

fn validate_images(images: &[PathBuf]) -> MediaResult<()> {
    if images.is_empty() {
        return Err(MediaError::invalid_input("image set is empty"));
    }
    if let Some(missing) = images.iter().find(|p| !p.exists()) {
        return Err(MediaError::FileNotFound(missing.clone()));
    }
    Ok(())
}

async fn audio_duration(audio: &Path) -> MediaResult<f64> {
    if !audio.exists() {
        return Err(MediaError::FileNotFound(audio.to_path_buf()));
    }
    let duration = get_duration(audio).await?;
    if duration <= 0.0 {
        return Err(MediaError::invalid_input("audio track has zero length"));
    }
    Ok(duration)
}

async fn check_size(output: &Path, summary: &MuxSummary) -> MediaResult<()> {
    if summary.size_bytes < MIN_OUTPUT_BYTES {
        remove_if_exists(output).await;
        return Err(MediaError::InvalidVideo(format!(
            "{} is only {} bytes",
            output.display(),
            summary.size_bytes
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::MotionSetKind;
    use tempfile::TempDir;

    fn images(n: usize) -> Vec<PathBuf> {
        (1..=n).map(|i| PathBuf::from(format!("broll_{:02}.png", i))).collect()
    }

    #[test]
    fn test_timeline_cycles_images_and_motions() {
        let config = RenderConfig::default();
        let motions = MotionSet::for_kind(MotionSetKind::Landscape);
        let durations = vec![8.0; 15];
        let segments = plan_timeline(&images(4), &durations, &motions, &config, Path::new("/tmp/s"));

        assert_eq!(segments.len(), 15);
        assert_eq!(segments[5].image, PathBuf::from("broll_02.png"));
        assert_eq!(segments[5].motion_index, 5);
        assert_eq!(segments[13].motion_index, 13 % motions.len());
        assert!(segments.iter().all(|s| s.output.starts_with("/tmp/s")));
    }

    #[test]
    fn test_repeated_pairs_render_once() {
        let config = RenderConfig::ambient();
        let motions = MotionSet::for_kind(MotionSetKind::Ambient);
        // One image and eight motions: segment 8 repeats segment 0 exactly
        let durations = vec![120.0; 10];
        let segments = plan_timeline(&images(1), &durations, &motions, &config, Path::new("/tmp/a"));

        assert_eq!(segments[0].output, segments[motions.len()].output);
        assert_eq!(unique_segments(&segments).len(), motions.len());
    }

    #[tokio::test]
    async fn test_empty_image_set_fails_fast() {
        let dir = TempDir::new().unwrap();
        let assembler = Assembler::new(
            FfmpegRunner::new(),
            EncodingConfig::for_shorts(),
            RenderConfig::default(),
            dir.path(),
            2,
        );
        let err = assembler
            .assemble(&dir.path().join("voice.mp3"), &[], &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(err.is_input_error());
        // Nothing was created for the job
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_slideshow_gives_each_image_one_segment() {
        let config = RenderConfig::slideshow();
        let motions = MotionSet::for_kind(config.motion_set_kind());
        let durations = vec![600.0; 3];
        let segments = plan_timeline(&images(3), &durations, &motions, &config, Path::new("/tmp/art"));

        let shown: Vec<&Path> = segments.iter().map(|s| s.image.as_path()).collect();
        assert_eq!(
            shown,
            vec![Path::new("broll_01.png"), Path::new("broll_02.png"), Path::new("broll_03.png")]
        );
        assert!(segments.iter().all(|s| s.duration_sec == 600.0 && s.fps == 24));
        assert_eq!(unique_segments(&segments).len(), 3);
    }

    #[tokio::test]
    async fn test_slideshow_rejects_zero_hold() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("art_01.png");
        std::fs::write(&image, b"png").unwrap();
        let assembler = Assembler::new(
            FfmpegRunner::new(),
            EncodingConfig::for_ambient(true),
            RenderConfig::slideshow(),
            dir.path().join("work"),
            1,
        );
        let err = assembler
            .assemble_slideshow(&[image], 0.0, None, &dir.path().join("art.mp4"))
            .await
            .unwrap_err();
        assert!(err.is_input_error());
        assert!(!dir.path().join("work").exists());
    }

    #[tokio::test]
    async fn test_missing_audio_fails_fast() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("broll_01.png");
        std::fs::write(&image, b"png").unwrap();
        let assembler = Assembler::new(
            FfmpegRunner::new(),
            EncodingConfig::for_shorts(),
            RenderConfig::vertical(),
            dir.path(),
            2,
        );
        let err = assembler
            .assemble(&dir.path().join("voice.mp3"), &[image], &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
