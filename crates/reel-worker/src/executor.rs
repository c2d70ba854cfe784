//! Job executor.
//!
//! Maps a manifest onto the matching engine operation. Execution never
//! returns an error: every failure, including an unreadable manifest, ends
//! as a failed [`JobOutcome`].

use chrono::{DateTime, Utc};
use futures::future::join_all;
use reel_media::captions::{estimate_word_timestamps, segment_words};
use reel_media::{
    get_duration, Assembler, AssemblyReport, BedLevels, ClipExtractor, ClipReport,
    CompositeReport, Compositor, CropReport, FfmpegRunner, FontSet, StrategyFailure,
    TextShortProducer, TextShortReport, VerticalCropper,
};
use reel_models::{JobId, JobOutcome};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, Instrument};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::manifest::{JobKind, JobManifest};
use crate::metrics::record_job;

/// Everything known about one executed job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub kind: &'static str,
    pub started_at: DateTime<Utc>,
    pub elapsed_sec: f64,
    #[serde(flatten)]
    pub outcome: JobOutcome,
    /// Fallbacks taken on the way to a successful output
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<StrategyFailure>,
}

/// Common shape of the engine reports.
struct Produced {
    size_bytes: u64,
    duration_sec: f64,
    failures: Vec<StrategyFailure>,
}

impl From<AssemblyReport> for Produced {
    fn from(r: AssemblyReport) -> Self {
        Self {
            size_bytes: r.size_bytes,
            duration_sec: r.duration_sec,
            failures: r.failures,
        }
    }
}

impl From<CompositeReport> for Produced {
    fn from(r: CompositeReport) -> Self {
        Self {
            size_bytes: r.size_bytes,
            duration_sec: r.duration_sec,
            failures: r.failures,
        }
    }
}

impl From<TextShortReport> for Produced {
    fn from(r: TextShortReport) -> Self {
        Self {
            size_bytes: r.size_bytes,
            duration_sec: r.duration_sec,
            failures: r.failures,
        }
    }
}

impl From<CropReport> for Produced {
    fn from(r: CropReport) -> Self {
        Self {
            size_bytes: r.size_bytes,
            duration_sec: r.duration_sec,
            failures: r.failures,
        }
    }
}

impl From<ClipReport> for Produced {
    fn from(r: ClipReport) -> Self {
        Self {
            size_bytes: r.size_bytes,
            duration_sec: r.duration_sec,
            failures: r.failures,
        }
    }
}

/// Runs manifests against the media engine.
#[derive(Debug, Clone)]
pub struct JobExecutor {
    config: WorkerConfig,
    runner: FfmpegRunner,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig) -> Self {
        let runner = FfmpegRunner::new().with_timeout(config.process_timeout);
        Self { config, runner }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run several manifest files, at most `max_concurrent_jobs` at a time.
    /// Reports come back in input order.
    pub async fn run_files(&self, paths: &[PathBuf]) -> Vec<JobReport> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_jobs.max(1)));
        let jobs = paths.iter().map(|path| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.ok();
                self.run_file(path).await
            }
        });
        join_all(jobs).await
    }

    /// Load one manifest file and run it.
    pub async fn run_file(&self, path: &Path) -> JobReport {
        match JobManifest::load(path).await {
            Ok(manifest) => self.execute(&manifest).await,
            Err(e) => {
                error!(manifest = %path.display(), "Rejected manifest: {}", e);
                record_job("manifest", false, 0.0);
                JobReport {
                    job_id: JobId::new(),
                    kind: "manifest",
                    started_at: Utc::now(),
                    elapsed_sec: 0.0,
                    outcome: JobOutcome::failed(e.to_string()),
                    failures: Vec::new(),
                }
            }
        }
    }

    pub async fn execute(&self, manifest: &JobManifest) -> JobReport {
        let logger = JobLogger::new(&manifest.job_id, manifest.kind_name());
        let started_at = Utc::now();
        let started = Instant::now();
        logger.log_start(&format!("writing {}", manifest.output.display()));

        let result = self
            .dispatch(manifest, &logger)
            .instrument(logger.create_span())
            .await;
        let elapsed_sec = started.elapsed().as_secs_f64();
        record_job(manifest.kind_name(), result.is_ok(), elapsed_sec);

        let (outcome, failures) = match result {
            Ok(produced) => {
                for failure in &produced.failures {
                    logger.log_fallback(failure.strategy, &failure.reason);
                }
                logger.log_completion(produced.size_bytes, produced.duration_sec, elapsed_sec);
                (
                    JobOutcome::succeeded(produced.size_bytes, produced.duration_sec),
                    produced.failures,
                )
            }
            Err(e) => {
                let kind = if e.is_rejected() { "rejected" } else { "failed" };
                logger.log_error(&format!("{}: {}", kind, e));
                (JobOutcome::failed(e.to_string()), Vec::new())
            }
        };

        JobReport {
            job_id: manifest.job_id.clone(),
            kind: manifest.kind_name(),
            started_at,
            elapsed_sec,
            outcome,
            failures,
        }
    }

    async fn dispatch(&self, manifest: &JobManifest, logger: &JobLogger) -> WorkerResult<Produced> {
        manifest.validate().map_err(WorkerError::InvalidJob)?;
        let encoding = manifest.encoding();
        let output = manifest.output.as_path();
        let work_dir = self.config.work_dir.as_path();

        let produced: Produced = match &manifest.job {
            JobKind::Broll {
                audio,
                images,
                render,
            }
            | JobKind::Vertical {
                audio,
                images,
                render,
            } => {
                logger.log_progress(&format!(
                    "{} images at {}",
                    images.len(),
                    render.resolution_class
                ));
                Assembler::new(
                    self.runner.clone(),
                    encoding,
                    render.clone(),
                    work_dir,
                    self.config.max_render_parallel,
                )
                .assemble(audio, images, output)
                .await?
                .into()
            }
            JobKind::Ambient {
                audio,
                images,
                target_duration_sec,
                render,
            } => {
                logger.log_progress(&format!("{:.0}s ambient visual", target_duration_sec));
                Assembler::new(
                    self.runner.clone(),
                    encoding,
                    render.clone(),
                    work_dir,
                    self.config.max_render_parallel,
                )
                .assemble_ambient(audio, images, *target_duration_sec, output)
                .await?
                .into()
            }
            JobKind::Slideshow {
                images,
                seconds_per_image,
                music,
                music_volume,
                render,
            } => {
                logger.log_progress(&format!(
                    "{} artworks, {:.0}s each",
                    images.len(),
                    seconds_per_image
                ));
                let levels = BedLevels {
                    volume: *music_volume,
                    ..BedLevels::ART_MUSIC
                };
                Assembler::new(
                    self.runner.clone(),
                    encoding,
                    render.clone(),
                    work_dir,
                    self.config.max_render_parallel,
                )
                .assemble_slideshow(
                    images,
                    *seconds_per_image,
                    music.as_deref().map(|path| (path, levels)),
                    output,
                )
                .await?
                .into()
            }
            JobKind::Captions {
                video,
                words,
                script,
                caption_style,
                caption_position,
                group_size,
            } => {
                let words = if words.is_empty() {
                    let duration = get_duration(video).await?;
                    logger.log_progress("estimating word timings from script");
                    estimate_word_timestamps(script.as_deref().unwrap_or_default(), duration)
                } else {
                    words.clone()
                };
                let segments = segment_words(&words, *caption_style, *group_size);
                logger.log_progress(&format!("{} words, {} segments", words.len(), segments.len()));

                Compositor::new(self.runner.clone(), encoding, work_dir)
                    .burn_captions(
                        video,
                        output,
                        segments,
                        *caption_style,
                        *caption_position,
                        self.fonts()?,
                    )
                    .await?
                    .into()
            }
            JobKind::TextShort {
                voice,
                cards,
                bed,
                options,
            } => {
                logger.log_progress(&format!("{} cards", cards.len()));
                TextShortProducer::new(
                    self.runner.clone(),
                    encoding,
                    self.fonts()?,
                    work_dir,
                    options.to_options(),
                )
                .produce(voice, cards, bed.as_deref(), output)
                .await?
                .into()
            }
            JobKind::CropVertical {
                video,
                crop_strategy,
                resolution_class,
            } => VerticalCropper::new(self.runner.clone(), encoding, *resolution_class)
                .crop(video, *crop_strategy, output)
                .await?
                .into(),
            JobKind::ExtractClip {
                video,
                start_sec,
                end_sec,
            } => ClipExtractor::new(self.runner.clone(), encoding)
                .extract(video, *start_sec, *end_sec, output)
                .await?
                .into(),
            JobKind::HookOverlay {
                video,
                text,
                duration_sec,
            } => Compositor::new(self.runner.clone(), encoding, work_dir)
                .burn_hook(video, output, text, *duration_sec, self.fonts()?)
                .await?
                .into(),
        };

        Ok(produced)
    }

    fn fonts(&self) -> WorkerResult<FontSet> {
        Ok(FontSet::load(self.config.font_path.as_deref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn executor(dir: &Path) -> JobExecutor {
        JobExecutor::new(WorkerConfig {
            work_dir: dir.join("work"),
            ..WorkerConfig::default()
        })
    }

    async fn write_manifest(dir: &Path, name: &str, json: &str) -> PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, json).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_missing_inputs_give_failed_outcome() {
        let dir = TempDir::new().unwrap();
        let manifest: JobManifest = serde_json::from_str(&format!(
            r#"{{"job_id":"job-1","kind":"broll","output":"{}","audio":"{}","images":["{}"]}}"#,
            dir.path().join("out.mp4").display(),
            dir.path().join("voice.mp3").display(),
            dir.path().join("broll_01.png").display(),
        ))
        .unwrap();

        let report = executor(dir.path()).execute(&manifest).await;
        assert_eq!(report.job_id, JobId::from_string("job-1"));
        assert_eq!(report.kind, "broll");
        assert_eq!(report.outcome.as_tuple(), (false, 0, 0.0));
        assert!(report.outcome.error.is_some());
        assert!(!dir.path().join("out.mp4").exists());
    }

    #[tokio::test]
    async fn test_invalid_options_rejected_before_media_work() {
        let dir = TempDir::new().unwrap();
        let manifest: JobManifest = serde_json::from_str(
            r#"{"kind":"hook_overlay","output":"h.mp4","video":"in.mp4","text":"Hi","duration_sec":0}"#,
        )
        .unwrap();

        let report = executor(dir.path()).execute(&manifest).await;
        assert!(!report.outcome.success);
        assert!(report
            .outcome
            .error
            .as_deref()
            .is_some_and(|e| e.contains("duration_sec")));
        assert!(!dir.path().join("work").exists());
    }

    #[tokio::test]
    async fn test_run_files_keeps_input_order() {
        let dir = TempDir::new().unwrap();
        let bad = write_manifest(dir.path(), "bad.json", "{ not json").await;
        let missing = write_manifest(
            dir.path(),
            "crop.json",
            &format!(
                r#"{{"kind":"crop_vertical","output":"{}","video":"{}"}}"#,
                dir.path().join("crop.mp4").display(),
                dir.path().join("landscape.mp4").display(),
            ),
        )
        .await;

        let reports = executor(dir.path())
            .run_files(&[bad, missing, dir.path().join("absent.json")])
            .await;

        let kinds: Vec<&str> = reports.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec!["manifest", "crop_vertical", "manifest"]);
        assert!(reports.iter().all(|r| !r.outcome.success));
    }

    #[tokio::test]
    async fn test_slideshow_with_missing_artwork_fails() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("gallery.mp4");
        let manifest: JobManifest = serde_json::from_str(&format!(
            r#"{{"kind":"slideshow","output":"{}","images":["{}"],"seconds_per_image":60}}"#,
            output.display(),
            dir.path().join("missing.jpg").display(),
        ))
        .unwrap();

        let report = executor(dir.path()).execute(&manifest).await;
        assert_eq!(report.kind, "slideshow");
        assert!(!report.outcome.success);
        assert!(report.outcome.error.as_deref().is_some_and(|e| e.contains("missing.jpg")));
        assert!(!output.exists());
    }

    #[test]
    fn test_report_serializes_outcome_fields() {
        let report = JobReport {
            job_id: JobId::from_string("job-9"),
            kind: "vertical",
            started_at: Utc::now(),
            elapsed_sec: 1.5,
            outcome: JobOutcome::succeeded(4096, 30.0),
            failures: Vec::new(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["size_bytes"], 4096);
        assert_eq!(value["job_id"], "job-9");
        assert!(value.get("failures").is_none());
    }
}
