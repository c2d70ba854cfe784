//! Crossfade concatenation of rendered clips.
//!
//! Strategies are tried in order and every failure is recorded:
//!
//! 1. `crossfade` - one `xfade` chain over all clips
//! 2. `batched_crossfade` - above the batch threshold, crossfade fixed-size
//!    batches into intermediates, then join those directly with each
//!    non-final batch trimmed by one crossfade so the total length matches
//! 3. `stream_copy` - concat demuxer without re-encoding
//! 4. `reencode` - concat demuxer with re-encoding
//!
//! A single clip or a non-positive crossfade starts at `stream_copy`.

use reel_models::{EncodingConfig, RenderConfig};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{exhausted, MediaError, MediaResult, StrategyFailure};
use crate::fs_utils::{finalize_output, partial_path};
use crate::metrics;
use crate::probe::get_duration;
use crate::progress::log_every_tenth;

/// A clip to be joined, with its duration on the frame grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub path: PathBuf,
    pub duration_sec: f64,
}

/// Round a duration to the nearest whole frame.
pub fn snap_to_frame(duration_sec: f64, fps: u32) -> f64 {
    let fps = f64::from(fps.max(1));
    (duration_sec * fps).round() / fps
}

/// Start offsets of each transition in an `xfade` chain.
///
/// Transition `i` (joining clip `i` onto everything before it) starts at
/// `sum(d[0..i]) - i * crossfade`: each earlier transition already pulled
/// the timeline back by one crossfade.
pub fn plan_crossfade(durations: &[f64], crossfade_sec: f64) -> MediaResult<Vec<f64>> {
    if durations.len() < 2 {
        return Err(MediaError::invalid_input("crossfade needs at least two clips"));
    }
    if crossfade_sec <= 0.0 {
        return Err(MediaError::invalid_input("crossfade duration must be positive"));
    }
    let shortest = durations.iter().cloned().fold(f64::INFINITY, f64::min);
    if crossfade_sec >= shortest {
        return Err(MediaError::invalid_input(format!(
            "crossfade {:.3}s is not shorter than the shortest clip ({:.3}s)",
            crossfade_sec, shortest
        )));
    }

    let mut offsets = Vec::with_capacity(durations.len() - 1);
    let mut cumulative = durations[0];
    for (i, duration) in durations.iter().enumerate().skip(1) {
        offsets.push(cumulative - i as f64 * crossfade_sec);
        cumulative += duration;
    }
    Ok(offsets)
}

/// Length of a track after crossfading `durations` together.
pub fn crossfaded_duration(durations: &[f64], crossfade_sec: f64) -> f64 {
    let sum: f64 = durations.iter().sum();
    if durations.len() < 2 || crossfade_sec <= 0.0 {
        return sum;
    }
    sum - (durations.len() - 1) as f64 * crossfade_sec
}

/// Build the `xfade` filter graph; the result is labelled `[vout]`.
pub fn crossfade_graph(durations: &[f64], crossfade_sec: f64) -> MediaResult<String> {
    let offsets = plan_crossfade(durations, crossfade_sec)?;
    let mut parts = Vec::with_capacity(offsets.len());
    let mut previous = "0:v".to_string();

    for (i, offset) in offsets.iter().enumerate() {
        let input = i + 1;
        let label = if input == durations.len() - 1 {
            "vout".to_string()
        } else {
            format!("x{}", input)
        };
        parts.push(format!(
            "[{}][{}:v]xfade=transition=fade:duration={:.3}:offset={:.3}[{}]",
            previous, input, crossfade_sec, offset, label
        ));
        previous = label;
    }

    Ok(parts.join(";"))
}

/// Split `count` clips into batches when the count exceeds `threshold`.
///
/// At or below the threshold a single range covers everything.
pub fn plan_batches(count: usize, threshold: usize, batch_size: usize) -> Vec<Range<usize>> {
    if count == 0 {
        return Vec::new();
    }
    if count <= threshold || batch_size == 0 {
        return vec![0..count];
    }
    (0..count)
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(count))
        .collect()
}

/// Render a concat demuxer list. `outpoint` trims an entry's tail.
pub fn concat_list(entries: &[(PathBuf, Option<f64>)]) -> String {
    let mut list = String::new();
    for (path, outpoint) in entries {
        let escaped = path.to_string_lossy().replace('\'', "'\\''");
        list.push_str(&format!("file '{}'\n", escaped));
        if let Some(out) = outpoint {
            list.push_str(&format!("outpoint {:.3}\n", out));
        }
    }
    list
}

/// How a track was joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    Crossfade,
    BatchedCrossfade,
    StreamCopy,
    Reencode,
}

impl JoinStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinStrategy::Crossfade => "crossfade",
            JoinStrategy::BatchedCrossfade => "batched_crossfade",
            JoinStrategy::StreamCopy => "stream_copy",
            JoinStrategy::Reencode => "reencode",
        }
    }

    pub fn has_transitions(&self) -> bool {
        matches!(self, JoinStrategy::Crossfade | JoinStrategy::BatchedCrossfade)
    }
}

/// Outcome of a successful join.
#[derive(Debug, Clone)]
pub struct ConcatReport {
    pub strategy: JoinStrategy,
    /// Strategies that were tried first and failed
    pub failures: Vec<StrategyFailure>,
    /// Track length implied by the strategy that succeeded
    pub expected_duration_sec: f64,
    pub batches: usize,
}

/// Joins clips with crossfades, degrading to a direct join on failure.
#[derive(Debug, Clone)]
pub struct Concatenator {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
    fps: u32,
    batch_threshold: usize,
    batch_size: usize,
}

impl Concatenator {
    pub fn new(runner: FfmpegRunner, encoding: EncodingConfig, config: &RenderConfig) -> Self {
        Self {
            runner,
            encoding,
            fps: config.fps,
            batch_threshold: config.batch_threshold,
            batch_size: config.batch_size,
        }
    }

    /// Probe clip durations and snap them to the frame grid.
    pub async fn probe_clips(&self, paths: &[PathBuf]) -> MediaResult<Vec<Clip>> {
        let mut clips = Vec::with_capacity(paths.len());
        for path in paths {
            let duration = get_duration(path).await?;
            clips.push(Clip {
                path: path.clone(),
                duration_sec: snap_to_frame(duration, self.fps),
            });
        }
        Ok(clips)
    }

    /// Join `paths` in order into `output`. Intermediates go to `scratch`.
    pub async fn concat(
        &self,
        paths: &[PathBuf],
        crossfade_sec: f64,
        output: &Path,
        scratch: &Path,
    ) -> MediaResult<ConcatReport> {
        if paths.is_empty() {
            return Err(MediaError::invalid_input("no clips to concatenate"));
        }
        if let Some(missing) = paths.iter().find(|p| !p.exists()) {
            return Err(MediaError::FileNotFound(missing.clone()));
        }

        let clips = self.probe_clips(paths).await?;
        self.concat_clips(&clips, crossfade_sec, output, scratch).await
    }

    /// Join clips whose durations are already known.
    pub async fn concat_clips(
        &self,
        clips: &[Clip],
        crossfade_sec: f64,
        output: &Path,
        scratch: &Path,
    ) -> MediaResult<ConcatReport> {
        if clips.is_empty() {
            return Err(MediaError::invalid_input("no clips to concatenate"));
        }

        let batches = plan_batches(clips.len(), self.batch_threshold, self.batch_size);
        let strategies = self.strategies(clips.len(), crossfade_sec, batches.len());
        let mut failures = Vec::new();

        for strategy in strategies {
            let attempt = match strategy {
                JoinStrategy::Crossfade => self.crossfade(clips, crossfade_sec, output).await,
                JoinStrategy::BatchedCrossfade => {
                    self.batched_crossfade(clips, &batches, crossfade_sec, output, scratch)
                        .await
                }
                JoinStrategy::StreamCopy | JoinStrategy::Reencode => {
                    let entries: Vec<_> = clips.iter().map(|c| (c.path.clone(), None)).collect();
                    let list = scratch.join("concat_direct.txt");
                    self.direct_join(&entries, &list, strategy == JoinStrategy::StreamCopy, output)
                        .await
                }
            };

            match attempt {
                Ok(()) => {
                    let durations: Vec<f64> = clips.iter().map(|c| c.duration_sec).collect();
                    let expected = if strategy.has_transitions() {
                        crossfaded_duration(&durations, crossfade_sec)
                    } else {
                        durations.iter().sum()
                    };
                    metrics::record_concat_strategy(strategy.as_str());
                    info!(
                        strategy = strategy.as_str(),
                        clips = clips.len(),
                        fallbacks = failures.len(),
                        expected_duration = expected,
                        "Joined clips into {}",
                        output.display()
                    );
                    return Ok(ConcatReport {
                        strategy,
                        failures,
                        expected_duration_sec: expected,
                        batches: if strategy == JoinStrategy::BatchedCrossfade {
                            batches.len()
                        } else {
                            1
                        },
                    });
                }
                Err(e) => {
                    warn!(strategy = strategy.as_str(), error = %e, "Join strategy failed, trying next");
                    metrics::record_fallback("concat", strategy.as_str());
                    failures.push(StrategyFailure::new(strategy.as_str(), e));
                }
            }
        }

        Err(exhausted("concat", &failures))
    }

    fn strategies(&self, count: usize, crossfade_sec: f64, batches: usize) -> Vec<JoinStrategy> {
        let mut strategies = Vec::with_capacity(3);
        if count > 1 && crossfade_sec > 0.0 {
            if batches > 1 {
                strategies.push(JoinStrategy::BatchedCrossfade);
            } else {
                strategies.push(JoinStrategy::Crossfade);
            }
        }
        strategies.push(JoinStrategy::StreamCopy);
        strategies.push(JoinStrategy::Reencode);
        strategies
    }

    /// One `xfade` chain over every clip.
    async fn crossfade(&self, clips: &[Clip], crossfade_sec: f64, output: &Path) -> MediaResult<()> {
        let durations: Vec<f64> = clips.iter().map(|c| c.duration_sec).collect();
        let graph = crossfade_graph(&durations, crossfade_sec)?;
        let partial = partial_path(output);

        let mut cmd = FfmpegCommand::with_output(&partial);
        for clip in clips {
            cmd = cmd.input(&clip.path);
        }
        let cmd = cmd
            .filter_complex(graph)
            .map("[vout]")
            .output_arg("-an")
            .output_args(self.encoding.video_args());

        let total = crossfaded_duration(&durations, crossfade_sec);
        let result = self
            .runner
            .run_with_progress(&cmd, log_every_tenth("crossfade", total))
            .await;
        finalize_output(result, &partial, output).await
    }

    async fn batched_crossfade(
        &self,
        clips: &[Clip],
        batches: &[Range<usize>],
        crossfade_sec: f64,
        output: &Path,
        scratch: &Path,
    ) -> MediaResult<()> {
        let mut entries = Vec::with_capacity(batches.len());

        for (k, range) in batches.iter().enumerate() {
            let batch = &clips[range.clone()];
            let durations: Vec<f64> = batch.iter().map(|c| c.duration_sec).collect();
            let batch_duration = crossfaded_duration(&durations, crossfade_sec);

            let path = if batch.len() == 1 {
                batch[0].path.clone()
            } else {
                let path = scratch.join(format!("batch_{:03}.mp4", k));
                info!(batch = k + 1, of = batches.len(), clips = batch.len(), "Crossfading batch");
                self.crossfade(batch, crossfade_sec, &path).await?;
                path
            };

            // Every batch but the last gives up one crossfade at its tail
            let outpoint = (k + 1 < batches.len()).then(|| batch_duration - crossfade_sec);
            entries.push((path, outpoint));
        }

        let list = scratch.join("concat_batches.txt");
        self.direct_join(&entries, &list, false, output).await
    }

    /// Concat demuxer join, with stream copy or a re-encode.
    async fn direct_join(
        &self,
        entries: &[(PathBuf, Option<f64>)],
        list_path: &Path,
        stream_copy: bool,
        output: &Path,
    ) -> MediaResult<()> {
        tokio::fs::write(list_path, concat_list(entries)).await?;
        let partial = partial_path(output);

        let cmd = FfmpegCommand::with_output(&partial)
            .input_with_args(["-f", "concat", "-safe", "0"], list_path)
            .output_arg("-an");
        let cmd = if stream_copy {
            cmd.video_codec("copy")
        } else {
            cmd.output_args(self.encoding.video_args())
        };

        let result = self.runner.run(&cmd).await;
        finalize_output(result, &partial, output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_account_for_prior_transitions() {
        let offsets = plan_crossfade(&[4.0, 4.0, 4.0, 4.0], 0.5).unwrap();
        assert_eq!(offsets, vec![3.5, 7.0, 10.5]);
    }

    #[test]
    fn test_offsets_with_uneven_durations() {
        let offsets = plan_crossfade(&[8.0, 3.0, 5.0], 1.0).unwrap();
        // 8 - 1, then 8 + 3 - 2
        assert_eq!(offsets, vec![7.0, 9.0]);
    }

    #[test]
    fn test_each_transition_starts_before_its_clip_ends() {
        let durations = [2.0, 6.5, 1.2, 4.0, 3.3];
        let xf = 0.4;
        let offsets = plan_crossfade(&durations, xf).unwrap();
        let mut track_len = durations[0];
        for (i, offset) in offsets.iter().enumerate() {
            assert!((offset + xf - track_len).abs() < 1e-9);
            track_len = offset + durations[i + 1];
        }
        assert!((track_len - crossfaded_duration(&durations, xf)).abs() < 1e-9);
    }

    #[test]
    fn test_crossfade_rejects_too_long_transition() {
        assert!(plan_crossfade(&[4.0, 0.4], 0.5).is_err());
        assert!(plan_crossfade(&[4.0], 0.5).is_err());
    }

    #[test]
    fn test_graph_labels() {
        let graph = crossfade_graph(&[4.0, 4.0, 4.0], 0.5).unwrap();
        assert_eq!(
            graph,
            "[0:v][1:v]xfade=transition=fade:duration=0.500:offset=3.500[x1];\
             [x1][2:v]xfade=transition=fade:duration=0.500:offset=7.000[vout]"
        );
    }

    #[test]
    fn test_batches_scenario() {
        let batches = plan_batches(25, 20, 10);
        assert_eq!(batches, vec![0..10, 10..20, 20..25]);
        assert_eq!(plan_batches(20, 20, 10), vec![0..20]);
        assert!(plan_batches(0, 20, 10).is_empty());
    }

    #[test]
    fn test_batched_total_matches_single_chain() {
        // 25 clips of 4s with 0.5s crossfades
        let durations = vec![4.0; 25];
        let xf = 0.5;
        let batches = plan_batches(durations.len(), 20, 10);
        let mut total = 0.0;
        for (k, range) in batches.iter().enumerate() {
            let batch_len = crossfaded_duration(&durations[range.clone()], xf);
            total += if k + 1 < batches.len() { batch_len - xf } else { batch_len };
        }
        assert!((total - 88.0).abs() < 1e-9);
        assert!((crossfaded_duration(&durations, xf) - 88.0).abs() < 1e-9);
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[
            (PathBuf::from("/tmp/it's.mp4"), Some(37.0)),
            (PathBuf::from("/tmp/b.mp4"), None),
        ]);
        assert_eq!(list, "file '/tmp/it'\\''s.mp4'\noutpoint 37.000\nfile '/tmp/b.mp4'\n");
    }

    #[test]
    fn test_snap_to_frame() {
        assert!((snap_to_frame(4.0166, 30) - 4.0).abs() < 1e-9);
        assert!((snap_to_frame(4.02, 30) - 4.0333333).abs() < 1e-6);
    }

    fn concatenator() -> Concatenator {
        Concatenator::new(
            FfmpegRunner::new(),
            EncodingConfig::default(),
            &RenderConfig::default(),
        )
    }

    #[test]
    fn test_single_clip_takes_direct_path() {
        let strategies = concatenator().strategies(1, 0.5, 1);
        assert_eq!(strategies, vec![JoinStrategy::StreamCopy, JoinStrategy::Reencode]);
    }

    #[test]
    fn test_zero_crossfade_takes_direct_path() {
        let strategies = concatenator().strategies(5, 0.0, 1);
        assert_eq!(strategies[0], JoinStrategy::StreamCopy);
    }

    #[test]
    fn test_large_count_uses_batches_then_falls_back() {
        let strategies = concatenator().strategies(25, 0.5, 3);
        assert_eq!(
            strategies,
            vec![
                JoinStrategy::BatchedCrossfade,
                JoinStrategy::StreamCopy,
                JoinStrategy::Reencode
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_clip_fails_fast() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = concatenator()
            .concat(
                &[dir.path().join("nope.mp4")],
                0.5,
                &dir.path().join("out.mp4"),
                dir.path(),
            )
            .await
            .unwrap_err();
        assert!(err.is_input_error());
    }
}
