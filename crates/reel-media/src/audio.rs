//! Audio bed preparation: extraction, looping, synthesized SFX and mixing.

use reel_models::EncodingConfig;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{exhausted, MediaError, MediaResult, StrategyFailure};
use crate::fs_utils::{finalize_output, partial_path};
use crate::metrics;
use crate::probe::{get_duration, probe_media};

/// Synthesized sound effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SfxKind {
    /// Descending sweep played across a transition
    Whoosh,
    /// Low decaying tone played on a reveal
    Impact,
}

impl SfxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SfxKind::Whoosh => "whoosh",
            SfxKind::Impact => "impact",
        }
    }

    pub fn duration_sec(&self) -> f64 {
        match self {
            SfxKind::Whoosh => 0.3,
            SfxKind::Impact => 0.25,
        }
    }

    /// Mix gain relative to the voice.
    pub fn volume(&self) -> f64 {
        match self {
            SfxKind::Whoosh => 0.4,
            SfxKind::Impact => 0.6,
        }
    }

    /// `lavfi` source expression generating the effect.
    pub fn lavfi_source(&self) -> String {
        let d = self.duration_sec();
        match self {
            // Instantaneous frequency 800 - 2000t: 800Hz down to 200Hz over 0.3s
            SfxKind::Whoosh => format!(
                "aevalsrc=exprs='0.8*sin(2*PI*(800*t-1000*t*t))':s=44100:d={d},afade=t=out:st=0:d={d}",
                d = d
            ),
            SfxKind::Impact => format!(
                "sine=frequency=60:sample_rate=44100:duration={d},afade=t=out:st=0.05:d={fade:.2}",
                d = d,
                fade = d - 0.05
            ),
        }
    }
}

/// One effect placed on the output timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SfxEvent {
    pub kind: SfxKind,
    pub at_sec: f64,
}

/// Background bed settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BedLevels {
    pub volume: f64,
    pub fade_in_sec: f64,
    pub fade_out_sec: f64,
}

impl BedLevels {
    /// A track looped on its own under a long visual.
    pub const LOOPED_TRACK: BedLevels = BedLevels {
        volume: 1.0,
        fade_in_sec: 3.0,
        fade_out_sec: 5.0,
    };

    /// Quiet music under an art slideshow.
    pub const ART_MUSIC: BedLevels = BedLevels {
        volume: 0.15,
        fade_in_sec: 5.0,
        fade_out_sec: 5.0,
    };
}

impl Default for BedLevels {
    fn default() -> Self {
        Self {
            volume: 0.15,
            fade_in_sec: 2.0,
            fade_out_sec: 3.0,
        }
    }
}

/// Single-pass mix graph over voice (input 0), one input per SFX event
/// (inputs `1..=events.len()`), and the optional bed (last input).
///
/// Every source is shaped on its own branch and summed by one `amix`, cut to
/// the voice length. The result is labelled `[aout]`.
pub fn mix_graph(
    voice_duration_sec: f64,
    events: &[SfxEvent],
    bed: Option<BedLevels>,
) -> String {
    let mut branches = Vec::new();
    let mut labels = vec!["[0:a]".to_string()];

    for (i, event) in events.iter().enumerate() {
        let input = i + 1;
        let delay_ms = (event.at_sec.max(0.0) * 1000.0).round() as u64;
        branches.push(format!(
            "[{input}:a]volume={vol},adelay={ms}|{ms}[sfx{input}]",
            input = input,
            vol = event.kind.volume(),
            ms = delay_ms
        ));
        labels.push(format!("[sfx{}]", input));
    }

    if let Some(levels) = bed {
        let input = events.len() + 1;
        let fade_out_start = (voice_duration_sec - levels.fade_out_sec).max(0.0);
        branches.push(format!(
            "[{input}:a]volume={vol},afade=t=in:st=0:d={fin},afade=t=out:st={fos:.3}:d={fout},atrim=0:{dur:.3}[bed]",
            input = input,
            vol = levels.volume,
            fin = levels.fade_in_sec,
            fos = fade_out_start,
            fout = levels.fade_out_sec,
            dur = voice_duration_sec
        ));
        labels.push("[bed]".to_string());
    }

    let mix = format!(
        "{}amix=inputs={}:duration=first:dropout_transition=0:normalize=0[aout]",
        labels.concat(),
        labels.len()
    );
    branches.push(mix);
    branches.join(";")
}

/// Result of preparing a mixed bed.
#[derive(Debug, Clone)]
pub struct MixOutcome {
    /// Track to mux: the mix, or the raw voice if mixing failed
    pub path: PathBuf,
    pub mixed: bool,
    pub failures: Vec<StrategyFailure>,
}

/// Runs audio preparation commands.
#[derive(Debug, Clone)]
pub struct AudioMixer {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

impl AudioMixer {
    pub fn new(runner: FfmpegRunner, encoding: EncodingConfig) -> Self {
        Self { runner, encoding }
    }

    /// Render a sound effect to `output` (PCM WAV).
    pub async fn synth_sfx(&self, kind: SfxKind, output: &Path) -> MediaResult<()> {
        let partial = partial_path(output);
        let cmd = FfmpegCommand::with_output(&partial)
            .input_with_args(["-f", "lavfi"], kind.lavfi_source())
            .audio_codec("pcm_s16le")
            .output_args(["-ar", "44100", "-ac", "2"]);
        let result = self.runner.run(&cmd).await;
        finalize_output(result, &partial, output).await
    }

    /// Mix voice, SFX and bed in one pass. Falls back to the raw voice.
    pub async fn mix(
        &self,
        voice: &Path,
        events: &[SfxEvent],
        bed: Option<(&Path, BedLevels)>,
        scratch: &Path,
    ) -> MediaResult<MixOutcome> {
        let voice_duration = get_duration(voice).await?;
        if voice_duration <= 0.0 {
            return Err(MediaError::invalid_input("voice track has zero length"));
        }
        let bed = bed.filter(|(path, _)| path.exists());

        if events.is_empty() && bed.is_none() {
            return Ok(MixOutcome {
                path: voice.to_path_buf(),
                mixed: false,
                failures: Vec::new(),
            });
        }

        let output = scratch.join("mixed_audio.wav");
        match self
            .mix_inner(voice, voice_duration, events, bed, scratch, &output)
            .await
        {
            Ok(()) => {
                info!(sfx = events.len(), bed = bed.is_some(), "Audio bed mixed");
                Ok(MixOutcome {
                    path: output,
                    mixed: true,
                    failures: Vec::new(),
                })
            }
            Err(e) => {
                warn!(error = %e, "Audio mix failed, using raw voice");
                metrics::record_fallback("mix", "single_pass_mix");
                Ok(MixOutcome {
                    path: voice.to_path_buf(),
                    mixed: false,
                    failures: vec![StrategyFailure::new("single_pass_mix", e)],
                })
            }
        }
    }

    async fn mix_inner(
        &self,
        voice: &Path,
        voice_duration: f64,
        events: &[SfxEvent],
        bed: Option<(&Path, BedLevels)>,
        scratch: &Path,
        output: &Path,
    ) -> MediaResult<()> {
        let mut cmd = FfmpegCommand::with_output(partial_path(output)).input(voice);

        for kind in [SfxKind::Whoosh, SfxKind::Impact] {
            if events.iter().any(|e| e.kind == kind) {
                self.synth_sfx(kind, &sfx_path(scratch, kind)).await?;
            }
        }
        for event in events {
            cmd = cmd.input(sfx_path(scratch, event.kind));
        }
        if let Some((path, _)) = bed {
            cmd = cmd.input(path);
        }

        let graph = mix_graph(voice_duration, events, bed.map(|(_, levels)| levels));
        let cmd = cmd
            .filter_complex(graph)
            .map("[aout]")
            .audio_codec("pcm_s16le")
            .output_args(["-ar", "44100"]);

        let partial = partial_path(output);
        let result = self.runner.run(&cmd).await;
        finalize_output(result, &partial, output).await
    }

    /// Loop (or trim) `audio` to exactly `target_sec` at full volume,
    /// fading in and out.
    pub async fn loop_to_duration(
        &self,
        audio: &Path,
        target_sec: f64,
        output: &Path,
    ) -> MediaResult<()> {
        self.loop_bed(audio, target_sec, BedLevels::LOOPED_TRACK, output)
            .await
    }

    /// Loop (or trim) `audio` to `target_sec` with the given bed levels.
    pub async fn loop_bed(
        &self,
        audio: &Path,
        target_sec: f64,
        levels: BedLevels,
        output: &Path,
    ) -> MediaResult<()> {
        if target_sec <= 0.0 {
            return Err(MediaError::invalid_input("loop target must be positive"));
        }
        if !audio.exists() {
            return Err(MediaError::FileNotFound(audio.to_path_buf()));
        }
        let source_duration = get_duration(audio).await?;
        if source_duration <= 0.0 {
            return Err(MediaError::invalid_input("audio track has zero length"));
        }

        let partial = partial_path(output);
        let mut cmd = FfmpegCommand::with_output(&partial).input(audio);
        if source_duration < target_sec {
            cmd = cmd.input_arg("-stream_loop").input_arg("-1");
        }
        let cmd = cmd
            .duration(target_sec)
            .audio_filter(loop_filter(target_sec, levels))
            .output_args(self.encoding.audio_args());

        info!(
            source_duration,
            target_sec,
            volume = levels.volume,
            loops = (target_sec / source_duration).ceil(),
            "Looping audio bed"
        );
        let result = self.runner.run(&cmd).await;
        finalize_output(result, &partial, output).await
    }

    /// Extract the audio track of `video` into `scratch`.
    ///
    /// Tries a lossless stream copy first, then an AAC re-encode. Returns
    /// `None` when the video has no audio stream.
    pub async fn extract(
        &self,
        video: &Path,
        scratch: &Path,
    ) -> MediaResult<Option<(PathBuf, Vec<StrategyFailure>)>> {
        if !probe_media(video).await?.has_audio {
            return Ok(None);
        }

        let mut failures = Vec::new();
        let attempts: [(&'static str, PathBuf); 2] = [
            ("stream_copy", scratch.join("audio_copy.mka")),
            ("reencode", scratch.join("audio_aac.m4a")),
        ];

        for (strategy, output) in attempts {
            let partial = partial_path(&output);
            let cmd = FfmpegCommand::new(video, &partial).no_video();
            let cmd = if strategy == "stream_copy" {
                cmd.audio_codec("copy")
            } else {
                cmd.output_args(self.encoding.audio_args())
            };

            let result = self.runner.run(&cmd).await;
            match finalize_output(result, &partial, &output).await {
                Ok(()) => return Ok(Some((output, failures))),
                Err(e) => {
                    warn!(strategy, error = %e, "Audio extraction failed");
                    metrics::record_fallback("extract_audio", strategy);
                    failures.push(StrategyFailure::new(strategy, e));
                }
            }
        }

        Err(exhausted("extract_audio", &failures))
    }
}

fn sfx_path(scratch: &Path, kind: SfxKind) -> PathBuf {
    scratch.join(format!("{}.wav", kind.as_str()))
}

/// Fade-in and fade-out for a looped bed of `target_sec`.
/// Volume and fades for a looped track. Each fade takes at most a quarter
/// of the target so short targets still reach full level.
fn loop_filter(target_sec: f64, levels: BedLevels) -> String {
    let fade_in = levels.fade_in_sec.min(target_sec / 4.0);
    let fade_out = levels.fade_out_sec.min(target_sec / 4.0);
    let fades = format!(
        "afade=t=in:st=0:d={:.3},afade=t=out:st={:.3}:d={:.3}",
        fade_in,
        target_sec - fade_out,
        fade_out
    );
    if levels.volume == 1.0 {
        fades
    } else {
        format!("volume={},{}", levels.volume, fades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_graph_voice_sfx_and_bed() {
        let events = [
            SfxEvent {
                kind: SfxKind::Whoosh,
                at_sec: 2.8,
            },
            SfxEvent {
                kind: SfxKind::Impact,
                at_sec: 0.5,
            },
        ];
        let graph = mix_graph(20.0, &events, Some(BedLevels::default()));
        assert!(graph.contains("[1:a]volume=0.4,adelay=2800|2800[sfx1]"));
        assert!(graph.contains("[2:a]volume=0.6,adelay=500|500[sfx2]"));
        assert!(graph.contains("[3:a]volume=0.15,afade=t=in:st=0:d=2,afade=t=out:st=17.000:d=3"));
        assert!(graph.contains("atrim=0:20.000[bed]"));
        assert!(graph.ends_with(
            "[0:a][sfx1][sfx2][bed]amix=inputs=4:duration=first:dropout_transition=0:normalize=0[aout]"
        ));
        // One mix stage only
        assert_eq!(graph.matches("amix").count(), 1);
    }

    #[test]
    fn test_mix_graph_voice_only_bed() {
        let graph = mix_graph(2.0, &[], Some(BedLevels::default()));
        assert!(graph.starts_with("[1:a]volume=0.15"));
        // Fade-out never starts before zero
        assert!(graph.contains("afade=t=out:st=0.000"));
        assert!(graph.contains("amix=inputs=2"));
    }

    #[test]
    fn test_whoosh_sweeps_down() {
        let source = SfxKind::Whoosh.lavfi_source();
        assert!(source.starts_with("aevalsrc="));
        assert!(source.contains("800*t-1000*t*t"));
        assert!(SfxKind::Impact.lavfi_source().contains("frequency=60"));
    }

    #[test]
    fn test_loop_fades_fit_short_targets() {
        assert_eq!(
            loop_filter(3600.0, BedLevels::LOOPED_TRACK),
            "afade=t=in:st=0:d=3.000,afade=t=out:st=3595.000:d=5.000"
        );
        assert_eq!(
            loop_filter(8.0, BedLevels::LOOPED_TRACK),
            "afade=t=in:st=0:d=2.000,afade=t=out:st=6.000:d=2.000"
        );
    }

    #[test]
    fn test_quiet_bed_sets_volume_first() {
        assert_eq!(
            loop_filter(1200.0, BedLevels::ART_MUSIC),
            "volume=0.15,afade=t=in:st=0:d=5.000,afade=t=out:st=1195.000:d=5.000"
        );
    }

    #[tokio::test]
    async fn test_loop_bed_requires_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let mixer = AudioMixer::new(FfmpegRunner::new(), EncodingConfig::default());
        let err = mixer
            .loop_bed(
                &dir.path().join("music.mp3"),
                60.0,
                BedLevels::ART_MUSIC,
                &dir.path().join("bed.m4a"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(!dir.path().join("bed.m4a").exists());
    }
}
