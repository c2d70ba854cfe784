//! Animated text-card shorts.
//!
//! Each card becomes a clip of rendered fade-in frames followed by one held
//! full-opacity frame. Clips are joined with the crossfade concatenator and
//! muxed with a single-pass mix of the voice, synthesized effects, and an
//! optional background bed.

mod frame;
mod schedule;

pub use frame::{fade_opacity, gradient, CardRenderer};
pub use schedule::{clip_starts, sfx_schedule, CardTiming, IMPACT_DELAY_SEC, MIN_HOLD_SEC};

use reel_models::{CardTheme, EncodingConfig, RenderConfig, ResolutionClass, TextCard};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::audio::{AudioMixer, BedLevels};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::concat::{concat_list, Concatenator};
use crate::error::{MediaError, MediaResult, StrategyFailure};
use crate::fs_utils::{finalize_output, partial_path, remove_if_exists, MIN_OUTPUT_BYTES};
use crate::mux::{summarize, Muxer};
use crate::probe::get_duration;
use crate::text::FontSet;
use crate::workspace::JobWorkspace;

/// Look and pacing of a text short.
#[derive(Debug, Clone)]
pub struct TextShortOptions {
    pub resolution: ResolutionClass,
    pub timing: CardTiming,
    pub crossfade_sec: f64,
    /// Add whooshes on transitions and impacts on flagged cards
    pub sfx: bool,
    pub theme: CardTheme,
    pub bed_levels: BedLevels,
}

impl Default for TextShortOptions {
    fn default() -> Self {
        Self {
            resolution: ResolutionClass::Vertical1080,
            timing: CardTiming::default(),
            crossfade_sec: 0.4,
            sfx: true,
            theme: CardTheme::default(),
            bed_levels: BedLevels::default(),
        }
    }
}

/// What a text short produced.
#[derive(Debug, Clone, Serialize)]
pub struct TextShortReport {
    pub size_bytes: u64,
    pub duration_sec: f64,
    pub cards: usize,
    pub sfx_events: usize,
    pub join_strategy: &'static str,
    pub audio_mixed: bool,
    pub failures: Vec<StrategyFailure>,
}

/// Builds a text-card short from cards and a voice track.
#[derive(Debug, Clone)]
pub struct TextShortProducer {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
    fonts: FontSet,
    work_dir: PathBuf,
    options: TextShortOptions,
}

impl TextShortProducer {
    pub fn new(
        runner: FfmpegRunner,
        encoding: EncodingConfig,
        fonts: FontSet,
        work_dir: impl Into<PathBuf>,
        options: TextShortOptions,
    ) -> Self {
        Self {
            runner,
            encoding,
            fonts,
            work_dir: work_dir.into(),
            options,
        }
    }

    pub async fn produce(
        &self,
        voice: &Path,
        cards: &[TextCard],
        bed: Option<&Path>,
        output: &Path,
    ) -> MediaResult<TextShortReport> {
        if cards.is_empty() {
            return Err(MediaError::invalid_input("no text cards"));
        }
        if let Some(card) = cards.iter().find(|c| c.duration_sec <= 0.0) {
            return Err(MediaError::invalid_input(format!(
                "card duration must be positive, got {}",
                card.duration_sec
            )));
        }
        if !voice.exists() {
            return Err(MediaError::FileNotFound(voice.to_path_buf()));
        }
        let voice_duration = get_duration(voice).await?;
        if voice_duration <= 0.0 {
            return Err(MediaError::invalid_input("voice track has zero length"));
        }

        let workspace = JobWorkspace::create(&self.work_dir, output, "text_short").await?;
        let (width, height) = self.options.resolution.dimensions();
        let mut renderer = CardRenderer::new(self.fonts.clone(), self.options.theme, width, height);
        let mut failures = Vec::new();

        let mut clips = Vec::with_capacity(cards.len());
        for (index, card) in cards.iter().enumerate() {
            let (returned, clip) = self.card_clip(renderer, index, card, &workspace).await?;
            renderer = returned;
            clips.push(clip);
        }
        info!(cards = clips.len(), "Rendered animated cards");

        let config = RenderConfig {
            fps: self.options.timing.fps,
            crossfade_sec: self.options.crossfade_sec,
            resolution_class: self.options.resolution,
            ..RenderConfig::vertical()
        };
        let visual = workspace.file("cards_joined.mp4");
        let concat = Concatenator::new(self.runner.clone(), self.encoding.clone(), &config)
            .concat(&clips, self.options.crossfade_sec, &visual, workspace.path())
            .await?;
        failures.extend(concat.failures.iter().cloned());

        let events = if self.options.sfx {
            sfx_schedule(cards, self.options.timing, self.options.crossfade_sec)
        } else {
            Vec::new()
        };
        let mixer = AudioMixer::new(self.runner.clone(), self.encoding.clone());
        let mix = mixer
            .mix(
                voice,
                &events,
                bed.map(|path| (path, self.options.bed_levels)),
                workspace.path(),
            )
            .await?;
        failures.extend(mix.failures.iter().cloned());

        let partial = partial_path(output);
        let cmd = Muxer::new(self.runner.clone(), self.encoding.clone())
            .command(&visual, &mix.path, &partial)
            .duration(voice_duration);
        let result = self.runner.run(&cmd).await;
        finalize_output(result, &partial, output).await?;

        let summary = summarize(output).await?;
        if summary.size_bytes < MIN_OUTPUT_BYTES {
            remove_if_exists(output).await;
            return Err(MediaError::InvalidVideo(format!(
                "text short is only {} bytes",
                summary.size_bytes
            )));
        }
        workspace.cleanup().await;

        info!(
            cards = cards.len(),
            sfx = events.len(),
            size_bytes = summary.size_bytes,
            duration_sec = summary.duration_sec,
            "Text short ready at {}",
            output.display()
        );
        Ok(TextShortReport {
            size_bytes: summary.size_bytes,
            duration_sec: summary.duration_sec,
            cards: cards.len(),
            sfx_events: events.len(),
            join_strategy: concat.strategy.as_str(),
            audio_mixed: mix.mixed,
            failures,
        })
    }

    /// Render and encode one card. The renderer is handed to a blocking
    /// thread for the pixel work and returned with the clip path.
    async fn card_clip(
        &self,
        renderer: CardRenderer,
        index: usize,
        card: &TextCard,
        workspace: &JobWorkspace,
    ) -> MediaResult<(CardRenderer, PathBuf)> {
        let timing = self.options.timing;
        let frames_dir = workspace.subdir(&format!("card_{:02}_frames", index)).await?;

        let owned_card = card.clone();
        let dir = frames_dir.clone();
        let (renderer, rendered) = tokio::task::spawn_blocking(move || {
            let mut renderer = renderer;
            let result = write_card_frames(&mut renderer, &owned_card, timing.fade_frames, &dir);
            (renderer, result)
        })
        .await
        .map_err(|e| MediaError::internal(format!("card render task failed: {}", e)))?;
        rendered?;

        let fps = timing.fps.to_string();
        let mut parts = Vec::with_capacity(2);

        if timing.fade_frames > 0 {
            let fade = workspace.file(format!("card_{:02}_fade.mp4", index));
            let partial = partial_path(&fade);
            let cmd = FfmpegCommand::with_output(&partial)
                .input_with_args(["-framerate", fps.as_str()], frames_dir.join("frame_%05d.png"))
                .output_args(self.encoding.video_args());
            let result = self.runner.run(&cmd).await;
            finalize_output(result, &partial, &fade).await?;
            parts.push((fade, None));
        }

        let hold = workspace.file(format!("card_{:02}_hold.mp4", index));
        let partial = partial_path(&hold);
        let cmd = FfmpegCommand::with_output(&partial)
            .input_with_args(["-loop", "1"], frames_dir.join("full.png"))
            .duration(timing.hold_sec(card.duration_sec))
            .video_filter(format!("fps={}", fps))
            .output_args(self.encoding.video_args());
        let result = self.runner.run(&cmd).await;
        finalize_output(result, &partial, &hold).await?;
        parts.push((hold, None));

        let clip = workspace.file(format!("card_{:02}.mp4", index));
        let list = workspace.file(format!("card_{:02}_concat.txt", index));
        tokio::fs::write(&list, concat_list(&parts)).await?;
        let partial = partial_path(&clip);
        let cmd = FfmpegCommand::with_output(&partial)
            .input_with_args(["-f", "concat", "-safe", "0"], &list)
            .codec_copy();
        let result = self.runner.run(&cmd).await;
        finalize_output(result, &partial, &clip).await?;

        let _ = tokio::fs::remove_dir_all(&frames_dir).await;
        Ok((renderer, clip))
    }
}

/// Write the fade-in frames and the full-opacity frame for `card`.
fn write_card_frames(
    renderer: &mut CardRenderer,
    card: &TextCard,
    fade_frames: u32,
    dir: &Path,
) -> MediaResult<()> {
    for frame in 0..fade_frames {
        renderer
            .render(card, fade_opacity(frame, fade_frames))
            .save(dir.join(format!("frame_{:05}.png", frame)))?;
    }
    renderer.render(card, 255).save(dir.join("full.png"))?;
    Ok(())
}
