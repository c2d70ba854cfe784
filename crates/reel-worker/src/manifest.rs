//! JSON job manifests.
//!
//! A manifest names one operation, its inputs, the output path and the
//! options for that operation. Anything left out takes the default for the
//! operation kind. A partial `render` block is laid over the kind's preset,
//! so the example below stays a 1080x1920 video with 4s segments.
//!
//! ```json
//! {
//!   "kind": "vertical",
//!   "output": "out/short.mp4",
//!   "audio": "voice.mp3",
//!   "images": ["broll_01.png", "broll_02.png"],
//!   "render": { "crossfade_sec": 0.3 }
//! }
//! ```

use reel_media::audio::BedLevels;
use reel_media::captions::DEFAULT_GROUP_SIZE;
use reel_media::cards::{CardTiming, TextShortOptions};
use reel_media::HookOverlay;
use reel_models::{
    CaptionPosition, CaptionStyle, CardTheme, CropStrategy, EncodingConfig, JobId,
    RenderConfig, RenderOverrides, ResolutionClass, TextCard, Word,
};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{WorkerError, WorkerResult};

/// One job for the worker.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobManifest {
    /// Generated when absent
    #[serde(default)]
    pub job_id: JobId,
    pub output: PathBuf,
    /// Replaces the encoder profile chosen for the job kind
    #[serde(default)]
    pub encoding: Option<EncodingConfig>,
    #[serde(flatten)]
    pub job: JobKind,
}

/// The operation a manifest asks for.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// Landscape narration video from stills and a voice track
    Broll {
        audio: PathBuf,
        images: Vec<PathBuf>,
        #[serde(default, deserialize_with = "landscape_render")]
        #[schemars(with = "RenderOverrides")]
        render: RenderConfig,
    },
    /// Portrait narration video
    Vertical {
        audio: PathBuf,
        images: Vec<PathBuf>,
        #[serde(default = "RenderConfig::vertical", deserialize_with = "vertical_render")]
        #[schemars(with = "RenderOverrides")]
        render: RenderConfig,
    },
    /// Long-form video with the audio looped under it
    Ambient {
        audio: PathBuf,
        images: Vec<PathBuf>,
        target_duration_sec: f64,
        #[serde(default = "RenderConfig::ambient", deserialize_with = "ambient_render")]
        #[schemars(with = "RenderOverrides")]
        render: RenderConfig,
    },
    /// Artwork shown one piece at a time with slow drift, optional music
    Slideshow {
        images: Vec<PathBuf>,
        #[serde(default = "default_seconds_per_image")]
        seconds_per_image: f64,
        /// Music looped quietly under the whole slideshow
        #[serde(default)]
        music: Option<PathBuf>,
        #[serde(default = "default_music_volume")]
        music_volume: f64,
        #[serde(default = "RenderConfig::slideshow", deserialize_with = "slideshow_render")]
        #[schemars(with = "RenderOverrides")]
        render: RenderConfig,
    },
    /// Burn captions into an existing video
    Captions {
        video: PathBuf,
        /// Word timings; estimated from `script` when empty
        #[serde(default)]
        words: Vec<Word>,
        #[serde(default)]
        script: Option<String>,
        #[serde(default)]
        caption_style: CaptionStyle,
        #[serde(default)]
        caption_position: CaptionPosition,
        #[serde(default = "default_group_size")]
        group_size: usize,
    },
    /// Animated text cards over a voice track
    TextShort {
        voice: PathBuf,
        cards: Vec<TextCard>,
        /// Background music bed
        #[serde(default)]
        bed: Option<PathBuf>,
        #[serde(default)]
        options: TextShortSettings,
    },
    /// Crop a landscape video to portrait
    CropVertical {
        video: PathBuf,
        #[serde(default)]
        crop_strategy: CropStrategy,
        #[serde(default = "vertical_resolution")]
        resolution_class: ResolutionClass,
    },
    /// Cut a time range out of a longer video
    ExtractClip {
        video: PathBuf,
        start_sec: f64,
        end_sec: f64,
    },
    /// Burn a headline into the opening seconds of a video
    HookOverlay {
        video: PathBuf,
        text: String,
        #[serde(default = "default_hook_duration")]
        duration_sec: f64,
    },
}

/// Largest font size accepted on a text card line.
pub const MAX_CARD_FONT_SIZE: u32 = 400;

/// Seconds each artwork stays on screen.
pub const DEFAULT_SECONDS_PER_IMAGE: f64 = 600.0;

fn landscape_render<'de, D: Deserializer<'de>>(d: D) -> Result<RenderConfig, D::Error> {
    Ok(RenderOverrides::deserialize(d)?.apply(RenderConfig::default()))
}
fn vertical_render<'de, D: Deserializer<'de>>(d: D) -> Result<RenderConfig, D::Error> {
    Ok(RenderOverrides::deserialize(d)?.apply(RenderConfig::vertical()))
}
fn ambient_render<'de, D: Deserializer<'de>>(d: D) -> Result<RenderConfig, D::Error> {
    Ok(RenderOverrides::deserialize(d)?.apply(RenderConfig::ambient()))
}
fn slideshow_render<'de, D: Deserializer<'de>>(d: D) -> Result<RenderConfig, D::Error> {
    Ok(RenderOverrides::deserialize(d)?.apply(RenderConfig::slideshow()))
}

fn default_seconds_per_image() -> f64 {
    DEFAULT_SECONDS_PER_IMAGE
}
fn default_music_volume() -> f64 {
    BedLevels::ART_MUSIC.volume
}
fn default_group_size() -> usize {
    DEFAULT_GROUP_SIZE
}
fn vertical_resolution() -> ResolutionClass {
    ResolutionClass::Vertical1080
}
fn default_hook_duration() -> f64 {
    HookOverlay::DEFAULT_DURATION_SEC
}

/// Text-short look and pacing as written in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TextShortSettings {
    pub resolution_class: ResolutionClass,
    pub fps: u32,
    pub fade_frames: u32,
    pub crossfade_sec: f64,
    pub sfx: bool,
    pub theme: CardTheme,
    pub bed_volume: f64,
    pub bed_fade_in_sec: f64,
    pub bed_fade_out_sec: f64,
}

impl Default for TextShortSettings {
    fn default() -> Self {
        let options = TextShortOptions::default();
        Self {
            resolution_class: options.resolution,
            fps: options.timing.fps,
            fade_frames: options.timing.fade_frames,
            crossfade_sec: options.crossfade_sec,
            sfx: options.sfx,
            theme: options.theme,
            bed_volume: options.bed_levels.volume,
            bed_fade_in_sec: options.bed_levels.fade_in_sec,
            bed_fade_out_sec: options.bed_levels.fade_out_sec,
        }
    }
}

impl TextShortSettings {
    pub fn to_options(&self) -> TextShortOptions {
        TextShortOptions {
            resolution: self.resolution_class,
            timing: CardTiming {
                fps: self.fps,
                fade_frames: self.fade_frames,
            },
            crossfade_sec: self.crossfade_sec,
            sfx: self.sfx,
            theme: self.theme,
            bed_levels: BedLevels {
                volume: self.bed_volume,
                fade_in_sec: self.bed_fade_in_sec,
                fade_out_sec: self.bed_fade_out_sec,
            },
        }
    }
}

impl JobManifest {
    /// Read and validate a manifest file.
    pub async fn load(path: &Path) -> WorkerResult<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let manifest: JobManifest = serde_json::from_str(&raw)
            .map_err(|e| WorkerError::invalid_manifest(path, e.to_string()))?;
        manifest
            .validate()
            .map_err(|message| WorkerError::invalid_manifest(path, message))?;
        Ok(manifest)
    }

    pub fn kind_name(&self) -> &'static str {
        self.job.name()
    }

    /// Encoder profile for the job: the manifest override, else the profile
    /// matching the job kind.
    pub fn encoding(&self) -> EncodingConfig {
        if let Some(encoding) = &self.encoding {
            return encoding.clone();
        }
        match &self.job {
            JobKind::Broll { .. } => EncodingConfig::default(),
            JobKind::Ambient { render, .. } | JobKind::Slideshow { render, .. } => {
                EncodingConfig::for_ambient(render.resolution_class == ResolutionClass::Uhd4k)
            }
            _ => EncodingConfig::for_shorts(),
        }
    }

    /// Check option values that no engine stage can recover from.
    pub fn validate(&self) -> Result<(), String> {
        if self.output.as_os_str().is_empty() {
            return Err("output path is empty".to_string());
        }
        if let Some(encoding) = &self.encoding {
            if encoding.crf > 51 {
                return Err(format!("crf must be 0-51, got {}", encoding.crf));
            }
        }

        match &self.job {
            JobKind::Broll { render, .. } => validate_render(render),
            JobKind::Vertical { render, .. } => {
                if !render.resolution_class.is_vertical() {
                    return Err(format!(
                        "{} is not a vertical resolution",
                        render.resolution_class
                    ));
                }
                validate_render(render)
            }
            JobKind::Ambient {
                render,
                target_duration_sec,
                ..
            } => {
                if *target_duration_sec <= 0.0 {
                    return Err("target_duration_sec must be positive".to_string());
                }
                validate_render(render)
            }
            JobKind::Slideshow {
                seconds_per_image,
                music_volume,
                render,
                ..
            } => {
                if *seconds_per_image <= 0.0 {
                    return Err("seconds_per_image must be positive".to_string());
                }
                if !(0.0..=1.0).contains(music_volume) {
                    return Err(format!("music_volume must be 0-1, got {}", music_volume));
                }
                validate_render(render)
            }
            JobKind::ExtractClip {
                start_sec, end_sec, ..
            } => {
                if *start_sec < 0.0 {
                    return Err("start_sec must not be negative".to_string());
                }
                if end_sec <= start_sec {
                    return Err("end_sec must be after start_sec".to_string());
                }
                Ok(())
            }
            JobKind::Captions {
                words,
                script,
                group_size,
                ..
            } => {
                let has_script = script.as_deref().is_some_and(|s| !s.trim().is_empty());
                if words.is_empty() && !has_script {
                    return Err("captions need words or a script".to_string());
                }
                if *group_size == 0 {
                    return Err("group_size must be at least 1".to_string());
                }
                Ok(())
            }
            JobKind::TextShort { cards, options, .. } => {
                if cards.is_empty() {
                    return Err("text short has no cards".to_string());
                }
                if let Some(line) = cards
                    .iter()
                    .flat_map(|card| &card.lines)
                    .find(|line| line.size == 0 || line.size > MAX_CARD_FONT_SIZE)
                {
                    return Err(format!(
                        "card line \"{}\" has size {}, expected 1-{}",
                        line.text, line.size, MAX_CARD_FONT_SIZE
                    ));
                }
                if options.fps == 0 {
                    return Err("fps must be positive".to_string());
                }
                if options.crossfade_sec < 0.0 {
                    return Err("crossfade_sec must not be negative".to_string());
                }
                Ok(())
            }
            JobKind::CropVertical {
                resolution_class, ..
            } => {
                if !resolution_class.is_vertical() {
                    return Err(format!("{} is not a vertical resolution", resolution_class));
                }
                Ok(())
            }
            JobKind::HookOverlay {
                text, duration_sec, ..
            } => {
                if text.trim().is_empty() {
                    return Err("hook text is empty".to_string());
                }
                if *duration_sec <= 0.0 {
                    return Err("hook duration_sec must be positive".to_string());
                }
                Ok(())
            }
        }
    }
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Broll { .. } => "broll",
            JobKind::Vertical { .. } => "vertical",
            JobKind::Ambient { .. } => "ambient",
            JobKind::Slideshow { .. } => "slideshow",
            JobKind::ExtractClip { .. } => "extract_clip",
            JobKind::Captions { .. } => "captions",
            JobKind::TextShort { .. } => "text_short",
            JobKind::CropVertical { .. } => "crop_vertical",
            JobKind::HookOverlay { .. } => "hook_overlay",
        }
    }
}

fn validate_render(render: &RenderConfig) -> Result<(), String> {
    if render.segment_duration_sec <= 0.0 {
        return Err("segment_duration_sec must be positive".to_string());
    }
    if render.crossfade_sec < 0.0 {
        return Err("crossfade_sec must not be negative".to_string());
    }
    if render.fps == 0 {
        return Err("fps must be positive".to_string());
    }
    if render.batch_size == 0 {
        return Err("batch_size must be at least 1".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::MotionSetKind;
    use tempfile::TempDir;

    fn parse(json: &str) -> JobManifest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_kind_defaults() {
        let manifest = parse(
            r#"{"kind":"vertical","output":"out.mp4","audio":"voice.mp3","images":["a.png"]}"#,
        );
        assert_eq!(manifest.kind_name(), "vertical");
        match &manifest.job {
            JobKind::Vertical { render, .. } => {
                assert_eq!(render.resolution_class, ResolutionClass::Vertical1080);
                assert_eq!(render.crossfade_sec, 0.3);
            }
            other => panic!("unexpected job {:?}", other),
        }
        assert_eq!(manifest.encoding(), EncodingConfig::for_shorts());
        assert!(manifest.validate().is_ok());
    }

    fn render_of(manifest: &JobManifest) -> &RenderConfig {
        match &manifest.job {
            JobKind::Broll { render, .. }
            | JobKind::Vertical { render, .. }
            | JobKind::Ambient { render, .. }
            | JobKind::Slideshow { render, .. } => render,
            other => panic!("unexpected job {:?}", other),
        }
    }

    #[test]
    fn test_partial_render_block_keeps_vertical_preset() {
        let manifest = parse(
            r#"{"kind":"vertical","output":"out/short.mp4","audio":"voice.mp3",
                "images":["broll_01.png","broll_02.png"],"render":{"crossfade_sec":0.3}}"#,
        );
        let render = render_of(&manifest);
        assert_eq!(render.resolution_class, ResolutionClass::Vertical1080);
        assert_eq!(render.segment_duration_sec, 4.0);
        assert_eq!(render.motion_set_kind(), MotionSetKind::Vertical);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_partial_render_block_keeps_ambient_preset() {
        let manifest = parse(
            r#"{"kind":"ambient","output":"rain.mp4","audio":"rain.mp3","images":["a.png"],
                "target_duration_sec":3600,"render":{"resolution_class":"4k"}}"#,
        );
        let render = render_of(&manifest);
        assert_eq!(render.resolution_class, ResolutionClass::Uhd4k);
        assert_eq!(render.segment_duration_sec, 120.0);
        assert_eq!(render.crossfade_sec, 0.0);
        assert_eq!(render.fps, 24);
        assert_eq!(render.motion_set_kind(), MotionSetKind::Ambient);
        assert_eq!(manifest.encoding().crf, 26);
    }

    #[test]
    fn test_vertical_job_rejects_landscape_resolution() {
        let manifest = parse(
            r#"{"kind":"vertical","output":"v.mp4","audio":"a.mp3","images":["a.png"],
                "render":{"resolution_class":"1080p"}}"#,
        );
        let err = manifest.validate().unwrap_err();
        assert!(err.contains("1080p"), "{}", err);
    }

    #[test]
    fn test_render_round_trips_through_json() {
        let manifest = parse(
            r#"{"kind":"vertical","output":"v.mp4","audio":"a.mp3","images":["a.png"],
                "render":{"fps":60}}"#,
        );
        let again: JobManifest = serde_json::from_value(serde_json::to_value(&manifest).unwrap()).unwrap();
        assert_eq!(render_of(&again), render_of(&manifest));
        assert_eq!(render_of(&again).fps, 60);
    }

    #[test]
    fn test_slideshow_defaults() {
        let manifest = parse(
            r#"{"kind":"slideshow","output":"gallery.mp4","images":["monet.jpg","turner.jpg"],
                "music":"nocturne.mp3"}"#,
        );
        let JobKind::Slideshow {
            seconds_per_image,
            music,
            music_volume,
            render,
            ..
        } = &manifest.job
        else {
            panic!("expected slideshow");
        };
        assert_eq!(*seconds_per_image, DEFAULT_SECONDS_PER_IMAGE);
        assert_eq!(music.as_deref(), Some(Path::new("nocturne.mp3")));
        assert_eq!(*music_volume, 0.15);
        assert_eq!(*render, RenderConfig::slideshow());
        assert_eq!(manifest.encoding(), EncodingConfig::for_ambient(true));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_extract_clip_range_checks() {
        let ok = parse(
            r#"{"kind":"extract_clip","output":"c.mp4","video":"talk.mp4","start_sec":12,"end_sec":42}"#,
        );
        assert!(ok.validate().is_ok());
        assert_eq!(ok.encoding(), EncodingConfig::for_shorts());

        let backwards = parse(
            r#"{"kind":"extract_clip","output":"c.mp4","video":"talk.mp4","start_sec":42,"end_sec":12}"#,
        );
        assert!(backwards.validate().is_err());
    }

    #[test]
    fn test_caption_options_accept_legacy_names() {
        let manifest = parse(
            r#"{"kind":"captions","output":"c.mp4","video":"in.mp4","script":"hello there",
                "caption_style":"karaoke","caption_position":"top"}"#,
        );
        match &manifest.job {
            JobKind::Captions {
                caption_style,
                caption_position,
                group_size,
                ..
            } => {
                assert_eq!(*caption_style, CaptionStyle::PerWord);
                assert_eq!(*caption_position, CaptionPosition::Top);
                assert_eq!(*group_size, DEFAULT_GROUP_SIZE);
            }
            other => panic!("unexpected job {:?}", other),
        }
    }

    #[test]
    fn test_encoding_override_wins() {
        let manifest = parse(
            r#"{"kind":"hook_overlay","output":"h.mp4","video":"in.mp4","text":"Wait for it",
                "encoding":{"crf":28}}"#,
        );
        assert_eq!(manifest.encoding().crf, 28);
        assert_eq!(manifest.encoding().codec, "libx264");
        match &manifest.job {
            JobKind::HookOverlay { duration_sec, .. } => assert_eq!(*duration_sec, 2.5),
            other => panic!("unexpected job {:?}", other),
        }
    }

    #[test]
    fn test_text_short_settings_map_to_options() {
        let manifest = parse(
            r#"{"kind":"text_short","output":"t.mp4","voice":"v.wav",
                "cards":[{"duration_sec":3,"lines":[{"text":"Hi","size":96,"color":[255,255,255],"bold":true}],"impact":true}],
                "options":{"crossfade_sec":0.25,"sfx":false,"bed_volume":0.1}}"#,
        );
        let JobKind::TextShort { options, cards, .. } = &manifest.job else {
            panic!("expected text short");
        };
        assert!(cards[0].triggers_impact_sfx);
        let options = options.to_options();
        assert_eq!(options.crossfade_sec, 0.25);
        assert!(!options.sfx);
        assert_eq!(options.bed_levels.volume, 0.1);
        assert_eq!(options.bed_levels.fade_in_sec, 2.0);
        assert_eq!(options.timing, CardTiming::default());
    }

    #[test]
    fn test_validation_rejects_bad_options() {
        let cases = [
            r#"{"kind":"captions","output":"c.mp4","video":"in.mp4"}"#,
            r#"{"kind":"crop_vertical","output":"c.mp4","video":"in.mp4","resolution_class":"1080p"}"#,
            r#"{"kind":"hook_overlay","output":"h.mp4","video":"in.mp4","text":"  "}"#,
            r#"{"kind":"broll","output":"b.mp4","audio":"a.mp3","images":[],"render":{"fps":0}}"#,
            r#"{"kind":"text_short","output":"t.mp4","voice":"v.wav","cards":[]}"#,
            r#"{"kind":"slideshow","output":"s.mp4","images":["a.png"],"seconds_per_image":0}"#,
            r#"{"kind":"slideshow","output":"s.mp4","images":["a.png"],"music_volume":1.5}"#,
            r#"{"kind":"text_short","output":"t.mp4","voice":"v.wav",
                "cards":[{"duration_sec":3,"lines":[{"text":"Hi","size":4294967295}]}]}"#,
        ];
        for json in cases {
            assert!(parse(json).validate().is_err(), "{}", json);
        }
    }

    #[tokio::test]
    async fn test_load_reports_path_on_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.json");
        tokio::fs::write(&path, r#"{"kind":"storyboard","output":"x.mp4"}"#)
            .await
            .unwrap();

        let err = JobManifest::load(&path).await.unwrap_err();
        assert!(matches!(err, WorkerError::InvalidManifest { .. }));
        assert!(err.to_string().contains("job.json"));
    }
}
