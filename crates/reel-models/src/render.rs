//! Render configuration for base-video assembly.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error for unrecognized configuration option values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown value for {option}: {value}")]
pub struct ParseOptionError {
    pub option: &'static str,
    pub value: String,
}

impl ParseOptionError {
    pub fn new(option: &'static str, value: impl Into<String>) -> Self {
        Self {
            option,
            value: value.into(),
        }
    }
}

/// Output resolution class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum ResolutionClass {
    #[default]
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "4k")]
    Uhd4k,
    #[serde(rename = "vertical")]
    Vertical1080,
    #[serde(rename = "vertical-4k")]
    Vertical4k,
}

impl ResolutionClass {
    /// Output frame size (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ResolutionClass::Hd1080 => (1920, 1080),
            ResolutionClass::Uhd4k => (3840, 2160),
            ResolutionClass::Vertical1080 => (1080, 1920),
            ResolutionClass::Vertical4k => (2160, 3840),
        }
    }

    /// Source images are upscaled to at least this width before any motion
    /// is applied, so pans always have headroom.
    pub fn min_source_width(&self) -> u32 {
        match self {
            ResolutionClass::Hd1080 => 2560,
            ResolutionClass::Uhd4k => 4800,
            ResolutionClass::Vertical1080 => 1440,
            ResolutionClass::Vertical4k => 2880,
        }
    }

    pub fn is_vertical(&self) -> bool {
        matches!(self, ResolutionClass::Vertical1080 | ResolutionClass::Vertical4k)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionClass::Hd1080 => "1080p",
            ResolutionClass::Uhd4k => "4k",
            ResolutionClass::Vertical1080 => "vertical",
            ResolutionClass::Vertical4k => "vertical-4k",
        }
    }
}

impl fmt::Display for ResolutionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionClass {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "1080p" | "hd" => Ok(ResolutionClass::Hd1080),
            "4k" | "2160p" => Ok(ResolutionClass::Uhd4k),
            "vertical" | "vertical-1080p" | "1080x1920" => Ok(ResolutionClass::Vertical1080),
            "vertical-4k" | "2160x3840" => Ok(ResolutionClass::Vertical4k),
            _ => Err(ParseOptionError::new("resolution_class", s)),
        }
    }
}

/// Horizontal window used when cropping 16:9 sources to 9:16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CropStrategy {
    #[default]
    Center,
    #[serde(alias = "left_third")]
    LeftThird,
    #[serde(alias = "right_third")]
    RightThird,
}

impl CropStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CropStrategy::Center => "center",
            CropStrategy::LeftThird => "left-third",
            CropStrategy::RightThird => "right-third",
        }
    }
}

impl fmt::Display for CropStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CropStrategy {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "center" | "centre" => Ok(CropStrategy::Center),
            "left-third" | "left" => Ok(CropStrategy::LeftThird),
            "right-third" | "right" => Ok(CropStrategy::RightThird),
            _ => Err(ParseOptionError::new("crop_strategy", s)),
        }
    }
}

/// Named motion preset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MotionSetKind {
    /// Gentle pan/zoom for landscape narration videos
    #[default]
    Landscape,
    /// Faster, steeper motion for short-form portrait video
    Vertical,
    /// Barely perceptible drift for long ambient videos
    Ambient,
}

impl MotionSetKind {
    /// Preset matching a resolution class.
    pub fn for_resolution(resolution: ResolutionClass) -> Self {
        if resolution.is_vertical() {
            MotionSetKind::Vertical
        } else {
            MotionSetKind::Landscape
        }
    }
}

impl FromStr for MotionSetKind {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "landscape" => Ok(MotionSetKind::Landscape),
            "vertical" => Ok(MotionSetKind::Vertical),
            "ambient" => Ok(MotionSetKind::Ambient),
            _ => Err(ParseOptionError::new("motion_set", s)),
        }
    }
}

/// Default seconds per image for landscape narration videos.
pub const DEFAULT_SEGMENT_DURATION: f64 = 8.0;
/// Default crossfade between segments.
pub const DEFAULT_CROSSFADE: f64 = 0.5;
/// Default output frame rate.
pub const DEFAULT_FPS: u32 = 30;
/// Segment counts above this are crossfaded in batches.
pub const DEFAULT_BATCH_THRESHOLD: usize = 20;
/// Segments per crossfade batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Configuration carried by a base-video render job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderConfig {
    /// Seconds each image is shown
    #[serde(default = "default_segment_duration")]
    pub segment_duration_sec: f64,
    /// Crossfade between segments in seconds (0 disables)
    #[serde(default = "default_crossfade")]
    pub crossfade_sec: f64,
    /// Output resolution class
    #[serde(default)]
    pub resolution_class: ResolutionClass,
    /// Output frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Segment count above which crossfades are batched
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: usize,
    /// Segments per crossfade batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Motion preset table; derived from the resolution class when absent
    #[serde(default)]
    pub motion_set: Option<MotionSetKind>,
}

fn default_segment_duration() -> f64 {
    DEFAULT_SEGMENT_DURATION
}
fn default_crossfade() -> f64 {
    DEFAULT_CROSSFADE
}
fn default_fps() -> u32 {
    DEFAULT_FPS
}
fn default_batch_threshold() -> usize {
    DEFAULT_BATCH_THRESHOLD
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            segment_duration_sec: DEFAULT_SEGMENT_DURATION,
            crossfade_sec: DEFAULT_CROSSFADE,
            resolution_class: ResolutionClass::default(),
            fps: DEFAULT_FPS,
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            batch_size: DEFAULT_BATCH_SIZE,
            motion_set: None,
        }
    }
}

impl RenderConfig {
    /// Portrait short-form defaults: 4s segments, 0.3s crossfade.
    pub fn vertical() -> Self {
        Self {
            segment_duration_sec: 4.0,
            crossfade_sec: 0.3,
            resolution_class: ResolutionClass::Vertical1080,
            ..Default::default()
        }
    }

    /// Long-form ambient defaults: 2 minute segments at 24fps, no crossfade.
    pub fn ambient() -> Self {
        Self {
            segment_duration_sec: 120.0,
            crossfade_sec: 0.0,
            fps: 24,
            motion_set: Some(MotionSetKind::Ambient),
            ..Default::default()
        }
    }

    /// Art slideshow defaults: ambient motion at 4k, joined without
    /// transitions.
    pub fn slideshow() -> Self {
        Self {
            resolution_class: ResolutionClass::Uhd4k,
            ..Self::ambient()
        }
    }

    /// Effective motion preset table.
    pub fn motion_set_kind(&self) -> MotionSetKind {
        self.motion_set
            .unwrap_or_else(|| MotionSetKind::for_resolution(self.resolution_class))
    }

    /// Duration of one frame in seconds.
    pub fn frame_interval(&self) -> f64 {
        1.0 / f64::from(self.fps.max(1))
    }
}

/// A `render` block as written by hand: every field optional.
///
/// Fields left out keep the value of the preset the block is laid over, so
/// a partial block on a vertical job stays vertical.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RenderOverrides {
    pub segment_duration_sec: Option<f64>,
    pub crossfade_sec: Option<f64>,
    pub resolution_class: Option<ResolutionClass>,
    pub fps: Option<u32>,
    pub batch_threshold: Option<usize>,
    pub batch_size: Option<usize>,
    pub motion_set: Option<MotionSetKind>,
}

impl RenderOverrides {
    /// Lay these values over `preset`.
    pub fn apply(self, preset: RenderConfig) -> RenderConfig {
        RenderConfig {
            segment_duration_sec: self.segment_duration_sec.unwrap_or(preset.segment_duration_sec),
            crossfade_sec: self.crossfade_sec.unwrap_or(preset.crossfade_sec),
            resolution_class: self.resolution_class.unwrap_or(preset.resolution_class),
            fps: self.fps.unwrap_or(preset.fps),
            batch_threshold: self.batch_threshold.unwrap_or(preset.batch_threshold),
            batch_size: self.batch_size.unwrap_or(preset.batch_size),
            motion_set: self.motion_set.or(preset.motion_set),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_parsing() {
        assert_eq!("1080p".parse::<ResolutionClass>().unwrap(), ResolutionClass::Hd1080);
        assert_eq!("4K".parse::<ResolutionClass>().unwrap(), ResolutionClass::Uhd4k);
        assert_eq!("vertical".parse::<ResolutionClass>().unwrap().dimensions(), (1080, 1920));
        assert!("720p".parse::<ResolutionClass>().is_err());
    }

    #[test]
    fn test_crop_strategy_parsing() {
        assert_eq!("left_third".parse::<CropStrategy>().unwrap(), CropStrategy::LeftThird);
        assert_eq!("right-third".parse::<CropStrategy>().unwrap(), CropStrategy::RightThird);
        assert_eq!(CropStrategy::default(), CropStrategy::Center);
    }

    #[test]
    fn test_motion_set_follows_resolution() {
        let config = RenderConfig::vertical();
        assert_eq!(config.motion_set_kind(), MotionSetKind::Vertical);
        assert_eq!(RenderConfig::default().motion_set_kind(), MotionSetKind::Landscape);
        assert_eq!(RenderConfig::ambient().motion_set_kind(), MotionSetKind::Ambient);
        assert_eq!(RenderConfig::slideshow().motion_set_kind(), MotionSetKind::Ambient);
        assert_eq!(RenderConfig::slideshow().resolution_class, ResolutionClass::Uhd4k);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: RenderConfig =
            serde_json::from_str(r#"{"crossfade_sec":0,"resolution_class":"4k"}"#).unwrap();
        assert_eq!(config.crossfade_sec, 0.0);
        assert_eq!(config.resolution_class, ResolutionClass::Uhd4k);
        assert_eq!(config.batch_threshold, 20);
        assert_eq!(config.fps, 30);
    }

    #[test]
    fn test_overrides_keep_preset_fields() {
        let overrides: RenderOverrides =
            serde_json::from_str(r#"{"resolution_class":"4k"}"#).unwrap();
        let config = overrides.apply(RenderConfig::ambient());
        assert_eq!(config.resolution_class, ResolutionClass::Uhd4k);
        assert_eq!(config.segment_duration_sec, 120.0);
        assert_eq!(config.crossfade_sec, 0.0);
        assert_eq!(config.fps, 24);
        assert_eq!(config.motion_set_kind(), MotionSetKind::Ambient);

        let overrides: RenderOverrides = serde_json::from_str(r#"{"crossfade_sec":0.2}"#).unwrap();
        let config = overrides.apply(RenderConfig::vertical());
        assert_eq!(config.resolution_class, ResolutionClass::Vertical1080);
        assert_eq!(config.segment_duration_sec, 4.0);
        assert_eq!(config.crossfade_sec, 0.2);
    }
}
