//! Word timestamps and caption segment definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::render::ParseOptionError;

/// A single spoken word with its time span in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Word {
    /// The word as displayed (whitespace stripped)
    #[serde(alias = "word")]
    pub text: String,
    /// Start time in seconds
    #[serde(alias = "start")]
    pub start_sec: f64,
    /// End time in seconds (>= start)
    #[serde(alias = "end")]
    pub end_sec: f64,
}

impl Word {
    pub fn new(text: impl Into<String>, start_sec: f64, end_sec: f64) -> Self {
        Self {
            text: text.into(),
            start_sec,
            end_sec,
        }
    }

    /// Duration of the word in seconds.
    pub fn duration(&self) -> f64 {
        (self.end_sec - self.start_sec).max(0.0)
    }
}

/// A display-ready, time-bounded unit of on-screen text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionSegment {
    /// Joined display text
    pub display_text: String,
    /// Individual words in display order
    pub words: Vec<String>,
    /// Index of the highlighted word, -1 when nothing is highlighted
    pub highlight_index: i32,
    /// Segment start in seconds
    pub start_sec: f64,
    /// Segment end in seconds (exclusive)
    pub end_sec: f64,
}

impl CaptionSegment {
    /// Whether the segment is shown at `timestamp`.
    ///
    /// Start is inclusive and end is exclusive, so adjacent segments never
    /// both claim the same frame.
    pub fn is_active_at(&self, timestamp: f64) -> bool {
        self.start_sec <= timestamp && timestamp < self.end_sec
    }

    /// Highlighted word position, if any.
    pub fn highlight(&self) -> Option<usize> {
        usize::try_from(self.highlight_index)
            .ok()
            .filter(|&i| i < self.words.len())
    }

    pub fn duration(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

/// Caption presentation styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CaptionStyle {
    /// Fixed-size word groups; one segment per word with the word highlighted
    #[default]
    #[serde(alias = "capcut")]
    GroupedHighlight,
    /// Larger static subtitle groups without highlight
    #[serde(alias = "minimal")]
    Subtitle,
    /// One segment per word
    #[serde(alias = "karaoke")]
    PerWord,
}

impl CaptionStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionStyle::GroupedHighlight => "grouped-highlight",
            CaptionStyle::Subtitle => "subtitle",
            CaptionStyle::PerWord => "per-word",
        }
    }

    /// Styles whose segments each carry a highlighted word.
    pub fn is_highlighted(&self) -> bool {
        matches!(self, CaptionStyle::GroupedHighlight | CaptionStyle::PerWord)
    }
}

impl fmt::Display for CaptionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptionStyle {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "grouped-highlight" | "capcut" => Ok(CaptionStyle::GroupedHighlight),
            "subtitle" | "minimal" => Ok(CaptionStyle::Subtitle),
            "per-word" | "karaoke" => Ok(CaptionStyle::PerWord),
            _ => Err(ParseOptionError::new("caption_style", s)),
        }
    }
}

/// Vertical anchor for burned-in captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionPosition {
    Top,
    #[default]
    Center,
    Bottom,
}

impl CaptionPosition {
    /// Fraction of frame height where the caption block starts.
    ///
    /// Subtitle styling sits in the lower third unless explicitly placed at
    /// the top.
    pub fn y_fraction(&self, style: CaptionStyle) -> f32 {
        match (self, style) {
            (CaptionPosition::Top, _) => 0.20,
            (CaptionPosition::Bottom, _) => 0.80,
            (CaptionPosition::Center, CaptionStyle::Subtitle) => 0.80,
            (CaptionPosition::Center, _) => 0.65,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionPosition::Top => "top",
            CaptionPosition::Center => "center",
            CaptionPosition::Bottom => "bottom",
        }
    }
}

impl fmt::Display for CaptionPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptionPosition {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top" => Ok(CaptionPosition::Top),
            "center" | "centre" => Ok(CaptionPosition::Center),
            "bottom" => Ok(CaptionPosition::Bottom),
            _ => Err(ParseOptionError::new("caption_position", s)),
        }
    }
}
