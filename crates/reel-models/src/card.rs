//! Animated text-card definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const WHITE: Rgb = Rgb([255, 255, 255]);
    pub const BLACK: Rgb = Rgb([0, 0, 0]);
    pub const GOLD: Rgb = Rgb([255, 215, 0]);
    pub const GREEN: Rgb = Rgb([0, 230, 118]);
    pub const RED: Rgb = Rgb([255, 80, 80]);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Linear interpolation towards `other` (t in 0..=1).
    pub fn lerp(&self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
        Rgb([
            mix(self.0[0], other.0[0]),
            mix(self.0[1], other.0[1]),
            mix(self.0[2], other.0[2]),
        ])
    }
}

/// One text block on a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CardLine {
    pub text: String,
    /// Font size in pixels
    pub size: u32,
    #[serde(default = "default_line_color")]
    pub color: Rgb,
    #[serde(default)]
    pub bold: bool,
}

fn default_line_color() -> Rgb {
    Rgb::WHITE
}

impl CardLine {
    pub fn new(text: impl Into<String>, size: u32, color: Rgb, bold: bool) -> Self {
        Self {
            text: text.into(),
            size,
            color,
            bold,
        }
    }
}

/// A full-frame text panel shown for a fixed duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextCard {
    pub duration_sec: f64,
    pub lines: Vec<CardLine>,
    /// Play the reveal impact sound shortly after the card appears
    #[serde(default, alias = "impact")]
    pub triggers_impact_sfx: bool,
}

/// Visual template shared by all cards in one short.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CardTheme {
    pub bg_top: Rgb,
    pub bg_bottom: Rgb,
    /// Accent bar colour; text in this colour also gets the glow treatment
    pub accent: Rgb,
}

impl Default for CardTheme {
    fn default() -> Self {
        Self {
            bg_top: Rgb::new(16, 25, 34),
            bg_bottom: Rgb::new(10, 16, 24),
            accent: Rgb::new(232, 148, 31),
        }
    }
}

impl CardTheme {
    /// Whether text in `color` is drawn with a glow.
    pub fn is_highlight(&self, color: Rgb) -> bool {
        color == self.accent || matches!(color, Rgb::GOLD | Rgb::GREEN | Rgb::RED)
    }
}
