//! Shared data models for the reel media engine.
//!
//! This crate provides Serde-serializable types for:
//! - Word timestamps and caption segments
//! - Animated text cards
//! - Render configuration (resolution classes, crop strategies, motion sets)
//! - Encoding configuration
//! - Job identifiers and outcomes

pub mod caption;
pub mod card;
pub mod encoding;
pub mod job;
pub mod render;

// Re-export common types
pub use caption::{CaptionPosition, CaptionSegment, CaptionStyle, Word};
pub use card::{CardLine, CardTheme, Rgb, TextCard};
pub use encoding::{EncodingConfig, RateCap};
pub use job::{JobId, JobOutcome};
pub use render::{
    CropStrategy, MotionSetKind, ParseOptionError, RenderConfig, RenderOverrides,
    ResolutionClass,
};
