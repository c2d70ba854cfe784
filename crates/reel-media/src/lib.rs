#![deny(unreachable_patterns)]
//! FFmpeg-driven media engine for narrated image videos.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with per-process timeouts
//! - Ken Burns motion presets and segment rendering
//! - Crossfade concatenation with batching and direct-join fallbacks
//! - Audio/video muxing and single-pass audio bed mixing
//! - Caption segmentation and a frame-pipe compositor for burned-in text
//! - Animated text-card shorts, vertical crops and clip extraction
//! - Long-form ambient videos and art slideshows

pub mod assembly;
pub mod audio;
pub mod captions;
pub mod cards;
pub mod clip;
pub mod command;
pub mod compositor;
pub mod concat;
pub mod error;
pub mod fs_utils;
pub mod metrics;
pub mod motion;
pub mod mux;
pub mod probe;
pub mod progress;
pub mod segment;
pub mod text;
pub mod vertical;
pub mod workspace;

pub use assembly::{Assembler, AssemblyReport};
pub use audio::{AudioMixer, BedLevels, MixOutcome, SfxEvent, SfxKind};
pub use captions::{estimate_word_timestamps, segment_words, CaptionTimeline};
pub use cards::{TextShortOptions, TextShortProducer, TextShortReport};
pub use clip::{ClipExtractor, ClipReport};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compositor::{CompositeReport, Compositor, FrameOverlay, FrameStats, HookOverlay};
pub use concat::{ConcatReport, Concatenator, JoinStrategy};
pub use error::{MediaError, MediaResult, StrategyFailure};
pub use motion::{Motion, MotionPlan, MotionSet};
pub use mux::{MuxSummary, Muxer};
pub use probe::{get_duration, probe_media, probe_video, MediaInfo, VideoInfo};
pub use progress::FfmpegProgress;
pub use segment::{plan_segments, Segment, SegmentRenderer};
pub use text::FontSet;
pub use vertical::{CropReport, VerticalCropper};
pub use workspace::JobWorkspace;
