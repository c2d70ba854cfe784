//! Caption segmentation engine.
//!
//! Pure functions only: word timing estimation, segmentation per caption
//! style, and the sorted timeline the compositor queries per frame.

mod estimate;
mod segmenter;
mod timeline;

pub use estimate::estimate_word_timestamps;
pub use segmenter::{segment_words, DEFAULT_GROUP_SIZE, SUBTITLE_GROUP_SIZE};
pub use timeline::CaptionTimeline;
