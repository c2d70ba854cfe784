//! Video encoding configuration.
//!
//! Every stage encodes with the same H.264 4:2:0 profile so that clips from
//! different stages can be joined without mismatches.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output pixel format shared by every stage.
pub const PIXEL_FORMAT: &str = "yuv420p";

/// VBV limits for platforms that reject bitrate spikes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RateCap {
    pub bitrate: String,
    pub maxrate: String,
    pub bufsize: String,
}

/// Encoder profile. Missing fields in JSON take the default profile's values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EncodingConfig {
    /// Video encoder, e.g. "libx264"
    pub codec: String,
    /// x264 speed preset
    pub preset: String,
    /// Constant Rate Factor (0-51, lower is better)
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub rate_cap: Option<RateCap>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".into(),
            preset: "fast".into(),
            crf: 22,
            audio_codec: "aac".into(),
            audio_bitrate: "192k".into(),
            rate_cap: None,
        }
    }
}

impl EncodingConfig {
    /// Short-form profile: slightly higher quality with a capped bitrate.
    pub fn for_shorts() -> Self {
        Self {
            crf: 20,
            rate_cap: Some(RateCap {
                bitrate: "2000k".into(),
                maxrate: "2500k".into(),
                bufsize: "5000k".into(),
            }),
            ..Default::default()
        }
    }

    /// Long-form ambient profile: slower preset, higher CRF for smaller files.
    pub fn for_ambient(is_4k: bool) -> Self {
        Self {
            preset: "medium".into(),
            crf: if is_4k { 26 } else { 24 },
            ..Default::default()
        }
    }

    /// Video-only encoder arguments (codec, preset, quality, pixel format).
    pub fn video_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-c:v".into(),
            self.codec.clone(),
            "-preset".into(),
            self.preset.clone(),
            "-crf".into(),
            self.crf.to_string(),
        ];
        if let Some(cap) = &self.rate_cap {
            for (flag, value) in [("-b:v", &cap.bitrate), ("-maxrate", &cap.maxrate), ("-bufsize", &cap.bufsize)] {
                args.push(flag.into());
                args.push(value.clone());
            }
        }
        args.push("-pix_fmt".into());
        args.push(PIXEL_FORMAT.into());
        args
    }

    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".into(),
            self.audio_codec.clone(),
            "-b:a".into(),
            self.audio_bitrate.clone(),
        ]
    }
}
