//! FFprobe stream information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Frame rate assumed when a stream reports none.
const FALLBACK_FPS: f64 = 30.0;

/// What the compositor needs to know about a video before piping it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Whether the container also carries an audio stream
    pub has_audio: bool,
}

/// Container-level information for any media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration: f64,
    pub has_video: bool,
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

impl ProbeReport {
    fn duration(&self) -> f64 {
        self.format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .unwrap_or(0.0)
    }

    fn stream(&self, kind: &str) -> Option<&ProbeStream> {
        self.streams.iter().find(|s| s.codec_type == kind)
    }

    fn has(&self, kind: &str) -> bool {
        self.stream(kind).is_some()
    }
}

impl ProbeStream {
    /// Average rate first; `r_frame_rate` is the container tick rate and can
    /// be far above the real rate for variable-rate files.
    fn fps(&self) -> f64 {
        [&self.avg_frame_rate, &self.r_frame_rate]
            .into_iter()
            .flatten()
            .find_map(|r| parse_frame_rate(r))
            .unwrap_or(FALLBACK_FPS)
    }
}

async fn run_ffprobe(path: &Path) -> MediaResult<ProbeReport> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("cannot read {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        });
    }
    Ok(serde_json::from_slice(&output.stdout)?)
}

/// Probe a video file. Fails when there is no video stream or it has no
/// usable dimensions.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();
    let report = run_ffprobe(path).await?;
    video_info(&report)
        .ok_or_else(|| MediaError::InvalidVideo(format!("{} has no usable video stream", path.display())))
}

fn video_info(report: &ProbeReport) -> Option<VideoInfo> {
    let video = report.stream("video")?;
    let (width, height) = (video.width?, video.height?);
    if width == 0 || height == 0 {
        return None;
    }
    Some(VideoInfo {
        duration: report.duration(),
        width,
        height,
        fps: video.fps(),
        has_audio: report.has("audio"),
    })
}

/// Probe any media file (audio tracks included).
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let report = run_ffprobe(path.as_ref()).await?;
    Ok(MediaInfo {
        duration: report.duration(),
        has_video: report.has("video"),
        has_audio: report.has("audio"),
    })
}

/// Media duration in seconds.
pub async fn get_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    Ok(probe_media(path).await?.duration)
}

/// Parse `"30000/1001"` or `"29.97"`. Zero or malformed rates are `None`.
pub(crate) fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => num.trim().parse::<f64>().ok()? / den.trim().parse::<f64>().ok()?,
        None => s.trim().parse::<f64>().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}
