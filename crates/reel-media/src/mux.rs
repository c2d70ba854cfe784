//! Audio/video muxing.

use reel_models::EncodingConfig;
use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{finalize_output, partial_path, remove_if_exists, validate_output};
use crate::probe::probe_media;

/// What the muxer produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MuxSummary {
    pub size_bytes: u64,
    pub duration_sec: f64,
}

/// Attaches an audio track to a silent visual track.
#[derive(Debug, Clone)]
pub struct Muxer {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

impl Muxer {
    pub fn new(runner: FfmpegRunner, encoding: EncodingConfig) -> Self {
        Self { runner, encoding }
    }

    /// Build the mux command: video copied, audio encoded to AAC, cut to the
    /// shorter input, moov atom first.
    pub fn command(&self, visual: &Path, audio: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::with_output(output)
            .input(visual)
            .input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("copy")
            .output_args(self.encoding.audio_args())
            .shortest()
            .faststart()
    }

    /// Mux `visual` with `audio` into `output`, then probe the result.
    pub async fn mux(&self, visual: &Path, audio: &Path, output: &Path) -> MediaResult<MuxSummary> {
        for input in [visual, audio] {
            if !input.exists() {
                return Err(MediaError::FileNotFound(input.to_path_buf()));
            }
        }

        let partial = partial_path(output);
        let cmd = self.command(visual, audio, &partial);
        let result = self.runner.run(&cmd).await;
        finalize_output(result, &partial, output).await?;

        let summary = match summarize(output).await {
            Ok(summary) => summary,
            Err(e) => {
                remove_if_exists(output).await;
                return Err(e);
            }
        };
        info!(
            size_bytes = summary.size_bytes,
            duration_sec = summary.duration_sec,
            "Muxed {}",
            output.display()
        );
        Ok(summary)
    }
}

/// Size and probed duration of a finished file.
pub async fn summarize(path: &Path) -> MediaResult<MuxSummary> {
    let size_bytes = validate_output(path, 1).await?;
    let info = probe_media(path).await?;
    Ok(MuxSummary {
        size_bytes,
        duration_sec: info.duration,
    })
}
