//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::progress::FfmpegProgress;

/// Number of diagnostic stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 12;

/// One FFmpeg input with the arguments that precede its `-i`.
#[derive(Debug, Clone)]
struct FfmpegInput {
    args: Vec<String>,
    source: String,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in order; stream specifiers (`0:v`, `1:a`) follow this order
    inputs: Vec<FfmpegInput>,
    /// Output file path, or `-` for stdout
    output: String,
    /// Output arguments (after all inputs)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
    /// Emit `-progress pipe:2`
    progress: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command with a single file input.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self::with_output(output).input(input)
    }

    /// Create a command with no inputs yet.
    pub fn with_output(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_string_lossy().to_string(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
            progress: true,
        }
    }

    /// Add a file input.
    pub fn input(self, input: impl AsRef<Path>) -> Self {
        self.input_with_args(Vec::<String>::new(), input)
    }

    /// Add an input preceded by its own arguments (e.g. `-loop 1`, `-f lavfi`).
    pub fn input_with_args<I, S>(mut self, args: I, input: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(FfmpegInput {
            args: args.into_iter().map(Into::into).collect(),
            source: input.as_ref().to_string_lossy().to_string(),
        });
        self
    }

    /// Add arguments before the most recently added input.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(last) = self.inputs.last_mut() {
            last.args.push(arg.into());
        }
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Limit output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set audio filter.
    pub fn audio_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-af").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or filter label into the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Copy all streams without re-encoding.
    pub fn codec_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Drop the video stream.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Stop at the shortest input.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Put the moov atom first for progressive playback.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Disable `-progress` output; used when stderr is not parsed.
    pub fn without_progress(mut self) -> Self {
        self.progress = false;
        self
    }

    /// Output target as passed to FFmpeg.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Number of inputs added so far.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        // Overwrite flag
        if self.overwrite {
            args.push("-y".to_string());
        }

        // Log level
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        if self.progress {
            args.push("-progress".to_string());
            args.push("pipe:2".to_string());
        }

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.clone());

        args
    }
}

/// Runner for FFmpeg commands with progress tracking and a per-process timeout.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Timeout for a single process
    timeout: Option<Duration>,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |p| trace!(frame = p.frame, speed = p.speed, "ffmpeg progress"))
            .await
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        // Check FFmpeg exists
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let started = Instant::now();
        let mut child = spawn_ffmpeg(&args, Stdio::null(), Stdio::null())?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr not captured"))?;
        let diagnostics = StderrCollector::spawn(stderr, progress_callback);

        let result = wait_with_timeout(&mut child, self.timeout).await;
        let tail = diagnostics.finish().await;
        metrics::record_ffmpeg_duration(started.elapsed().as_secs_f64());

        match result? {
            Some(code) if code == 0 => Ok(()),
            code => {
                warn!(exit_code = ?code, stderr = %tail, "FFmpeg failed");
                Err(MediaError::ffmpeg_failed(
                    "FFmpeg exited with non-zero status",
                    Some(tail),
                    code,
                ))
            }
        }
    }
}

/// Spawn FFmpeg with stderr piped. The process is killed when the handle drops.
pub(crate) fn spawn_ffmpeg(args: &[String], stdin: Stdio, stdout: Stdio) -> MediaResult<Child> {
    let child = Command::new("ffmpeg")
        .args(args)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;
    Ok(child)
}

/// Wait for a child, killing it when the timeout elapses.
///
/// Returns the exit code (`None` when terminated by a signal).
pub(crate) async fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> MediaResult<Option<i32>> {
    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!("FFmpeg timed out after {} seconds, killing process", limit.as_secs());
                let _ = child.kill().await;
                return Err(MediaError::Timeout(limit.as_secs()));
            }
        },
        None => child.wait().await?,
    };
    Ok(status.code())
}

/// Background reader for a child's stderr.
///
/// Progress lines go to the callback; everything else is kept as a bounded
/// tail for error reports.
pub(crate) struct StderrCollector {
    handle: JoinHandle<()>,
    tail: Arc<Mutex<VecDeque<String>>>,
}

impl StderrCollector {
    pub(crate) fn spawn<R, F>(stream: R, progress_callback: F) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let sink = Arc::clone(&tail);

        let handle = tokio::spawn(async move {
            let mut reader = BufReader::new(stream).lines();
            let mut current = FfmpegProgress::default();

            while let Ok(Some(line)) = reader.next_line().await {
                if is_progress_key(&line) {
                    if let Some(progress) = parse_progress_line(&line, &mut current) {
                        progress_callback(progress);
                    }
                    continue;
                }
                if line.trim().is_empty() {
                    continue;
                }
                if let Ok(mut lines) = sink.lock() {
                    if lines.len() == STDERR_TAIL_LINES {
                        lines.pop_front();
                    }
                    lines.push_back(line);
                }
            }
        });

        Self { handle, tail }
    }

    /// Wait for the stream to close and return the collected tail.
    pub(crate) async fn finish(self) -> String {
        let _ = self.handle.await;
        self.tail
            .lock()
            .map(|lines| lines.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default()
    }
}

const PROGRESS_KEYS: &[&str] = &[
    "frame", "fps", "stream_0_0_q", "bitrate", "total_size", "out_time_us", "out_time_ms",
    "out_time", "dup_frames", "drop_frames", "speed", "progress",
];

fn is_progress_key(line: &str) -> bool {
    line.split_once('=')
        .map(|(key, _)| PROGRESS_KEYS.contains(&key.trim()))
        .unwrap_or(false)
}

/// Parse a progress line from FFmpeg's -progress output.
fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let line = line.trim();

    if let Some((key, value)) = line.split_once('=') {
        match key {
            "out_time_ms" | "out_time_us" => {
                // FFmpeg reports microseconds under both keys
                if let Ok(us) = value.parse::<i64>() {
                    current.out_time_ms = us / 1000;
                }
            }
            "out_time" => {
                current.out_time = value.to_string();
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    current.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    current.fps = fps;
                }
            }
            "speed" => {
                // Format: "1.5x" or "N/A"
                if let Some(speed) = value
                    .strip_suffix('x')
                    .and_then(|s| s.trim().parse().ok())
                {
                    current.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    current.is_complete = true;
                }
                return Some(current.clone());
            }
            _ => {}
        }
    }

    None
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .duration(30.0)
            .video_codec("libx264");

        let args = cmd.build_args();
        assert_eq!(args[0], "-y");
        assert!(args.contains(&"-t".to_string()));
        assert!(args.contains(&"30.000".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert_eq!(args.last().unwrap(), "output.mp4");
    }

    #[test]
    fn test_multiple_inputs_keep_their_arguments() {
        let cmd = FfmpegCommand::with_output("out.mp4")
            .input_with_args(["-loop", "1"], "image.png")
            .input("voice.mp3")
            .without_progress();

        let args = cmd.build_args();
        let loop_pos = args.iter().position(|a| a == "-loop").unwrap();
        let image_pos = args.iter().position(|a| a == "image.png").unwrap();
        let voice_pos = args.iter().position(|a| a == "voice.mp3").unwrap();
        assert!(loop_pos < image_pos);
        assert!(image_pos < voice_pos);
        assert!(!args.contains(&"-progress".to_string()));
        assert_eq!(cmd.input_count(), 2);
    }

    #[test]
    fn test_input_arg_applies_to_last_input() {
        let args = FfmpegCommand::with_output("o.wav")
            .input("a.wav")
            .input("b.wav")
            .input_arg("-stream_loop")
            .input_arg("-1")
            .build_args();
        let a = args.iter().position(|x| x == "a.wav").unwrap();
        let loop_pos = args.iter().position(|x| x == "-stream_loop").unwrap();
        assert!(loop_pos > a);
    }

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        parse_progress_line("out_time_us=5000000", &mut progress);
        assert_eq!(progress.out_time_ms, 5000);

        parse_progress_line("speed=1.5x", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        let result = parse_progress_line("progress=end", &mut progress);
        assert!(result.is_some());
        assert!(progress.is_complete);
    }

    #[test]
    fn test_progress_keys_are_separated_from_diagnostics() {
        assert!(is_progress_key("frame=120"));
        assert!(is_progress_key("progress=continue"));
        assert!(!is_progress_key("[libx264 @ 0x1] height not divisible by 2"));
        assert!(!is_progress_key("Error opening input file"));
    }

    #[tokio::test]
    async fn test_stderr_collector_keeps_bounded_tail() {
        let mut text = String::new();
        for i in 0..30 {
            text.push_str(&format!("diagnostic line {}\nframe={}\n", i, i));
        }
        let collector = StderrCollector::spawn(std::io::Cursor::new(text.into_bytes()), |_| {});
        let tail = collector.finish().await;
        let lines: Vec<&str> = tail.lines().collect();
        assert_eq!(lines.len(), STDERR_TAIL_LINES);
        assert_eq!(*lines.last().unwrap(), "diagnostic line 29");
        assert!(!tail.contains("frame="));
    }
}
