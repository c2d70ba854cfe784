//! End-to-end renders against a real ffmpeg.

use reel_worker::{JobExecutor, WorkerConfig};
use std::path::Path;
use tempfile::TempDir;
use tokio::process::Command;

/// Generate a short landscape test clip with a tone track.
async fn test_clip(path: &Path, seconds: u32) {
    let status = Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-f", "lavfi", "-i"])
        .arg(format!("testsrc=size=1280x720:rate=30:duration={seconds}"))
        .args(["-f", "lavfi", "-i"])
        .arg(format!("sine=frequency=440:duration={seconds}"))
        .args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-c:a", "aac", "-shortest"])
        .arg(path)
        .status()
        .await
        .expect("Failed to spawn ffmpeg");
    assert!(status.success(), "ffmpeg could not generate the test clip");
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_crop_vertical_end_to_end() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = dir.path().join("landscape.mp4");
    let output = dir.path().join("portrait.mp4");
    test_clip(&input, 3).await;

    let manifest = dir.path().join("crop.json");
    std::fs::write(
        &manifest,
        format!(
            r#"{{"kind":"crop_vertical","output":"{}","video":"{}"}}"#,
            output.display(),
            input.display()
        ),
    )
    .expect("Failed to write manifest");

    let executor = JobExecutor::new(WorkerConfig {
        work_dir: dir.path().join("work"),
        ..WorkerConfig::default()
    });
    let reports = executor.run_files(&[manifest]).await;

    let report = &reports[0];
    assert!(report.outcome.success, "crop failed: {:?}", report.outcome.error);
    assert!(report.outcome.size_bytes > 0);
    assert!((report.outcome.duration_sec - 3.0).abs() < 0.5);

    let info = reel_media::probe_video(&output).await.expect("Failed to probe output");
    assert!(info.height > info.width);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_extract_clip_clamps_to_source_end() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = dir.path().join("talk.mp4");
    let output = dir.path().join("clip.mp4");
    test_clip(&input, 6).await;

    let manifest = dir.path().join("clip.json");
    std::fs::write(
        &manifest,
        format!(
            r#"{{"kind":"extract_clip","output":"{}","video":"{}","start_sec":2,"end_sec":60}}"#,
            output.display(),
            input.display()
        ),
    )
    .expect("Failed to write manifest");

    let executor = JobExecutor::new(WorkerConfig {
        work_dir: dir.path().join("work"),
        ..WorkerConfig::default()
    });
    let reports = executor.run_files(&[manifest]).await;

    let report = &reports[0];
    assert!(report.outcome.success, "extract failed: {:?}", report.outcome.error);
    assert!(report.outcome.duration_sec > 0.0 && report.outcome.duration_sec < 6.5);
    assert!(output.exists());
}
