//! Manifest handling through the public executor API.

use reel_worker::{JobExecutor, JobManifest, WorkerConfig};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn executor(dir: &Path, max_jobs: usize) -> JobExecutor {
    JobExecutor::new(WorkerConfig {
        max_concurrent_jobs: max_jobs,
        work_dir: dir.join("work"),
        ..WorkerConfig::default()
    })
}

fn write(dir: &Path, name: &str, json: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, json).expect("Failed to write manifest");
    path
}

#[tokio::test]
async fn test_every_manifest_gets_a_report() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let paths: Vec<PathBuf> = (0..5)
        .map(|i| {
            write(
                dir.path(),
                &format!("job_{i}.json"),
                &format!(
                    r#"{{"job_id":"job-{i}","kind":"hook_overlay","output":"out_{i}.mp4","video":"missing_{i}.mp4","text":"Wait for it"}}"#
                ),
            )
        })
        .collect();

    let reports = executor(dir.path(), 2).run_files(&paths).await;

    assert_eq!(reports.len(), 5);
    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report.job_id.as_str(), format!("job-{i}"));
        assert_eq!(report.kind, "hook_overlay");
        assert!(!report.outcome.success);
        assert_eq!(report.outcome.size_bytes, 0);
    }
}

#[tokio::test]
async fn test_unknown_kind_is_rejected_at_load() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write(
        dir.path(),
        "odd.json",
        r#"{"kind":"storyboard","output":"out.mp4"}"#,
    );

    let err = JobManifest::load(&path).await.unwrap_err();
    assert!(err.is_rejected());
    assert!(err.to_string().contains("odd.json"));
}

#[tokio::test]
async fn test_empty_image_set_fails_without_output() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let output = dir.path().join("broll.mp4");
    let path = write(
        dir.path(),
        "broll.json",
        &format!(
            r#"{{"kind":"broll","output":"{}","audio":"{}","images":[]}}"#,
            output.display(),
            dir.path().join("voice.mp3").display(),
        ),
    );

    let reports = executor(dir.path(), 1).run_files(&[path]).await;

    assert!(!reports[0].outcome.success);
    assert!(reports[0].outcome.error.is_some());
    assert!(!output.exists());
}

#[tokio::test]
async fn test_report_lines_are_json() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write(dir.path(), "broken.json", "[]");

    let reports = executor(dir.path(), 1).run_files(&[path]).await;
    let line = serde_json::to_string(&reports[0]).expect("Failed to serialize report");
    let value: serde_json::Value = serde_json::from_str(&line).expect("Invalid JSON line");

    assert_eq!(value["kind"], "manifest");
    assert_eq!(value["success"], false);
    assert!(value["error"].is_string());
}
