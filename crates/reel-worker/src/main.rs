//! Render worker binary.
//!
//! Usage: `reel-worker <manifest.json>...` runs each manifest and prints one
//! JSON report per line. `reel-worker --schema` prints the manifest schema.

use anyhow::Context;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_worker::metrics::init_metrics;
use reel_worker::{JobExecutor, JobManifest, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--schema") {
        let schema = schemars::schema_for!(JobManifest);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }
    if args.is_empty() {
        anyhow::bail!("usage: reel-worker <manifest.json>... | --schema");
    }

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        init_metrics(addr).context("failed to start metrics exporter")?;
        info!(%addr, "Prometheus exporter listening");
    }

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("cannot create work dir {}", config.work_dir.display()))?;

    let manifests: Vec<PathBuf> = args.into_iter().map(PathBuf::from).collect();
    let executor = JobExecutor::new(config);
    let reports = executor.run_files(&manifests).await;

    let mut failed = 0;
    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
        if !report.outcome.success {
            failed += 1;
        }
    }

    if failed > 0 {
        warn!(failed, total = reports.len(), "Some jobs failed");
        std::process::exit(1);
    }
    info!(total = reports.len(), "All jobs completed");
    Ok(())
}

/// Colored output for dev, JSON for production.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reel_worker=info,reel_media=info"));

    // Reports go to stdout, logs to stderr
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
