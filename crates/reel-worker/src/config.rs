//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum manifests run at the same time
    pub max_concurrent_jobs: usize,
    /// Maximum segment renders in flight within a single job
    pub max_render_parallel: usize,
    /// Timeout applied to every FFmpeg process
    pub process_timeout: Duration,
    /// Work directory for intermediate files
    pub work_dir: PathBuf,
    /// Font used for captions, hooks and cards; system fonts when unset
    pub font_path: Option<PathBuf>,
    /// Prometheus listener address; metrics are not exported when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            max_render_parallel: 4,
            process_timeout: Duration::from_secs(1800), // 30 minutes
            work_dir: PathBuf::from("/tmp/reel"),
            font_path: None,
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            max_concurrent_jobs: parse_var(&lookup, "WORKER_MAX_JOBS")
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            max_render_parallel: parse_var(&lookup, "WORKER_MAX_RENDER_PARALLEL")
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.max_render_parallel),
            process_timeout: parse_var(&lookup, "WORKER_PROCESS_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.process_timeout),
            work_dir: lookup("WORKER_WORK_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            font_path: lookup("WORKER_FONT_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            metrics_addr: parse_var(&lookup, "METRICS_ADDR"),
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> WorkerConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.max_render_parallel, 4);
        assert_eq!(config.process_timeout, Duration::from_secs(1800));
        assert_eq!(config.work_dir, PathBuf::from("/tmp/reel"));
        assert!(config.font_path.is_none());
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("WORKER_MAX_RENDER_PARALLEL", "8"),
            ("WORKER_PROCESS_TIMEOUT", "60"),
            ("WORKER_WORK_DIR", "/var/reel"),
            ("WORKER_FONT_PATH", "/fonts/Inter-Bold.ttf"),
            ("METRICS_ADDR", "0.0.0.0:9100"),
        ]);
        assert_eq!(config.max_render_parallel, 8);
        assert_eq!(config.process_timeout, Duration::from_secs(60));
        assert_eq!(config.work_dir, PathBuf::from("/var/reel"));
        assert_eq!(config.font_path, Some(PathBuf::from("/fonts/Inter-Bold.ttf")));
        assert_eq!(config.metrics_addr, Some("0.0.0.0:9100".parse().unwrap()));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config_from(&[
            ("WORKER_MAX_JOBS", "0"),
            ("WORKER_MAX_RENDER_PARALLEL", "many"),
            ("METRICS_ADDR", "not-an-addr"),
        ]);
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.max_render_parallel, 4);
        assert!(config.metrics_addr.is_none());
    }
}
