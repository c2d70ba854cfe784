//! Job-scoped temporary working directories.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::MediaResult;

/// Scratch directory owned by one job.
///
/// The directory name is derived from the output file name, so two jobs
/// writing different outputs never share intermediates. The directory is
/// removed by [`JobWorkspace::cleanup`], or on drop if cleanup was skipped.
/// A drop inside a Tokio runtime removes it on the blocking pool, so the
/// directory may outlive the drop briefly.
#[derive(Debug)]
pub struct JobWorkspace {
    path: PathBuf,
    cleaned: bool,
}

impl JobWorkspace {
    /// Create (or reuse) the scratch directory for `output` under `base_dir`.
    pub async fn create(base_dir: &Path, output: &Path, purpose: &str) -> MediaResult<Self> {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "job".to_string());
        let path = base_dir.join(format!("{}_{}", sanitize(&stem), purpose));
        tokio::fs::create_dir_all(&path).await?;
        debug!("Created job workspace {}", path.display());
        Ok(Self {
            path,
            cleaned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path for a named intermediate artifact.
    pub fn file(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Create a subdirectory for a group of intermediates.
    pub async fn subdir(&self, name: &str) -> MediaResult<PathBuf> {
        let dir = self.path.join(name);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Remove every intermediate artifact.
    pub async fn cleanup(mut self) {
        self.cleaned = true;
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove workspace {}: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        let path = std::mem::take(&mut self.path);
        // Inside a runtime the removal goes to the blocking pool so a large
        // segment tree does not stall a worker thread.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_dir_quietly(&path));
            }
            Err(_) => remove_dir_quietly(&path),
        }
    }
}

fn remove_dir_quietly(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!("Removed abandoned workspace {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove workspace {}: {}", path.display(), e),
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_workspace_keyed_by_output_name() {
        let base = TempDir::new().unwrap();
        let a = JobWorkspace::create(base.path(), Path::new("/out/video one.mp4"), "broll")
            .await
            .unwrap();
        let b = JobWorkspace::create(base.path(), Path::new("/out/video-two.mp4"), "broll")
            .await
            .unwrap();

        assert_ne!(a.path(), b.path());
        assert!(a.path().ends_with("video_one_broll"));
        a.cleanup().await;
        b.cleanup().await;
    }

    #[tokio::test]
    async fn test_cleanup_removes_everything() {
        let base = TempDir::new().unwrap();
        let ws = JobWorkspace::create(base.path(), Path::new("final.mp4"), "captions")
            .await
            .unwrap();
        let seg_dir = ws.subdir("segments").await.unwrap();
        tokio::fs::write(seg_dir.join("seg_000.mp4"), b"x").await.unwrap();
        let root = ws.path().to_path_buf();

        ws.cleanup().await;
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_drop_in_runtime_removes_directory() {
        let base = TempDir::new().unwrap();
        let root = {
            let ws = JobWorkspace::create(base.path(), Path::new("x.mp4"), "t")
                .await
                .unwrap();
            ws.path().to_path_buf()
        };

        for _ in 0..200 {
            if !root.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!root.exists());
    }

    #[test]
    fn test_drop_outside_runtime_removes_directory() {
        let base = TempDir::new().unwrap();
        let ws = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(JobWorkspace::create(base.path(), Path::new("y.mp4"), "t"))
            .unwrap();
        let root = ws.path().to_path_buf();
        assert!(root.exists());

        drop(ws);
        assert!(!root.exists());
    }
}
