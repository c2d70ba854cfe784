//! Filesystem utilities for output finalization.
//!
//! Every stage encodes into a `.partial` sibling of its destination and only
//! moves it into place after the external process succeeded, so a failed run
//! never leaves a file at the destination path.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Smallest output accepted as a real encode.
pub const MIN_OUTPUT_BYTES: u64 = 10 * 1024;

/// Temporary sibling path used while an output is being written.
///
/// The extension is preserved so FFmpeg can still infer the container.
pub fn partial_path(dst: &Path) -> PathBuf {
    let stem = dst
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = match dst.extension() {
        Some(ext) => format!("{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!("{}.partial", stem),
    };
    dst.with_file_name(name)
}

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Tries a rename first; on EXDEV falls back to copy-and-delete through a
/// temporary file next to `dst`.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    // Create parent directory if needed before attempting rename
    if let Some(parent) = dst.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = dst.with_extension("tmp");

    if let Err(e) = fs::copy(src, &tmp_dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

/// Remove a file, ignoring "not found".
pub async fn remove_if_exists(path: impl AsRef<Path>) {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Size of a file in bytes, or zero when it does not exist.
pub async fn file_size(path: impl AsRef<Path>) -> u64 {
    fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
}

/// Fail when a freshly encoded file is missing or implausibly small.
pub async fn validate_output(path: &Path, min_bytes: u64) -> MediaResult<u64> {
    let size = file_size(path).await;
    if size < min_bytes {
        return Err(MediaError::InvalidVideo(format!(
            "{} is {} bytes, expected at least {}",
            path.display(),
            size,
            min_bytes
        )));
    }
    Ok(size)
}

/// Move a completed partial into place, or delete it when the encode failed.
pub async fn finalize_output<T>(
    result: MediaResult<T>,
    partial: &Path,
    dst: &Path,
) -> MediaResult<T> {
    match result {
        Ok(value) => match move_file(partial, dst).await {
            Ok(()) => Ok(value),
            Err(e) => {
                remove_if_exists(partial).await;
                Err(e)
            }
        },
        Err(e) => {
            remove_if_exists(partial).await;
            Err(e)
        }
    }
}
