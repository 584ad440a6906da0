//! Filesystem helpers for staging and render-tree files.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Copy `src` to `dst` through a sibling temp file, so `dst` is either
/// absent or complete.
pub async fn copy_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<u64> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if !src.is_file() {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }
    ensure_parent(dst).await?;

    let tmp_dst = dst.with_extension("tmp");
    let bytes = match fs::copy(src, &tmp_dst).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = fs::remove_file(&tmp_dst).await;
            return Err(e.into());
        }
    };

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(e.into());
    }

    Ok(bytes)
}

/// Remove a directory tree, treating an already missing directory as success.
pub async fn remove_dir_if_exists(dir: impl AsRef<Path>) -> MediaResult<bool> {
    match fs::remove_dir_all(dir.as_ref()).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_file_creates_parent() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("placeholder_1.mp4");
        let dst = dir.path().join("render").join("videos").join("placeholder_1.mp4");
        fs::write(&src, b"clip").await.unwrap();

        let bytes = copy_file(&src, &dst).await.unwrap();

        assert_eq!(bytes, 4);
        assert!(src.exists(), "copy keeps the source");
        assert_eq!(fs::read(&dst).await.unwrap(), b"clip");
        assert!(!dst.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = copy_file(dir.path().join("nope.mp4"), dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(!dir.path().join("out.mp4").exists());
    }

    #[tokio::test]
    async fn test_remove_dir_if_exists() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("staging");
        fs::create_dir_all(staging.join("nested")).await.unwrap();

        assert!(remove_dir_if_exists(&staging).await.unwrap());
        assert!(!remove_dir_if_exists(&staging).await.unwrap());
    }
}
