use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RelocationError {
    #[error("Staged upload not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Refusing to overwrite existing file: {0}")]
    TargetExists(PathBuf),

    #[error("Failed to move {from} to {to}: {source}")]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Moves finished uploads out of the daemon's staging directory into the
/// permanent file tree.
#[derive(Debug, Clone)]
pub struct FileRelocator {
    staging_dir: PathBuf,
    files_dir: PathBuf,
}

impl FileRelocator {
    pub fn new(staging_dir: impl Into<PathBuf>, files_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            files_dir: files_dir.into(),
        }
    }

    pub fn staging_path(&self, upload_id: &str) -> PathBuf {
        self.staging_dir.join(upload_id)
    }

    pub fn storage_path(&self, path_id: &str) -> PathBuf {
        self.files_dir.join(path_id)
    }

    /// Moves the staged blob for `upload_id` to `<files_dir>/<path_id>` and
    /// returns the final location.
    ///
    /// A missing source is an error: the blob has either already been moved
    /// or never existed, and callers must not register it.
    pub async fn relocate(&self, upload_id: &str, path_id: &str) -> Result<PathBuf, RelocationError> {
        let from = self.staging_path(upload_id);
        let to = self.storage_path(path_id);
        let io_err = |source: std::io::Error| RelocationError::Io {
            from: from.clone(),
            to: to.clone(),
            source,
        };

        match fs::metadata(&from).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(RelocationError::SourceMissing(from.clone())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RelocationError::SourceMissing(from.clone()));
            }
            Err(e) => return Err(io_err(e)),
        }

        if fs::try_exists(&to).await.map_err(io_err)? {
            return Err(RelocationError::TargetExists(to.clone()));
        }

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        match fs::rename(&from, &to).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                debug!(
                    from = %from.display(),
                    to = %to.display(),
                    "Cross-device move detected, falling back to copy"
                );
                copy_then_remove(&from, &to).await.map_err(io_err)?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Lost a race with another finish call for the same upload
                return Err(RelocationError::SourceMissing(from.clone()));
            }
            Err(e) => return Err(io_err(e)),
        }

        debug!(from = %from.display(), to = %to.display(), "Relocated upload");
        Ok(to)
    }
}

/// Copies into a sibling temp file, syncs it, then renames it into place so
/// the final path never exposes a partial copy.
async fn copy_then_remove(from: &Path, to: &Path) -> std::io::Result<()> {
    let tmp = to.with_extension(format!("partial-{}", uuid::Uuid::new_v4()));

    if let Err(e) = fs::copy(from, &tmp).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }

    let file = fs::OpenOptions::new().write(true).open(&tmp).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&tmp, to).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }

    if let Err(e) = fs::remove_file(from).await {
        warn!(path = %from.display(), error = %e, "Copied upload but could not remove staged file");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, FileRelocator) {
        let root = tempfile::tempdir().unwrap();
        let staging = root.path().join("uploads").join("tusd");
        let files = root.path().join("files");
        std::fs::create_dir_all(&staging).unwrap();
        let relocator = FileRelocator::new(staging, files);
        (root, relocator)
    }

    #[tokio::test]
    async fn test_relocate_moves_file_and_creates_directories() {
        let (_root, relocator) = setup();
        std::fs::write(relocator.staging_path("xyz"), b"payload").unwrap();

        let dest = relocator
            .relocate("xyz", "2/0a/xyz/brijsiyag.zip")
            .await
            .unwrap();

        assert_eq!(dest, relocator.storage_path("2/0a/xyz/brijsiyag.zip"));
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
        assert!(!relocator.staging_path("xyz").exists());
    }

    #[tokio::test]
    async fn test_relocate_missing_source_fails() {
        let (_root, relocator) = setup();

        let err = relocator.relocate("nope", "1/00/nope/a.txt").await.unwrap_err();
        assert!(matches!(err, RelocationError::SourceMissing(_)));
        assert!(!relocator.storage_path("1/00/nope").exists());
    }

    #[tokio::test]
    async fn test_relocate_twice_fails_second_time() {
        let (_root, relocator) = setup();
        std::fs::write(relocator.staging_path("once"), b"data").unwrap();

        relocator.relocate("once", "1/ff/once/a.txt").await.unwrap();
        let err = relocator.relocate("once", "1/ff/once/a.txt").await.unwrap_err();

        assert!(matches!(err, RelocationError::SourceMissing(_)));
        assert_eq!(
            std::fs::read(relocator.storage_path("1/ff/once/a.txt")).unwrap(),
            b"data"
        );
    }

    #[tokio::test]
    async fn test_relocate_never_overwrites() {
        let (_root, relocator) = setup();
        std::fs::write(relocator.staging_path("dup"), b"new").unwrap();
        let existing = relocator.storage_path("1/01/dup/a.txt");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"old").unwrap();

        let err = relocator.relocate("dup", "1/01/dup/a.txt").await.unwrap_err();

        assert!(matches!(err, RelocationError::TargetExists(_)));
        assert_eq!(std::fs::read(&existing).unwrap(), b"old");
        assert!(relocator.staging_path("dup").exists());
    }

    #[tokio::test]
    async fn test_copy_then_remove() {
        let root = tempfile::tempdir().unwrap();
        let from = root.path().join("src.bin");
        let to = root.path().join("dst.bin");
        std::fs::write(&from, vec![7u8; 4096]).unwrap();

        copy_then_remove(&from, &to).await.unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap().len(), 4096);
    }
}
