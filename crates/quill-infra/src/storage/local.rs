//! Filesystem blob store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use quill_core::error::BlobError;
use quill_core::ports::BlobStore;

use super::{check_path, join};

/// Blobs stored as plain files below a root directory.
///
/// Example: `images/posts/20240102030405_cat.png` lives at
/// `<root>/images/posts/20240102030405_cat.png`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root directory if needed.
    pub async fn initialize(&self) -> Result<(), BlobError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_error(&self.root, e))?;
        tracing::info!(root = %self.root.display(), "Blob store initialized");
        Ok(())
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        check_path(path)?;
        Ok(self.root.join(path))
    }
}

fn io_error(path: &Path, err: std::io::Error) -> BlobError {
    BlobError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_file_as(
        &self,
        dir: &str,
        name: &str,
        contents: &[u8],
    ) -> Result<String, BlobError> {
        let path = join(dir, name)?;
        let full_path = self.resolve(&path)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        // Write next to the target, then rename over it.
        let temp_path = full_path.with_file_name(format!(".{name}.tmp"));
        if let Err(e) = fs::write(&temp_path, contents).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(io_error(&temp_path, e));
        }
        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(io_error(&full_path, e));
        }

        tracing::debug!(path = %path, size = contents.len(), "Wrote blob");
        Ok(path)
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        let full_path = self.resolve(path)?;

        match fs::remove_file(&full_path).await {
            Ok(()) => {
                tracing::debug!(path = %path, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %path, "Blob already absent");
                Ok(())
            }
            Err(e) => Err(io_error(&full_path, e)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        let full_path = self.resolve(path)?;
        fs::try_exists(&full_path)
            .await
            .map_err(|e| io_error(&full_path, e))
    }
}
