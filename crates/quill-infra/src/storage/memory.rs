//! In-memory blob store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use quill_core::error::BlobError;
use quill_core::ports::BlobStore;

use super::{check_path, join};

/// Blobs kept in a `HashMap` behind an async `RwLock`.
///
/// Note: Data is lost on process restart.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents stored at `path`.
    pub async fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(path).cloned()
    }

    /// All stored paths, sorted.
    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put_file_as(
        &self,
        dir: &str,
        name: &str,
        contents: &[u8],
    ) -> Result<String, BlobError> {
        let path = join(dir, name)?;
        self.blobs
            .write()
            .await
            .insert(path.clone(), contents.to_vec());
        Ok(path)
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        check_path(path)?;
        self.blobs.write().await.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        check_path(path)?;
        Ok(self.blobs.read().await.contains_key(path))
    }
}
