//! Blob store port - where post images live.

use async_trait::async_trait;

use crate::error::BlobError;

/// Non-transactional file storage addressed by slash-separated relative paths.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `contents` as `<dir>/<name>`, replacing any existing blob.
    /// Returns the path written.
    async fn put_file_as(&self, dir: &str, name: &str, contents: &[u8])
    -> Result<String, BlobError>;

    /// Remove the blob at `path`. Removing a missing blob succeeds.
    async fn delete(&self, path: &str) -> Result<(), BlobError>;

    async fn exists(&self, path: &str) -> Result<bool, BlobError>;
}
