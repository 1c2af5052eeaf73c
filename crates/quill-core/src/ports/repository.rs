use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Post, PostPage, PostWithAuthor};
use crate::error::RepoError;

/// Generic read access by primary key.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;
}

/// Post record store.
///
/// Reads run directly on the connection; every write goes through a
/// [`PostTransaction`] obtained from [`PostRepository::begin`].
#[async_trait]
pub trait PostRepository: BaseRepository<Post, Uuid> {
    /// Fetch a post together with its author.
    async fn find_with_author(&self, id: Uuid) -> Result<Option<PostWithAuthor>, RepoError>;

    /// Newest-first page of posts. `page` is 1-based.
    async fn list_recent(&self, page: u64, per_page: u64) -> Result<PostPage, RepoError>;

    /// Open a transaction for writes.
    async fn begin(&self) -> Result<Box<dyn PostTransaction>, RepoError>;
}

/// An open record-store transaction.
///
/// Nothing written through it is visible until [`commit`](Self::commit).
/// Dropping it without committing discards the writes.
#[async_trait]
pub trait PostTransaction: Send {
    async fn insert(&mut self, post: Post) -> Result<Post, RepoError>;

    async fn update(&mut self, post: Post) -> Result<Post, RepoError>;

    /// Delete a post row. `RepoError::NotFound` if no row matched.
    async fn delete(&mut self, id: Uuid) -> Result<(), RepoError>;

    async fn commit(self: Box<Self>) -> Result<(), RepoError>;

    async fn rollback(self: Box<Self>) -> Result<(), RepoError>;
}
