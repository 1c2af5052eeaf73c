//! Dual-write behaviour of the post coordinator against the in-memory stores.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use uuid::Uuid;

use quill_core::PostWriteCoordinator;
use quill_core::domain::{Post, PostFields, PostPage, PostWithAuthor, UploadedFile};
use quill_core::error::{BlobError, DomainError, RepoError};
use quill_core::ports::{
    BaseRepository, BlobStore, Clock, PostPolicy, PostRepository, PostTransaction,
};
use quill_infra::{InMemoryBlobStore, InMemoryPostRepository};

struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    fn at(time: DateTime<Utc>) -> Self {
        Self(Mutex::new(time))
    }

    fn advance(&self, delta: TimeDelta) {
        *self.0.lock().unwrap() += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Wraps the in-memory store and fails on request.
#[derive(Default)]
struct FlakyBlobStore {
    inner: InMemoryBlobStore,
    fail_writes: AtomicBool,
    fail_delete_of: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl FlakyBlobStore {
    fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn fail_delete_of(&self, path: &str) {
        *self.fail_delete_of.lock().unwrap() = Some(path.to_string());
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn holds(&self, path: &str) -> bool {
        self.inner.exists(path).await.unwrap()
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn put_file_as(
        &self,
        dir: &str,
        name: &str,
        contents: &[u8],
    ) -> Result<String, BlobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BlobError::Io {
                path: format!("{dir}/{name}"),
                reason: "disk full".into(),
            });
        }
        self.inner.put_file_as(dir, name, contents).await
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete_of.lock().unwrap().as_deref() == Some(path) {
            return Err(BlobError::Io {
                path: path.to_string(),
                reason: "permission denied".into(),
            });
        }
        self.inner.delete(path).await
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(path).await
    }
}

/// Delegates to the in-memory store; commits fail on request.
struct FlakyPostRepository {
    inner: Arc<InMemoryPostRepository>,
    fail_commits: AtomicBool,
}

impl FlakyPostRepository {
    fn fail_commits(&self) {
        self.fail_commits.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BaseRepository<Post, Uuid> for FlakyPostRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        self.inner.find_by_id(id).await
    }
}

#[async_trait]
impl PostRepository for FlakyPostRepository {
    async fn find_with_author(&self, id: Uuid) -> Result<Option<PostWithAuthor>, RepoError> {
        self.inner.find_with_author(id).await
    }

    async fn list_recent(&self, page: u64, per_page: u64) -> Result<PostPage, RepoError> {
        self.inner.list_recent(page, per_page).await
    }

    async fn begin(&self) -> Result<Box<dyn PostTransaction>, RepoError> {
        Ok(Box::new(FlakyTransaction {
            inner: self.inner.begin().await?,
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        }))
    }
}

struct FlakyTransaction {
    inner: Box<dyn PostTransaction>,
    fail_commit: bool,
}

#[async_trait]
impl PostTransaction for FlakyTransaction {
    async fn insert(&mut self, post: Post) -> Result<Post, RepoError> {
        self.inner.insert(post).await
    }

    async fn update(&mut self, post: Post) -> Result<Post, RepoError> {
        self.inner.update(post).await
    }

    async fn delete(&mut self, id: Uuid) -> Result<(), RepoError> {
        self.inner.delete(id).await
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        if self.fail_commit {
            self.inner.rollback().await?;
            return Err(RepoError::Connection("connection reset".into()));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepoError> {
        self.inner.rollback().await
    }
}

/// Lets one moderator delete any post; updates stay owner-only.
struct ModeratorPolicy {
    moderator: Uuid,
}

impl PostPolicy for ModeratorPolicy {
    fn can_update(&self, user_id: Uuid, post: &Post) -> bool {
        post.user_id == user_id
    }

    fn can_delete(&self, user_id: Uuid, post: &Post) -> bool {
        post.user_id == user_id || user_id == self.moderator
    }
}

struct Harness {
    posts: Arc<InMemoryPostRepository>,
    records: Arc<FlakyPostRepository>,
    blobs: Arc<FlakyBlobStore>,
    clock: Arc<FixedClock>,
    coordinator: PostWriteCoordinator,
    owner: Uuid,
}

impl Harness {
    fn new() -> Self {
        let posts = Arc::new(InMemoryPostRepository::new());
        let records = Arc::new(FlakyPostRepository {
            inner: posts.clone(),
            fail_commits: AtomicBool::new(false),
        });
        let blobs = Arc::new(FlakyBlobStore::default());
        let clock = Arc::new(FixedClock::at(
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        ));
        let coordinator = PostWriteCoordinator::new(records.clone(), blobs.clone(), clock.clone());

        Self {
            posts,
            records,
            blobs,
            clock,
            coordinator,
            owner: Uuid::new_v4(),
        }
    }

    async fn create(&self, filename: &str) -> Post {
        self.coordinator
            .create(
                self.owner,
                PostFields::new("First post", "Hello"),
                UploadedFile::new(filename, b"image-bytes".to_vec()),
            )
            .await
            .unwrap()
    }

    async fn stored(&self, id: Uuid) -> Option<Post> {
        self.posts.find_by_id(id).await.unwrap()
    }
}

#[tokio::test]
async fn test_create_names_image_by_timestamp_and_stores_blob() {
    let h = Harness::new();

    let post = h.create("cat.png").await;

    assert_eq!(post.image.as_deref(), Some("20240102030405_cat.png"));
    assert!(h.blobs.holds("images/posts/20240102030405_cat.png").await);
    assert_eq!(h.stored(post.id).await, Some(post));
}

#[tokio::test]
async fn test_create_rolls_back_when_blob_write_fails() {
    let h = Harness::new();
    h.blobs.fail_writes();

    let result = h
        .coordinator
        .create(
            h.owner,
            PostFields::new("First post", "Hello"),
            UploadedFile::new("cat.png", b"image-bytes".to_vec()),
        )
        .await;

    assert!(matches!(result, Err(DomainError::StorageWrite(_))));
    assert!(h.posts.is_empty().await);
    assert!(h.blobs.inner.paths().await.is_empty());
}

#[tokio::test]
async fn test_create_rejects_invalid_input_without_side_effects() {
    let h = Harness::new();

    let result = h
        .coordinator
        .create(
            h.owner,
            PostFields::new("", "Hello"),
            UploadedFile::new("cat.png", b"x".to_vec()),
        )
        .await;

    assert!(matches!(result, Err(DomainError::Validation(_))));
    assert!(h.posts.is_empty().await);
    assert_eq!(h.blobs.calls(), 0);
}

#[tokio::test]
async fn test_update_without_file_keeps_image_and_skips_blob_store() {
    let h = Harness::new();
    let post = h.create("cat.png").await;
    let calls_after_create = h.blobs.calls();
    h.clock.advance(TimeDelta::minutes(5));

    let updated = h
        .coordinator
        .update(h.owner, post.id, PostFields::new("Edited", "New body"), None)
        .await
        .unwrap();

    assert_eq!(updated.title, "Edited");
    assert_eq!(updated.body, "New body");
    assert_eq!(updated.image, post.image);
    assert!(updated.updated_at > post.updated_at);
    assert_eq!(h.blobs.calls(), calls_after_create);
    assert_eq!(h.stored(post.id).await, Some(updated));
}

#[tokio::test]
async fn test_update_with_file_swaps_blobs() {
    let h = Harness::new();
    let post = h.create("cat.png").await;
    h.clock.advance(TimeDelta::seconds(1));

    let updated = h
        .coordinator
        .update(
            h.owner,
            post.id,
            PostFields::new("Edited", "Hello"),
            Some(UploadedFile::new("dog.png", b"woof".to_vec())),
        )
        .await
        .unwrap();

    assert_eq!(updated.image.as_deref(), Some("20240102030406_dog.png"));
    assert_eq!(
        h.blobs.inner.paths().await,
        vec!["images/posts/20240102030406_dog.png".to_string()]
    );
    assert_eq!(h.stored(post.id).await, Some(updated));
}

#[tokio::test]
async fn test_update_restores_state_when_old_blob_delete_fails() {
    let h = Harness::new();
    let post = h.create("cat.png").await;
    h.clock.advance(TimeDelta::seconds(1));
    h.blobs.fail_delete_of("images/posts/20240102030405_cat.png");

    let result = h
        .coordinator
        .update(
            h.owner,
            post.id,
            PostFields::new("Edited", "Hello"),
            Some(UploadedFile::new("dog.png", b"woof".to_vec())),
        )
        .await;

    assert!(matches!(result, Err(DomainError::StorageDelete(_))));
    assert_eq!(h.stored(post.id).await, Some(post));
    assert!(h.blobs.holds("images/posts/20240102030405_cat.png").await);
    assert!(!h.blobs.holds("images/posts/20240102030406_dog.png").await);
}

#[tokio::test]
async fn test_update_rolls_back_when_new_blob_write_fails() {
    let h = Harness::new();
    let post = h.create("cat.png").await;
    h.clock.advance(TimeDelta::seconds(1));
    h.blobs.fail_writes();

    let result = h
        .coordinator
        .update(
            h.owner,
            post.id,
            PostFields::new("Edited", "Hello"),
            Some(UploadedFile::new("dog.png", b"woof".to_vec())),
        )
        .await;

    assert!(matches!(result, Err(DomainError::StorageWrite(_))));
    assert_eq!(h.stored(post.id).await, Some(post));
    assert!(h.blobs.holds("images/posts/20240102030405_cat.png").await);
}

#[tokio::test]
async fn test_update_same_name_within_same_second_keeps_blob() {
    let h = Harness::new();
    let post = h.create("cat.png").await;

    let updated = h
        .coordinator
        .update(
            h.owner,
            post.id,
            PostFields::new("Edited", "Hello"),
            Some(UploadedFile::new("cat.png", b"new-bytes".to_vec())),
        )
        .await
        .unwrap();

    assert_eq!(updated.image, post.image);
    assert_eq!(
        h.blobs
            .inner
            .get("images/posts/20240102030405_cat.png")
            .await,
        Some(b"new-bytes".to_vec())
    );
}

#[tokio::test]
async fn test_update_by_other_user_is_forbidden() {
    let h = Harness::new();
    let post = h.create("cat.png").await;

    let result = h
        .coordinator
        .update(
            Uuid::new_v4(),
            post.id,
            PostFields::new("Hijacked", "x"),
            Some(UploadedFile::new("evil.png", b"x".to_vec())),
        )
        .await;

    assert!(matches!(result, Err(DomainError::Forbidden(_))));
    assert_eq!(h.stored(post.id).await, Some(post));
    assert_eq!(h.blobs.inner.paths().await.len(), 1);
}

#[tokio::test]
async fn test_update_missing_post_is_not_found() {
    let h = Harness::new();

    let result = h
        .coordinator
        .update(h.owner, Uuid::new_v4(), PostFields::new("t", "b"), None)
        .await;

    assert!(matches!(result, Err(DomainError::NotFound { .. })));
}

#[tokio::test]
async fn test_delete_removes_row_and_blob() {
    let h = Harness::new();
    let post = h.create("cat.png").await;

    h.coordinator.delete(h.owner, post.id).await.unwrap();

    assert!(h.stored(post.id).await.is_none());
    assert!(!h.blobs.holds("images/posts/20240102030405_cat.png").await);
}

#[tokio::test]
async fn test_delete_keeps_row_when_blob_delete_fails() {
    let h = Harness::new();
    let post = h.create("cat.png").await;
    h.blobs.fail_delete_of("images/posts/20240102030405_cat.png");

    let result = h.coordinator.delete(h.owner, post.id).await;

    assert!(matches!(result, Err(DomainError::StorageDelete(_))));
    assert_eq!(h.stored(post.id).await, Some(post));
    assert!(h.blobs.holds("images/posts/20240102030405_cat.png").await);
}

#[tokio::test]
async fn test_delete_by_other_user_is_forbidden() {
    let h = Harness::new();
    let post = h.create("cat.png").await;

    let result = h.coordinator.delete(Uuid::new_v4(), post.id).await;

    assert!(matches!(result, Err(DomainError::Forbidden(_))));
    assert!(h.stored(post.id).await.is_some());
    assert!(h.blobs.holds("images/posts/20240102030405_cat.png").await);
}

#[tokio::test]
async fn test_create_removes_image_when_commit_fails() {
    let h = Harness::new();
    h.records.fail_commits();

    let result = h
        .coordinator
        .create(
            h.owner,
            PostFields::new("First post", "Hello"),
            UploadedFile::new("cat.png", b"image-bytes".to_vec()),
        )
        .await;

    assert!(matches!(
        result,
        Err(DomainError::Repository(RepoError::Connection(_)))
    ));
    assert!(h.posts.is_empty().await);
    assert!(h.blobs.inner.paths().await.is_empty());
}

#[tokio::test]
async fn test_update_attaches_image_to_post_without_one() {
    let h = Harness::new();
    let mut post = Post::new(
        h.owner,
        PostFields::new("Imported", "No picture yet"),
        "unused.png".into(),
        h.clock.now(),
    );
    post.image = None;
    let mut tx = h.posts.begin().await.unwrap();
    tx.insert(post.clone()).await.unwrap();
    tx.commit().await.unwrap();

    let updated = h
        .coordinator
        .update(
            h.owner,
            post.id,
            PostFields::new("Imported", "Now with a picture"),
            Some(UploadedFile::new("dog.png", b"woof".to_vec())),
        )
        .await
        .unwrap();

    assert_eq!(updated.image.as_deref(), Some("20240102030405_dog.png"));
    assert!(h.blobs.holds("images/posts/20240102030405_dog.png").await);
    // One write, no delete of a previous image.
    assert_eq!(h.blobs.calls(), 1);
    assert_eq!(h.stored(post.id).await, Some(updated));
}

#[tokio::test]
async fn test_custom_policy_lets_moderator_delete() {
    let h = Harness::new();
    let post = h.create("cat.png").await;
    let moderator = Uuid::new_v4();
    let coordinator =
        PostWriteCoordinator::new(h.records.clone(), h.blobs.clone(), h.clock.clone())
            .with_policy(Arc::new(ModeratorPolicy { moderator }));

    let edit = coordinator
        .update(moderator, post.id, PostFields::new("Moderated", "x"), None)
        .await;
    assert!(matches!(edit, Err(DomainError::Forbidden(_))));

    coordinator.delete(moderator, post.id).await.unwrap();

    assert!(h.stored(post.id).await.is_none());
    assert!(h.blobs.inner.paths().await.is_empty());
}
