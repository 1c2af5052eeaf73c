//! In-memory record store - used when no database is configured, and in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use quill_core::domain::{Post, PostPage, PostWithAuthor, User};
use quill_core::error::RepoError;
use quill_core::ports::{BaseRepository, PostRepository, PostTransaction};

type PostTable = Arc<RwLock<HashMap<Uuid, Post>>>;

/// Authors known to the in-memory post store.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn get(&self, id: Uuid) -> Option<User> {
        self.users.read().await.get(&id).cloned()
    }
}

/// In-memory post store with staged transactions.
///
/// Note: Data is lost on process restart.
pub struct InMemoryPostRepository {
    posts: PostTable,
    users: Arc<InMemoryUserDirectory>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self::with_users(Arc::new(InMemoryUserDirectory::new()))
    }

    /// Resolve authors from the given user directory.
    pub fn with_users(users: Arc<InMemoryUserDirectory>) -> Self {
        Self {
            posts: Arc::new(RwLock::new(HashMap::new())),
            users,
        }
    }

    pub async fn len(&self) -> usize {
        self.posts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn attach_author(&self, post: Post) -> PostWithAuthor {
        let author = self.users.get(post.user_id).await;
        PostWithAuthor { post, author }
    }
}

impl Default for InMemoryPostRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseRepository<Post, Uuid> for InMemoryPostRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.posts.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn find_with_author(&self, id: Uuid) -> Result<Option<PostWithAuthor>, RepoError> {
        let post = self.posts.read().await.get(&id).cloned();
        match post {
            Some(post) => Ok(Some(self.attach_author(post).await)),
            None => Ok(None),
        }
    }

    async fn list_recent(&self, page: u64, per_page: u64) -> Result<PostPage, RepoError> {
        let page = page.max(1);
        let Some(skip) = PostPage::offset(page, per_page).and_then(|o| usize::try_from(o).ok())
        else {
            return Ok(PostPage::empty(page, per_page));
        };
        let take = usize::try_from(per_page).unwrap_or(usize::MAX);

        let mut posts: Vec<Post> = self.posts.read().await.values().cloned().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let has_more = posts.len() > skip.saturating_add(take);

        let mut items = Vec::new();
        for post in posts.into_iter().skip(skip).take(take) {
            items.push(self.attach_author(post).await);
        }

        Ok(PostPage {
            items,
            page,
            per_page,
            has_more,
        })
    }

    async fn begin(&self) -> Result<Box<dyn PostTransaction>, RepoError> {
        Ok(Box::new(InMemoryPostTransaction {
            posts: self.posts.clone(),
            staged: Vec::new(),
        }))
    }
}

enum StagedWrite {
    Put(Post),
    Remove(Uuid),
}

/// Writes are buffered and applied to the table only on commit.
struct InMemoryPostTransaction {
    posts: PostTable,
    staged: Vec<StagedWrite>,
}

impl InMemoryPostTransaction {
    /// Whether `id` exists as seen from inside this transaction.
    async fn visible(&self, id: Uuid) -> bool {
        for write in self.staged.iter().rev() {
            match write {
                StagedWrite::Put(post) if post.id == id => return true,
                StagedWrite::Remove(removed) if *removed == id => return false,
                _ => {}
            }
        }
        self.posts.read().await.contains_key(&id)
    }
}

#[async_trait]
impl PostTransaction for InMemoryPostTransaction {
    async fn insert(&mut self, post: Post) -> Result<Post, RepoError> {
        if self.visible(post.id).await {
            return Err(RepoError::Constraint(format!("post {} already exists", post.id)));
        }
        self.staged.push(StagedWrite::Put(post.clone()));
        Ok(post)
    }

    async fn update(&mut self, post: Post) -> Result<Post, RepoError> {
        if !self.visible(post.id).await {
            return Err(RepoError::NotFound);
        }
        self.staged.push(StagedWrite::Put(post.clone()));
        Ok(post)
    }

    async fn delete(&mut self, id: Uuid) -> Result<(), RepoError> {
        if !self.visible(id).await {
            return Err(RepoError::NotFound);
        }
        self.staged.push(StagedWrite::Remove(id));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        let Self { posts, staged } = *self;
        let mut table = posts.write().await;
        for write in staged {
            match write {
                StagedWrite::Put(post) => {
                    table.insert(post.id, post);
                }
                StagedWrite::Remove(id) => {
                    table.remove(&id);
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepoError> {
        Ok(())
    }
}
