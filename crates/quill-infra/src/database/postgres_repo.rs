//! PostgreSQL repository implementations.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, DatabaseTransaction, EntityTrait, QueryOrder, QuerySelect,
    TransactionTrait,
};
use uuid::Uuid;

use quill_core::domain::{Post, PostPage, PostWithAuthor};
use quill_core::error::RepoError;
use quill_core::ports::{PostRepository, PostTransaction};

use super::entity::post::{self, Entity as PostEntity};
use super::entity::user::{self, Entity as UserEntity};
use super::postgres_base::{PostgresBaseRepository, query_error};

/// PostgreSQL post repository.
pub type PostgresPostRepository = PostgresBaseRepository<PostEntity>;

fn with_author(row: (post::Model, Option<user::Model>)) -> PostWithAuthor {
    let (post, author) = row;
    PostWithAuthor {
        post: post.into(),
        author: author.map(Into::into),
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn find_with_author(&self, id: Uuid) -> Result<Option<PostWithAuthor>, RepoError> {
        let row = PostEntity::find_by_id(id)
            .find_also_related(UserEntity)
            .one(&self.db)
            .await
            .map_err(query_error)?;

        Ok(row.map(with_author))
    }

    async fn list_recent(&self, page: u64, per_page: u64) -> Result<PostPage, RepoError> {
        let page = page.max(1);
        tracing::debug!(page, per_page, "Listing posts");

        let Some(offset) = PostPage::offset(page, per_page) else {
            return Ok(PostPage::empty(page, per_page));
        };

        // One extra row tells us whether another page exists.
        let mut rows = PostEntity::find()
            .find_also_related(UserEntity)
            .order_by_desc(post::Column::CreatedAt)
            .offset(offset)
            .limit(per_page.saturating_add(1))
            .all(&self.db)
            .await
            .map_err(query_error)?;

        let has_more = rows.len() as u64 > per_page;
        rows.truncate(per_page as usize);

        Ok(PostPage {
            items: rows.into_iter().map(with_author).collect(),
            page,
            per_page,
            has_more,
        })
    }

    async fn begin(&self) -> Result<Box<dyn PostTransaction>, RepoError> {
        let txn = self.db.begin().await.map_err(query_error)?;
        Ok(Box::new(PostgresPostTransaction { txn }))
    }
}

/// Post writes inside a database transaction. SeaORM rolls back on drop.
pub struct PostgresPostTransaction {
    txn: DatabaseTransaction,
}

#[async_trait]
impl PostTransaction for PostgresPostTransaction {
    async fn insert(&mut self, post: Post) -> Result<Post, RepoError> {
        let model = post::ActiveModel::from(post)
            .insert(&self.txn)
            .await
            .map_err(query_error)?;

        Ok(model.into())
    }

    async fn update(&mut self, post: Post) -> Result<Post, RepoError> {
        let model = post::ActiveModel::from(post)
            .update(&self.txn)
            .await
            .map_err(query_error)?;

        Ok(model.into())
    }

    async fn delete(&mut self, id: Uuid) -> Result<(), RepoError> {
        let result = PostEntity::delete_by_id(id)
            .exec(&self.txn)
            .await
            .map_err(query_error)?;

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        self.txn.commit().await.map_err(query_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepoError> {
        self.txn.rollback().await.map_err(query_error)
    }
}
