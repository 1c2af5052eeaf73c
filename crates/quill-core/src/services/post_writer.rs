//! Post Write Coordinator.
//!
//! A post lives in two places: its row in the record store and its image in
//! the blob store. The blob store has no transactions, so every mutation is
//! ordered so that the record-store commit is the last irreversible step.
//! Any blob failure before that point becomes a rollback.

use std::sync::Arc;

use uuid::Uuid;

use super::OwnerPolicy;
use crate::domain::{POST_IMAGE_DIR, Post, PostFields, UploadedFile, blob_name};
use crate::error::DomainError;
use crate::ports::{BlobStore, Clock, PostPolicy, PostRepository, PostTransaction};

const SAVE_FAILED: &str = "Failed to save the image file.";
const DELETE_FAILED: &str = "Failed to delete the image file.";

/// Image swap staged by an update.
struct ImageReplacement<'a> {
    /// Blob path of the image being replaced, if the post had one.
    old_path: Option<String>,
    new_name: String,
    file: &'a UploadedFile,
}

/// Coordinates create, update and delete of posts across the record store and
/// the blob store.
pub struct PostWriteCoordinator {
    posts: Arc<dyn PostRepository>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    policy: Arc<dyn PostPolicy>,
}

impl PostWriteCoordinator {
    /// Build a coordinator using [`OwnerPolicy`] for authorization.
    pub fn new(
        posts: Arc<dyn PostRepository>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            posts,
            blobs,
            clock,
            policy: Arc::new(OwnerPolicy),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn PostPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Create a post owned by `owner_id` and store its image.
    ///
    /// On a failed image write no row and no blob persist.
    pub async fn create(
        &self,
        owner_id: Uuid,
        fields: PostFields,
        file: UploadedFile,
    ) -> Result<Post, DomainError> {
        fields.validate()?;
        file.validate()?;

        let now = self.clock.now();
        let image = blob_name(now, file.original_name());
        let post = Post::new(owner_id, fields, image.clone(), now);
        tracing::debug!(post_id = %post.id, image = %image, "Creating post");

        let mut tx = self.posts.begin().await?;
        let saved = match self.insert_with_image(tx.as_mut(), post, &image, &file).await {
            Ok(saved) => saved,
            Err(e) => {
                Self::rollback(tx).await;
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            // The row is gone, so the image we just wrote belongs to nothing.
            if let Some(path) = saved.image_path() {
                self.discard_blob(&path).await;
            }
            return Err(e.into());
        }

        tracing::info!(post_id = %saved.id, user_id = %owner_id, "Post created");
        Ok(saved)
    }

    /// Update the text of a post and optionally replace its image.
    ///
    /// Without `file` the blob store is not touched and `image` is kept.
    pub async fn update(
        &self,
        actor_id: Uuid,
        id: Uuid,
        fields: PostFields,
        file: Option<UploadedFile>,
    ) -> Result<Post, DomainError> {
        let mut post = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::post_not_found(id))?;

        if !self.policy.can_update(actor_id, &post) {
            tracing::warn!(post_id = %id, user_id = %actor_id, "Update denied");
            return Err(DomainError::Forbidden(
                "You can only update your own posts".into(),
            ));
        }

        fields.validate()?;
        if let Some(file) = &file {
            file.validate()?;
        }

        let now = self.clock.now();
        let replacement = file.as_ref().map(|file| {
            let old_path = post.image_path();
            let new_name = blob_name(now, file.original_name());
            post.image = Some(new_name.clone());
            ImageReplacement {
                old_path,
                new_name,
                file,
            }
        });
        post.apply(fields, now);

        let mut tx = self.posts.begin().await?;
        let updated = match self
            .update_with_image(tx.as_mut(), post, replacement.as_ref())
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                Self::rollback(tx).await;
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            if let Some(replacement) = &replacement {
                tracing::error!(
                    post_id = %id,
                    old_path = ?replacement.old_path,
                    new_image = %replacement.new_name,
                    error = %e,
                    "Commit failed after the old image was removed; post references a missing image"
                );
            }
            return Err(e.into());
        }

        tracing::info!(
            post_id = %id,
            image_replaced = replacement.is_some(),
            "Post updated"
        );
        Ok(updated)
    }

    /// Delete a post and its image.
    ///
    /// If the image cannot be removed the row is kept.
    pub async fn delete(&self, actor_id: Uuid, id: Uuid) -> Result<(), DomainError> {
        let post = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::post_not_found(id))?;

        if !self.policy.can_delete(actor_id, &post) {
            tracing::warn!(post_id = %id, user_id = %actor_id, "Delete denied");
            return Err(DomainError::Forbidden(
                "You can only delete your own posts".into(),
            ));
        }

        let mut tx = self.posts.begin().await?;
        if let Err(e) = self.delete_with_image(tx.as_mut(), &post).await {
            Self::rollback(tx).await;
            return Err(e);
        }

        if let Err(e) = tx.commit().await {
            tracing::error!(
                post_id = %id,
                image = ?post.image_path(),
                error = %e,
                "Commit failed after the image was removed; post references a missing image"
            );
            return Err(e.into());
        }

        tracing::info!(post_id = %id, "Post deleted");
        Ok(())
    }

    async fn insert_with_image(
        &self,
        tx: &mut dyn PostTransaction,
        post: Post,
        image: &str,
        file: &UploadedFile,
    ) -> Result<Post, DomainError> {
        let saved = tx.insert(post).await?;
        self.write_image(image, file).await?;
        Ok(saved)
    }

    async fn update_with_image(
        &self,
        tx: &mut dyn PostTransaction,
        post: Post,
        replacement: Option<&ImageReplacement<'_>>,
    ) -> Result<Post, DomainError> {
        let updated = tx.update(post).await?;

        let Some(replacement) = replacement else {
            return Ok(updated);
        };

        let new_path = self
            .write_image(&replacement.new_name, replacement.file)
            .await?;

        // Same name in the same second: the write above already replaced it.
        let Some(old_path) = replacement
            .old_path
            .as_deref()
            .filter(|old| *old != new_path)
        else {
            return Ok(updated);
        };

        if let Err(e) = self.blobs.delete(old_path).await {
            tracing::warn!(
                old_path = %old_path,
                error = %e,
                "Old image delete failed, removing new image and rolling back"
            );
            self.discard_blob(&new_path).await;
            return Err(DomainError::StorageDelete(DELETE_FAILED.into()));
        }

        Ok(updated)
    }

    async fn delete_with_image(
        &self,
        tx: &mut dyn PostTransaction,
        post: &Post,
    ) -> Result<(), DomainError> {
        tx.delete(post.id).await?;

        if let Some(path) = post.image_path() {
            self.blobs.delete(&path).await.map_err(|e| {
                tracing::warn!(path = %path, error = %e, "Image delete failed, rolling back");
                DomainError::StorageDelete(DELETE_FAILED.into())
            })?;
        }

        Ok(())
    }

    async fn write_image(&self, name: &str, file: &UploadedFile) -> Result<String, DomainError> {
        self.blobs
            .put_file_as(POST_IMAGE_DIR, name, file.contents())
            .await
            .map_err(|e| {
                tracing::warn!(image = %name, error = %e, "Image write failed, rolling back");
                DomainError::StorageWrite(SAVE_FAILED.into())
            })
    }

    /// Best-effort removal of a blob nothing will reference.
    async fn discard_blob(&self, path: &str) {
        if let Err(e) = self.blobs.delete(path).await {
            tracing::error!(path = %path, error = %e, "Failed to remove orphaned image");
        }
    }

    async fn rollback(tx: Box<dyn PostTransaction>) {
        if let Err(e) = tx.rollback().await {
            tracing::error!(error = %e, "Transaction rollback failed");
        }
    }
}
