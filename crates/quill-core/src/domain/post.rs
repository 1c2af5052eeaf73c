use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::User;
use crate::error::DomainError;

/// Directory (inside the blob store) that holds post images.
pub const POST_IMAGE_DIR: &str = "images/posts";

/// Longest accepted title, in characters.
pub const TITLE_MAX_CHARS: usize = 255;

/// Longest accepted upload filename, in bytes. The stored name adds a
/// `%Y%m%d%H%M%S_` prefix (15 bytes) and the local store writes through a
/// `.<name>.tmp` sibling (5 bytes), both within a 255-byte limit.
pub const IMAGE_NAME_MAX_BYTES: usize = 255 - 15 - 5;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp"];

/// Post entity - a blog post with an optional attached image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    /// Stored blob name, `<YYYYmmddHHMMSS>_<original filename>`.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new post owned by `user_id` with its image already named.
    pub fn new(user_id: Uuid, fields: PostFields, image: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: fields.title,
            body: fields.body,
            image: Some(image),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the textual fields and bump `updated_at`.
    pub fn apply(&mut self, fields: PostFields, now: DateTime<Utc>) {
        self.title = fields.title;
        self.body = fields.body;
        self.updated_at = now;
    }

    /// Path of the image inside the blob store, if the post has one.
    pub fn image_path(&self) -> Option<String> {
        self.image.as_deref().map(image_path)
    }
}

/// Blob-store path for a stored image name.
pub fn image_path(name: &str) -> String {
    format!("{POST_IMAGE_DIR}/{name}")
}

/// Derive the stored name for an upload: second-precision timestamp, underscore,
/// then the client's original filename.
///
/// Two uploads of the same filename within one second collide.
pub fn blob_name(at: DateTime<Utc>, original_name: &str) -> String {
    format!("{}_{}", at.format("%Y%m%d%H%M%S"), original_name)
}

/// Textual fields submitted for a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFields {
    pub title: String,
    pub body: String,
}

impl PostFields {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::Validation("The title field is required".into()));
        }
        if self.title.chars().count() > TITLE_MAX_CHARS {
            return Err(DomainError::Validation(format!(
                "The title may not be greater than {TITLE_MAX_CHARS} characters"
            )));
        }
        if self.body.trim().is_empty() {
            return Err(DomainError::Validation("The body field is required".into()));
        }
        Ok(())
    }
}

/// An image uploaded by a client.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    original_name: String,
    contents: Vec<u8>,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            original_name: original_name.into(),
            contents,
        }
    }

    /// Filename as sent by the client.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// The name must be a single path component with an image extension.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.is_empty() {
            return Err(DomainError::Validation("The image file is empty".into()));
        }

        let name = self.original_name.as_str();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(DomainError::Validation(format!(
                "Invalid image filename: {name:?}"
            )));
        }
        if name.len() > IMAGE_NAME_MAX_BYTES {
            return Err(DomainError::Validation(format!(
                "The image filename may not be longer than {IMAGE_NAME_MAX_BYTES} bytes"
            )));
        }

        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(DomainError::Validation("The image must be an image file".into()));
        }

        Ok(())
    }
}

// Keep the bytes out of debug output.
impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("original_name", &self.original_name)
            .field("len", &self.contents.len())
            .finish()
    }
}

/// A post joined with its author, for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithAuthor {
    pub post: Post,
    pub author: Option<User>,
}

/// One page of posts, newest first. No total count is computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPage {
    pub items: Vec<PostWithAuthor>,
    /// 1-based page number.
    pub page: u64,
    pub per_page: u64,
    pub has_more: bool,
}

impl PostPage {
    /// A page past the end of the listing.
    pub fn empty(page: u64, per_page: u64) -> Self {
        Self {
            items: Vec::new(),
            page,
            per_page,
            has_more: false,
        }
    }

    /// Rows to skip before `page`, or `None` if that is beyond any table.
    pub fn offset(page: u64, per_page: u64) -> Option<u64> {
        page.max(1).checked_sub(1)?.checked_mul(per_page)
    }
}
