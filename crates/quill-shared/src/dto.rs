//! Data Transfer Objects - request/response types for the API.

use serde::{Deserialize, Serialize};

/// Author shown next to a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorResponse {
    pub id: String,
    pub name: String,
}

/// A post as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub image: Option<String>,
    /// Blob-store path of the image, e.g. `images/posts/20240102030405_cat.png`.
    pub image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorResponse>,
    pub created_at: String,
    pub updated_at: String,
}

/// One page of posts, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListResponse {
    pub posts: Vec<PostResponse>,
    pub page: u64,
    pub per_page: u64,
    pub has_more: bool,
}

/// Text fields of a submitted post form, echoed back when a write fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostFormInput {
    pub title: String,
    pub body: String,
}

/// Query string of the listing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
}
