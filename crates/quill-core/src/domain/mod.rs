//! Domain entities - the core business objects.

mod user;

mod post;

pub use post::{
    IMAGE_NAME_MAX_BYTES, POST_IMAGE_DIR, Post, PostFields, PostPage, PostWithAuthor,
    TITLE_MAX_CHARS, UploadedFile, blob_name, image_path,
};
pub use user::User;
