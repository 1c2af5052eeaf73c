use uuid::Uuid;

use crate::domain::Post;
use crate::ports::PostPolicy;

/// Only the author of a post may change it.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerPolicy;

impl PostPolicy for OwnerPolicy {
    fn can_update(&self, user_id: Uuid, post: &Post) -> bool {
        post.user_id == user_id
    }

    fn can_delete(&self, user_id: Uuid, post: &Post) -> bool {
        post.user_id == user_id
    }
}
