//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod auth;
mod blob_store;
mod clock;
mod repository;

pub use auth::{AuthError, PostPolicy, TokenClaims, TokenService};
pub use blob_store::BlobStore;
pub use clock::Clock;
pub use repository::{BaseRepository, PostRepository, PostTransaction};
