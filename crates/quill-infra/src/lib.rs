//! # Quill Infrastructure
//!
//! Concrete implementations of the ports defined in `quill-core`.
//!
//! ## Feature Flags
//!
//! - `postgres` (default) - PostgreSQL record store via SeaORM
//! - `minimal` - No database driver, in-memory record store only

pub mod auth;
pub mod clock;
pub mod database;
pub mod storage;

pub use auth::{JwtConfig, JwtTokenService};
pub use clock::SystemClock;
pub use database::{DatabaseConfig, InMemoryPostRepository, InMemoryUserDirectory};
pub use storage::{InMemoryBlobStore, LocalBlobStore};

#[cfg(feature = "postgres")]
pub use database::PostgresPostRepository;
