//! Record store - SeaORM on PostgreSQL, with an in-memory fallback.

mod connections;
mod memory;

#[cfg(feature = "postgres")]
mod postgres_base;
#[cfg(feature = "postgres")]
pub mod postgres_repo;

#[cfg(feature = "postgres")]
pub mod entity;

#[cfg(feature = "postgres")]
pub use connections::connect;
pub use connections::DatabaseConfig;
pub use memory::{InMemoryPostRepository, InMemoryUserDirectory};

#[cfg(feature = "postgres")]
pub use postgres_repo::{PostgresPostRepository, PostgresPostTransaction};
