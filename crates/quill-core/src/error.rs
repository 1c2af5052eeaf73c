//! Domain-level error types.

use thiserror::Error;
use uuid::Uuid;

/// Domain errors - business logic failures.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: &'static str, id: Uuid },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    /// The image could not be written; the surrounding transaction was rolled back.
    #[error("{0}")]
    StorageWrite(String),

    /// An image could not be removed; the surrounding transaction was rolled back.
    #[error("{0}")]
    StorageDelete(String),

    #[error(transparent)]
    Repository(#[from] RepoError),
}

impl DomainError {
    pub fn post_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity_type: "Post",
            id,
        }
    }
}

/// Repository-level errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Blob store errors.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob I/O failed for {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),
}
