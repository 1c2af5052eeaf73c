//! # Quill Core
//!
//! The domain layer of the Quill blog service.
//! Pure business logic: posts, their images, and the coordinator that keeps
//! the record store and the blob store in step. No infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

pub use error::DomainError;
pub use services::PostWriteCoordinator;
