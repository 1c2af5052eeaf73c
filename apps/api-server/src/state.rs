//! Application state - shared across all handlers.

use std::sync::Arc;

use quill_core::PostWriteCoordinator;
use quill_core::error::BlobError;
use quill_core::ports::{BlobStore, Clock, PostRepository, TokenService};
use quill_infra::{InMemoryPostRepository, JwtTokenService, LocalBlobStore, SystemClock};

use crate::config::AppConfig;

#[cfg(feature = "postgres")]
use quill_infra::{PostgresPostRepository, database::connect};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<dyn PostRepository>,
    pub writer: Arc<PostWriteCoordinator>,
    pub tokens: Arc<dyn TokenService>,
    pub posts_per_page: u64,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> Result<Self, BlobError> {
        let posts = record_store(config).await;

        let blobs = LocalBlobStore::new(&config.storage_root);
        blobs.initialize().await?;

        let state = Self::from_parts(
            posts,
            Arc::new(blobs),
            Arc::new(SystemClock),
            Arc::new(JwtTokenService::new(config.jwt.clone())),
            config.posts_per_page,
            config.max_upload_bytes,
        );

        tracing::info!("Application state initialized");
        Ok(state)
    }

    pub fn from_parts(
        posts: Arc<dyn PostRepository>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        tokens: Arc<dyn TokenService>,
        posts_per_page: u64,
        max_upload_bytes: usize,
    ) -> Self {
        let writer = PostWriteCoordinator::new(posts.clone(), blobs, clock);

        Self {
            posts,
            writer: Arc::new(writer),
            tokens,
            posts_per_page,
            max_upload_bytes,
        }
    }
}

#[cfg(feature = "postgres")]
async fn record_store(config: &AppConfig) -> Arc<dyn PostRepository> {
    match &config.database {
        Some(db_config) => match connect(db_config).await {
            Ok(conn) => return Arc::new(PostgresPostRepository::new(conn)),
            Err(e) => {
                tracing::error!(
                    "Failed to connect to database: {}. Using in-memory fallback.",
                    e
                );
            }
        },
        None => {
            tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
        }
    }

    Arc::new(InMemoryPostRepository::new())
}

#[cfg(not(feature = "postgres"))]
async fn record_store(_config: &AppConfig) -> Arc<dyn PostRepository> {
    tracing::info!("Running without postgres feature - using in-memory repository");
    Arc::new(InMemoryPostRepository::new())
}
