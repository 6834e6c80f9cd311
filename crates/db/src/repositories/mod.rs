use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use winquote_core::CatalogStore;

pub mod catalog;
pub mod memory;

pub use catalog::SqlCatalogRepository;
pub use memory::InMemoryCatalogRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable home of the session catalog. Saves replace the whole catalog.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn load(&self) -> Result<Option<CatalogStore>, RepositoryError>;
    async fn save(&self, catalog: &CatalogStore) -> Result<(), RepositoryError>;
    async fn clear(&self) -> Result<(), RepositoryError>;
}

/// Returns the persisted catalog, or the built-in one when nothing usable is stored.
/// A corrupt payload is logged and ignored; database failures propagate.
pub async fn load_catalog_or_defaults<R>(repository: &R) -> Result<CatalogStore, RepositoryError>
where
    R: CatalogRepository + ?Sized,
{
    match repository.load().await {
        Ok(Some(catalog)) => {
            info!(
                event_name = "catalog.loaded",
                categories = catalog.len(),
                "persisted catalog loaded"
            );
            Ok(catalog)
        }
        Ok(None) => Ok(CatalogStore::with_defaults()),
        Err(RepositoryError::Decode(reason)) => {
            warn!(
                event_name = "catalog.load_failed",
                reason = %reason,
                "persisted catalog is unreadable, using defaults"
            );
            Ok(CatalogStore::with_defaults())
        }
        Err(error) => Err(error),
    }
}
