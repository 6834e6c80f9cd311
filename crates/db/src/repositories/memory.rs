use tokio::sync::RwLock;

use winquote_core::CatalogStore;

use super::{CatalogRepository, RepositoryError};

/// Keeps the serialized catalog in memory, so decode failures behave like the SQL store.
#[derive(Default)]
pub struct InMemoryCatalogRepository {
    payload: RwLock<Option<String>>,
}

impl InMemoryCatalogRepository {
    pub fn with_raw_payload(raw: impl Into<String>) -> Self {
        Self { payload: RwLock::new(Some(raw.into())) }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn load(&self) -> Result<Option<CatalogStore>, RepositoryError> {
        let payload = self.payload.read().await;
        payload
            .as_deref()
            .map(CatalogStore::from_json)
            .transpose()
            .map_err(|error| RepositoryError::Decode(error.to_string()))
    }

    async fn save(&self, catalog: &CatalogStore) -> Result<(), RepositoryError> {
        let raw = catalog.to_json().map_err(|error| RepositoryError::Decode(error.to_string()))?;
        *self.payload.write().await = Some(raw);
        Ok(())
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        *self.payload.write().await = None;
        Ok(())
    }
}
