use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use winquote_core::CatalogStore;

use super::{CatalogRepository, RepositoryError};
use crate::DbPool;

const CATALOG_KEY: &str = "catalog";

/// Stores the whole catalog as one JSON document keyed by `catalog`.
pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn updated_at(&self) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT updated_at FROM catalog_state WHERE key = ?")
            .bind(CATALOG_KEY)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| row.try_get::<String, _>("updated_at")).transpose().map_err(Into::into)
    }
}

#[async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn load(&self) -> Result<Option<CatalogStore>, RepositoryError> {
        let row = sqlx::query("SELECT payload_json FROM catalog_state WHERE key = ?")
            .bind(CATALOG_KEY)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("payload_json")?;
        CatalogStore::from_json(&raw)
            .map(Some)
            .map_err(|error| RepositoryError::Decode(error.to_string()))
    }

    async fn save(&self, catalog: &CatalogStore) -> Result<(), RepositoryError> {
        let payload = catalog.to_json().map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO catalog_state (key, payload_json, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                 payload_json = excluded.payload_json,
                 updated_at = excluded.updated_at",
        )
        .bind(CATALOG_KEY)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM catalog_state WHERE key = ?")
            .bind(CATALOG_KEY)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
