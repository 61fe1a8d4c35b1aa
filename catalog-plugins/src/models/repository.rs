//! Postgres-backed `EntityRepository` for the `models` plugin (spec.md
//! §4.5 step 4, §1 "each plugin owns its entity table"). Upsert/delete
//! shape mirrors `catalog_db::refresh_status::RefreshStatusStore`.

use catalog_core::{CatalogError, Result};
use catalog_loader::{EntityDraft, EntityRepository, UpsertStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ModelEntityRow {
    pub id: i64,
    pub source_id: String,
    pub name: String,
    pub custom_properties: serde_json::Value,
    pub create_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
}

pub struct ModelEntityRepository {
    pool: PgPool,
}

impl ModelEntityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_by_source(&self, source_id: &str) -> Result<Vec<ModelEntityRow>> {
        sqlx::query_as::<_, ModelEntityRow>(
            "SELECT * FROM model_entities WHERE source_id = $1 ORDER BY name",
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Internal(anyhow::anyhow!("listing model entities: {e}")))
    }

    pub async fn list_all(&self) -> Result<Vec<ModelEntityRow>> {
        sqlx::query_as::<_, ModelEntityRow>("SELECT * FROM model_entities ORDER BY source_id, name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("listing model entities: {e}")))
    }

    pub async fn get(&self, source_id: &str, name: &str) -> Result<Option<ModelEntityRow>> {
        sqlx::query_as::<_, ModelEntityRow>(
            "SELECT * FROM model_entities WHERE source_id = $1 AND name = $2",
        )
        .bind(source_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CatalogError::Internal(anyhow::anyhow!("fetching model entity: {e}")))
    }
}

#[async_trait::async_trait]
impl EntityRepository for ModelEntityRepository {
    async fn upsert_many(&self, source_id: &str, drafts: &[EntityDraft]) -> Result<UpsertStats> {
        let mut upserted = 0i64;
        for draft in drafts {
            sqlx::query(
                r#"
                INSERT INTO model_entities (source_id, name, custom_properties, last_update_time)
                VALUES ($1, $2, $3, now())
                ON CONFLICT (source_id, name) DO UPDATE SET
                    custom_properties = EXCLUDED.custom_properties,
                    last_update_time = now()
                "#,
            )
            .bind(source_id)
            .bind(&draft.name)
            .bind(&draft.custom_properties)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("upserting model entity {}: {e}", draft.name)))?;
            upserted += 1;
        }
        Ok(UpsertStats { upserted })
    }

    async fn delete_missing(&self, source_id: &str, keep_names: &[String]) -> Result<i64> {
        let result = sqlx::query(
            "DELETE FROM model_entities WHERE source_id = $1 AND NOT (name = ANY($2))",
        )
        .bind(source_id)
        .bind(keep_names)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Internal(anyhow::anyhow!("deleting missing model entities: {e}")))?;
        Ok(result.rows_affected() as i64)
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<i64> {
        let result = sqlx::query("DELETE FROM model_entities WHERE source_id = $1")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("deleting model entities by source: {e}")))?;
        Ok(result.rows_affected() as i64)
    }

    async fn count_by_source(&self, source_id: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM model_entities WHERE source_id = $1")
            .bind(source_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("counting model entities: {e}")))?;
        Ok(count)
    }
}
