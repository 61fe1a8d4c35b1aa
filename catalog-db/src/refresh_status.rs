//! Refresh Status Store (spec.md §3.1, §4.7): persists per-source ingestion
//! telemetry that survives restart, upserted after every refresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use catalog_core::{CatalogError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum RefreshStatusKind {
    Success,
    Error,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshStatusRecord {
    pub source_id: String,
    pub plugin_name: String,
    pub last_refresh_time: Option<DateTime<Utc>>,
    #[sqlx(rename = "last_refresh_status")]
    pub last_refresh_status: String,
    pub last_refresh_summary: Option<String>,
    pub last_error: Option<String>,
    pub entities_loaded: i64,
    pub entities_removed: i64,
    pub duration_ms: i64,
    pub updated_at: DateTime<Utc>,
}

pub struct RefreshStatusStore {
    pool: PgPool,
}

impl RefreshStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(
        &self,
        source_id: &str,
        plugin_name: &str,
        status: RefreshStatusKind,
        summary: Option<&str>,
        last_error: Option<&str>,
        entities_loaded: i64,
        entities_removed: i64,
        duration_ms: i64,
    ) -> Result<()> {
        let status_str = match status {
            RefreshStatusKind::Success => "success",
            RefreshStatusKind::Error => "error",
            RefreshStatusKind::Partial => "partial",
        };

        sqlx::query(
            r#"
            INSERT INTO refresh_status
                (source_id, plugin_name, last_refresh_time, last_refresh_status,
                 last_refresh_summary, last_error, entities_loaded, entities_removed,
                 duration_ms, updated_at)
            VALUES ($1, $2, now(), $3, $4, $5, $6, $7, $8, now())
            ON CONFLICT (source_id) DO UPDATE SET
                plugin_name = EXCLUDED.plugin_name,
                last_refresh_time = EXCLUDED.last_refresh_time,
                last_refresh_status = EXCLUDED.last_refresh_status,
                last_refresh_summary = EXCLUDED.last_refresh_summary,
                last_error = EXCLUDED.last_error,
                entities_loaded = EXCLUDED.entities_loaded,
                entities_removed = EXCLUDED.entities_removed,
                duration_ms = EXCLUDED.duration_ms,
                updated_at = now()
            "#,
        )
        .bind(source_id)
        .bind(plugin_name)
        .bind(status_str)
        .bind(summary)
        .bind(last_error)
        .bind(entities_loaded)
        .bind(entities_removed)
        .bind(duration_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Internal(anyhow::anyhow!("upserting refresh status: {e}")))?;

        Ok(())
    }

    pub async fn get(&self, source_id: &str) -> Result<Option<RefreshStatusRecord>> {
        sqlx::query_as::<_, RefreshStatusRecord>("SELECT * FROM refresh_status WHERE source_id = $1")
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("fetching refresh status: {e}")))
    }

    pub async fn list_by_plugin(&self, plugin_name: &str) -> Result<Vec<RefreshStatusRecord>> {
        sqlx::query_as::<_, RefreshStatusRecord>("SELECT * FROM refresh_status WHERE plugin_name = $1")
            .bind(plugin_name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("listing refresh status: {e}")))
    }

    pub async fn delete(&self, source_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM refresh_status WHERE source_id = $1")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("deleting refresh status: {e}")))?;
        Ok(())
    }
}
