//! Refresh Job Queue table repository (spec.md §3.1 "Refresh Job", §4.6).
//! The claim query is grounded directly in
//! `riptide-persistence::adapters::outbox_publisher::poll_and_publish`'s use
//! of `FOR UPDATE SKIP LOCKED` to let multiple workers drain one table
//! safely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use catalog_core::{CatalogError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobState {
    fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshJob {
    pub id: Uuid,
    pub namespace: String,
    pub plugin_name: String,
    pub source_id: Option<String>,
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
    pub state: String,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub next_attempt_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
}

pub struct RefreshJobRepo {
    pool: PgPool,
}

impl RefreshJobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns an existing in-flight/terminal job matching `idempotency_key`
    /// if one exists, so `enqueue` can be idempotent (spec.md §4.6: "If an
    /// idempotencyKey matches an existing terminal or in-flight job, return
    /// that job id").
    pub async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<RefreshJob>> {
        sqlx::query_as::<_, RefreshJob>("SELECT * FROM refresh_jobs WHERE idempotency_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("looking up job by idempotency key: {e}")))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn enqueue(
        &self,
        namespace: &str,
        plugin_name: &str,
        source_id: Option<&str>,
        requested_by: &str,
        idempotency_key: Option<&str>,
    ) -> Result<RefreshJob> {
        let job = RefreshJob {
            id: Uuid::new_v4(),
            namespace: namespace.to_string(),
            plugin_name: plugin_name.to_string(),
            source_id: source_id.map(str::to_string),
            requested_by: requested_by.to_string(),
            requested_at: Utc::now(),
            state: JobState::Queued.as_str().to_string(),
            attempt_count: 0,
            last_error: None,
            started_at: None,
            finished_at: None,
            next_attempt_at: Utc::now(),
            idempotency_key: idempotency_key.map(str::to_string),
        };

        sqlx::query(
            r#"
            INSERT INTO refresh_jobs
                (id, namespace, plugin_name, source_id, requested_by, requested_at,
                 state, attempt_count, next_attempt_at, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.id)
        .bind(&job.namespace)
        .bind(&job.plugin_name)
        .bind(&job.source_id)
        .bind(&job.requested_by)
        .bind(job.requested_at)
        .bind(&job.state)
        .bind(job.attempt_count)
        .bind(job.next_attempt_at)
        .bind(&job.idempotency_key)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Internal(anyhow::anyhow!("enqueuing refresh job: {e}")))?;

        Ok(job)
    }

    /// Claims up to one queued, due job whose `(plugin_name, source_id)`
    /// has no other `running` job, honoring concurrency caps the caller has
    /// already checked. `FOR UPDATE SKIP LOCKED` lets multiple worker
    /// processes race this query safely.
    pub async fn claim_next(&self, namespace: &str) -> Result<Option<RefreshJob>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("starting claim transaction: {e}")))?;

        let job = sqlx::query_as::<_, RefreshJob>(
            r#"
            SELECT * FROM refresh_jobs
            WHERE namespace = $1
              AND state = 'queued'
              AND next_attempt_at <= now()
            ORDER BY requested_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(namespace)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CatalogError::Internal(anyhow::anyhow!("claiming refresh job: {e}")))?;

        let Some(mut job) = job else {
            tx.commit().await.ok();
            return Ok(None);
        };

        sqlx::query("UPDATE refresh_jobs SET state = 'running', started_at = now() WHERE id = $1")
            .bind(job.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("marking job running: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("committing claim transaction: {e}")))?;

        job.state = JobState::Running.as_str().to_string();
        Ok(Some(job))
    }

    pub async fn count_running(&self, namespace: Option<&str>, plugin_name: Option<&str>) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT count(*) FROM refresh_jobs
            WHERE state = 'running'
              AND ($1::text IS NULL OR namespace = $1)
              AND ($2::text IS NULL OR plugin_name = $2)
            "#,
        )
        .bind(namespace)
        .bind(plugin_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CatalogError::Internal(anyhow::anyhow!("counting running jobs: {e}")))?;
        Ok(row.0)
    }

    pub async fn mark_succeeded(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE refresh_jobs SET state = 'succeeded', finished_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("marking job succeeded: {e}")))?;
        Ok(())
    }

    /// Records a failed attempt. If `attempt_count` (after increment) is
    /// still under `max_attempts`, reschedules as `queued` with
    /// `next_attempt_at` pushed out by the caller's backoff computation;
    /// otherwise terminal `failed`.
    pub async fn mark_attempt_failed(
        &self,
        id: Uuid,
        error: &str,
        max_attempts: u32,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let retry = next_attempt_at.is_some();

        sqlx::query(
            r#"
            UPDATE refresh_jobs
            SET attempt_count = attempt_count + 1,
                last_error = $2,
                state = CASE WHEN attempt_count + 1 < $3 AND $4 THEN 'queued' ELSE 'failed' END,
                next_attempt_at = COALESCE($5, next_attempt_at),
                finished_at = CASE WHEN attempt_count + 1 < $3 AND $4 THEN NULL ELSE now() END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(max_attempts as i32)
        .bind(retry)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Internal(anyhow::anyhow!("marking job attempt failed: {e}")))?;

        Ok(())
    }

    pub async fn cancel(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE refresh_jobs SET state = 'canceled', finished_at = now() WHERE id = $1 AND state IN ('queued', 'running')",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Internal(anyhow::anyhow!("canceling job: {e}")))?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<RefreshJob>> {
        sqlx::query_as::<_, RefreshJob>("SELECT * FROM refresh_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("fetching job: {e}")))
    }
}
