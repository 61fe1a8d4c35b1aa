//! Shared Postgres pool setup and migration runner.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use catalog_core::{CatalogError, DatabaseConfig, Result};

pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.dsn)
        .await
        .map_err(|e| CatalogError::Internal(anyhow::anyhow!("connecting to database: {e}")))
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| CatalogError::Internal(anyhow::anyhow!("running migrations: {e}")))
}
