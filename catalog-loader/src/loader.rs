//! Per-plugin reload pipeline (spec.md §4.5). One `Loader` per plugin,
//! holding exclusive write access to that plugin's `SourceCollection`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use catalog_core::{RefreshOutcome, Result};
use catalog_db::{RefreshStatusKind, RefreshStatusStore};
use catalog_validate::SourceConfig;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tracing::{info, warn};

use crate::collection::SourceCollection;
use crate::provider::ProviderRegistry;
use crate::repository::EntityRepository;

const DEFAULT_CONCURRENCY: usize = 4;

pub struct Loader {
    plugin_name: String,
    collection: Arc<SourceCollection>,
    providers: ProviderRegistry,
    repository: Arc<dyn EntityRepository>,
    refresh_status: Arc<RefreshStatusStore>,
    concurrency: Arc<Semaphore>,
    /// Per-source mutex held for the full duration of a reload, so a new
    /// reload of source S waits for the previous one to finish (spec.md §5
    /// "Within one source, loads serialize").
    source_locks: SyncMutex<BTreeMap<String, Arc<AsyncMutex<()>>>>,
}

impl Loader {
    pub fn new(
        plugin_name: impl Into<String>,
        collection: Arc<SourceCollection>,
        providers: ProviderRegistry,
        repository: Arc<dyn EntityRepository>,
        refresh_status: Arc<RefreshStatusStore>,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            collection,
            providers,
            repository,
            refresh_status,
            concurrency: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            source_locks: SyncMutex::new(BTreeMap::new()),
        }
    }

    fn lock_for(&self, source_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.source_locks.lock();
        locks.entry(source_id.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Reloads every enabled source, bounded by the default concurrency cap.
    /// A single source's provider error is recovered locally (spec.md §4.5
    /// step 3) and never fails the whole reload.
    pub async fn reload_all(&self) -> Vec<RefreshOutcome> {
        let sources = self.collection.enabled_sources();
        let mut tasks = FuturesUnordered::new();

        for source in sources {
            let permit = self.concurrency.clone();
            tasks.push(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                self.reload_one(&source).await
            });
        }

        let mut outcomes = Vec::new();
        while let Some(outcome) = tasks.next().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Scoped single-source reload, used both for `refresh/{sourceId}` and
    /// for provider `Watch` notifications (spec.md §4.5 "Hot reload").
    pub async fn reload_source(&self, source_id: &str) -> Result<RefreshOutcome> {
        let source = self
            .collection
            .get(source_id)
            .ok_or_else(|| catalog_core::CatalogError::NotFound(format!("source {source_id} not found")))?;
        Ok(self.reload_one(&source).await)
    }

    async fn reload_one(&self, source: &SourceConfig) -> RefreshOutcome {
        let lock = self.lock_for(&source.id);
        let _guard = lock.lock().await;

        let started = Instant::now();
        let result = self.run_source(source).await;
        let duration_ms = started.elapsed().as_millis() as i64;

        match result {
            Ok((loaded, removed)) => {
                if let Err(e) = self
                    .refresh_status
                    .upsert(
                        &source.id,
                        &self.plugin_name,
                        RefreshStatusKind::Success,
                        Some("refresh completed"),
                        None,
                        loaded,
                        removed,
                        duration_ms,
                    )
                    .await
                {
                    warn!(source_id = %source.id, error = %e, "failed to persist refresh status");
                }
                info!(source_id = %source.id, loaded, removed, duration_ms, "source reloaded");
                RefreshOutcome {
                    source_id: source.id.clone(),
                    entities_loaded: loaded,
                    entities_removed: removed,
                    duration_ms,
                    error: None,
                }
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(persist_err) = self
                    .refresh_status
                    .upsert(
                        &source.id,
                        &self.plugin_name,
                        RefreshStatusKind::Error,
                        None,
                        Some(&message),
                        0,
                        0,
                        duration_ms,
                    )
                    .await
                {
                    warn!(source_id = %source.id, error = %persist_err, "failed to persist refresh status");
                }
                warn!(source_id = %source.id, error = %message, "source reload failed, leaving existing rows intact");
                RefreshOutcome {
                    source_id: source.id.clone(),
                    entities_loaded: 0,
                    entities_removed: 0,
                    duration_ms,
                    error: Some(message),
                }
            }
        }
    }

    async fn run_source(&self, source: &SourceConfig) -> Result<(i64, i64)> {
        let provider = self.providers.build(source).ok_or_else(|| {
            catalog_core::CatalogError::Provider {
                source_id: source.id.clone(),
                message: format!("no provider registered for type {:?}", source.source_type),
            }
        })?;

        let drafts = provider.load().await.map_err(|e| catalog_core::CatalogError::Provider {
            source_id: source.id.clone(),
            message: e.to_string(),
        })?;

        let keep_names: Vec<String> = drafts.iter().map(|d| d.name.clone()).collect();
        let stats = self.repository.upsert_many(&source.id, &drafts).await?;
        let removed = self.repository.delete_missing(&source.id, &keep_names).await?;

        Ok((stats.upserted, removed))
    }
}
