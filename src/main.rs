//! Catalog host entry point: wires the plugin registry, the shared Postgres
//! pool, the source config store backend, identity/authorization, the
//! refresh job queue and its leader-elected worker pool, and the HTTP
//! surface, then runs until a shutdown signal arrives (spec.md §6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use catalog_core::{CatalogConfig, ConfigStoreMode, LifecycleCoordinator, PluginRegistry};
use catalog_jobs::{LeaderElection, RateLimiter, WorkerPool};
use catalog_plugins::ModelsPlugin;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("catalog_host=info".parse()?))
        .json()
        .init();

    info!("starting catalog host");

    let config = Arc::new(CatalogConfig::load().await?);

    let pool = catalog_db::connect(&config.database).await?;
    catalog_db::run_migrations(&pool).await?;

    let config_store: Arc<dyn catalog_store::SourceConfigStore> = match config.store.mode {
        ConfigStoreMode::File => Arc::new(catalog_store::FileConfigStore::new(
            config.store.file_root.clone(),
            config.store.min_retained_revisions,
            config.store.max_payload_bytes,
        )),
        ConfigStoreMode::K8s => {
            let base_url = std::env::var("CATALOG_CLUSTER_API_BASE_URL")
                .unwrap_or_else(|_| config.store.file_root.to_string_lossy().into_owned());
            Arc::new(catalog_store::ClusterApiConfigStore::new(base_url))
        }
    };

    let refresh_status = Arc::new(catalog_db::RefreshStatusStore::new(pool.clone()));

    let registry = Arc::new(PluginRegistry::new());
    let models_plugin = Arc::new(ModelsPlugin::new(pool.clone(), config_store.clone(), refresh_status.clone()));
    registry.register(models_plugin.clone())?;

    let lifecycle = Arc::new(LifecycleCoordinator::new(registry.clone()));
    lifecycle.start_all().await;

    let jwt_secret = std::env::var("CATALOG_JWT_HMAC_SECRET").unwrap_or_default();
    let identity_extractor: Arc<dyn catalog_security::IdentityExtractor> =
        Arc::from(catalog_security::extractor_for(&config.auth, jwt_secret.as_bytes()));
    let review_url = std::env::var("CATALOG_SAR_REVIEW_URL").ok();
    let authorizer: Arc<dyn catalog_security::Authorizer> =
        Arc::from(catalog_security::authorizer_for(config.auth.authz_mode, review_url));

    let refresh_jobs = Arc::new(catalog_db::RefreshJobRepo::new(pool.clone()));
    let rate_limiter = Arc::new(RateLimiter::new(config.jobs.refresh_cooldown));
    let is_leader = Arc::new(AtomicBool::new(false));
    let replica_id = std::env::var("CATALOG_REPLICA_ID").unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());

    let shutdown = CancellationToken::new();

    let mut loaders = std::collections::BTreeMap::new();
    loaders.insert("models".to_string(), models_plugin.loader());
    let worker_pool = Arc::new(WorkerPool::new(refresh_jobs.clone(), loaders, config.jobs.clone(), config.namespace.clone()));
    let leader_election = Arc::new(LeaderElection::new(pool.clone()));
    tokio::spawn(run_leader_loop(leader_election, is_leader.clone(), worker_pool, shutdown.clone()));

    if config.store.mode == ConfigStoreMode::File {
        tokio::spawn(run_file_watcher(
            config.store.file_root.clone(),
            registry.clone(),
            shutdown.clone(),
        ));
    }

    let ctx = Arc::new(catalog_api::ApiContext {
        config: config.clone(),
        registry,
        lifecycle: lifecycle.clone(),
        config_store,
        refresh_jobs,
        rate_limiter,
        identity_extractor,
        authorizer,
        is_leader,
        replica_id,
    });

    let app = catalog_api::build_router(ctx);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "catalog host listening");

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
        .await?;

    Ok(())
}

/// Repeatedly attempts the advisory lock; while held, runs the refresh job
/// worker pool. Exposed to `/readyz` via `is_leader` (spec.md §4.11).
async fn run_leader_loop(
    election: Arc<LeaderElection>,
    is_leader: Arc<AtomicBool>,
    worker_pool: Arc<WorkerPool>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        if election.try_acquire().await {
            is_leader.store(true, Ordering::SeqCst);
            Arc::clone(&worker_pool).run(cancel.clone()).await;
            election.release().await;
            is_leader.store(false, Ordering::SeqCst);
        }

        if cancel.is_cancelled() {
            break;
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

/// Bridges file-backend change notifications to a scoped reload of the
/// affected plugin's source (spec.md §4.2, §4.4).
async fn run_file_watcher(root: std::path::PathBuf, registry: Arc<PluginRegistry>, cancel: CancellationToken) {
    let mut changes = catalog_store::FileWatcher::new(root).start(cancel.clone());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = changes.recv() => {
                let Some((plugin_name, source_id)) = changed else { break };
                let Some(plugin) = registry.get(&plugin_name) else { continue };

                if let Some(inspector) = plugin.as_source_inspector() {
                    if let Err(e) = inspector.sync_sources().await {
                        error!(plugin = %plugin_name, error = %e, "reconciling sources after file change");
                        continue;
                    }
                }
                if let Some(refresh) = plugin.as_refresh_provider() {
                    if let Err(e) = refresh.refresh_source(&source_id).await {
                        error!(plugin = %plugin_name, source_id = %source_id, error = %e, "refreshing source after file change");
                    }
                }
            }
        }
    }
}
