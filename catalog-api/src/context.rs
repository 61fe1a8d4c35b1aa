//! Shared state handed to every axum handler in this crate.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use catalog_core::{CatalogConfig, LifecycleCoordinator, PluginRegistry};
use catalog_db::RefreshJobRepo;
use catalog_jobs::RateLimiter;
use catalog_security::{Authorizer, IdentityExtractor};
use catalog_store::SourceConfigStore;

#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<CatalogConfig>,
    pub registry: Arc<PluginRegistry>,
    pub lifecycle: Arc<LifecycleCoordinator>,
    pub config_store: Arc<dyn SourceConfigStore>,
    pub refresh_jobs: Arc<RefreshJobRepo>,
    pub rate_limiter: Arc<RateLimiter>,
    pub identity_extractor: Arc<dyn IdentityExtractor>,
    pub authorizer: Arc<dyn Authorizer>,
    /// Set by the leader-election task in the host binary; read by `/readyz`
    /// (spec.md §4.11: "the leader's identity is exposed in `/readyz`").
    pub is_leader: Arc<AtomicBool>,
    pub replica_id: String,
}
