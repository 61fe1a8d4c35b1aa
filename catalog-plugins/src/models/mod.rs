//! The `models` plugin: a concrete, complete implementation of
//! [`catalog_core::CatalogPlugin`] plus its optional capabilities, serving
//! as the worked example other plugins in this host follow. Ingests flat
//! YAML files of model entries, one row per model, into its own
//! `model_entities` table.

mod capabilities;
mod provider;
mod repository;
mod routes;

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use catalog_core::{
    CatalogPlugin, DiagnosticsProvider, PluginDescriptor, RefreshOutcome, RefreshProvider, Result,
    SourceInspector, SourceManager,
};
use catalog_loader::{Loader, ProviderRegistry};
use catalog_store::SourceConfigStore;
use catalog_validate::{SourceConfig, SourceOrigin};
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};

pub use repository::{ModelEntityRepository, ModelEntityRow};

const BASE_PATH: &str = "/api/models/v1alpha1";
const PLUGIN_NAME: &str = "models";

pub struct ModelsPlugin {
    pool: PgPool,
    config_store: Arc<dyn SourceConfigStore>,
    collection: Arc<catalog_loader::SourceCollection>,
    repository: Arc<ModelEntityRepository>,
    loader: Arc<Loader>,
}

impl ModelsPlugin {
    pub fn new(
        pool: PgPool,
        config_store: Arc<dyn SourceConfigStore>,
        refresh_status: Arc<catalog_db::RefreshStatusStore>,
    ) -> Self {
        let collection = Arc::new(catalog_loader::SourceCollection::new());
        let repository = Arc::new(ModelEntityRepository::new(pool.clone()));

        let mut providers = ProviderRegistry::new();
        providers.register(
            "yaml",
            Arc::new(|config: &SourceConfig| {
                Arc::new(provider::YamlFileProvider::new(config)) as Arc<dyn catalog_loader::Provider>
            }),
        );

        let loader = Arc::new(Loader::new(
            PLUGIN_NAME,
            collection.clone(),
            providers,
            repository.clone() as Arc<dyn catalog_loader::EntityRepository>,
            refresh_status,
        ));

        Self {
            pool,
            config_store,
            collection,
            repository,
            loader,
        }
    }

    pub fn loader(&self) -> Arc<Loader> {
        self.loader.clone()
    }

    pub fn collection(&self) -> Arc<catalog_loader::SourceCollection> {
        self.collection.clone()
    }

    /// Loads every persisted source config into the in-memory collection.
    /// Configs are assumed already-valid — they only reach the store via
    /// `apply-source`, which runs the full validator first.
    async fn load_sources_from_store(&self) -> Result<()> {
        let ids = self.config_store.list_sources(PLUGIN_NAME).await?;
        let mut merged = BTreeMap::new();
        for id in ids {
            let (payload, revision) = self.config_store.get(PLUGIN_NAME, &id).await?;
            match serde_yaml::from_slice::<SourceConfig>(&payload) {
                Ok(mut config) => {
                    config.revision = Some(revision);
                    merged.insert(config.id.clone(), config);
                }
                Err(e) => warn!(source_id = %id, error = %e, "skipping unparseable persisted source config"),
            }
        }
        self.collection.merge(SourceOrigin::Api, merged);
        Ok(())
    }
}

#[async_trait]
impl CatalogPlugin for ModelsPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            name: PLUGIN_NAME.to_string(),
            version: "0.1.0".to_string(),
            description: "Catalogs machine learning models".to_string(),
            base_path: BASE_PATH.to_string(),
            entity_kinds: vec!["Model".to_string()],
        }
    }

    async fn init(&self) -> Result<()> {
        info!(plugin = PLUGIN_NAME, "initializing models plugin");
        Ok(())
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| catalog_core::CatalogError::Internal(anyhow::anyhow!("models plugin migration: {e}")))
    }

    fn register_routes(&self) -> Box<dyn Any + Send> {
        Box::new(routes::router(self.repository.clone()))
    }

    async fn start(&self) -> Result<()> {
        self.load_sources_from_store().await?;
        let outcomes = self.loader.reload_all().await;
        info!(plugin = PLUGIN_NAME, sources = outcomes.len(), "models plugin completed initial load");
        Ok(())
    }

    async fn healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn stop(&self) -> Result<()> {
        info!(plugin = PLUGIN_NAME, "stopping models plugin");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_source_manager(&self) -> Option<&dyn SourceManager> {
        Some(self)
    }

    fn as_refresh_provider(&self) -> Option<&dyn RefreshProvider> {
        Some(self)
    }

    fn as_diagnostics_provider(&self) -> Option<&dyn DiagnosticsProvider> {
        Some(self)
    }

    fn as_capabilities_v2_provider(&self) -> Option<&dyn catalog_core::CapabilitiesV2Provider> {
        Some(self)
    }

    fn as_source_inspector(&self) -> Option<&dyn SourceInspector> {
        Some(self)
    }
}

#[async_trait]
impl SourceManager for ModelsPlugin {
    async fn validate_source(&self, properties: &BTreeMap<String, serde_json::Value>) -> Result<()> {
        provider::validate_properties(properties)
    }

    fn provider_types(&self) -> Vec<String> {
        vec!["yaml".to_string()]
    }
}

#[async_trait]
impl RefreshProvider for ModelsPlugin {
    async fn refresh_source(&self, source_id: &str) -> Result<RefreshOutcome> {
        self.loader.reload_source(source_id).await
    }

    async fn refresh_all(&self) -> Result<Vec<RefreshOutcome>> {
        Ok(self.loader.reload_all().await)
    }
}

#[async_trait]
impl DiagnosticsProvider for ModelsPlugin {
    async fn diagnostics(&self) -> Result<serde_json::Value> {
        let sources = self.collection.all_sources();
        let mut per_source = Vec::with_capacity(sources.len());
        for source in &sources {
            let count = self.repository.count_by_source(&source.id).await.unwrap_or(0);
            per_source.push(serde_json::json!({
                "sourceId": source.id,
                "enabled": source.is_enabled(),
                "entityCount": count,
            }));
        }
        Ok(serde_json::json!({ "plugin": PLUGIN_NAME, "sources": per_source }))
    }
}

impl catalog_core::CapabilitiesV2Provider for ModelsPlugin {
    fn capabilities_v2(&self) -> serde_json::Value {
        capabilities::document(BASE_PATH)
    }
}

#[async_trait]
impl SourceInspector for ModelsPlugin {
    async fn list_sources(&self) -> Result<Vec<serde_json::Value>> {
        Ok(self.collection.all_sources().iter().map(to_source_json).collect())
    }

    async fn get_source(&self, source_id: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.collection.get(source_id).as_ref().map(to_source_json))
    }

    async fn sync_sources(&self) -> Result<()> {
        self.load_sources_from_store().await
    }

    async fn remove_source(&self, source_id: &str) -> Result<()> {
        self.repository.delete_by_source(source_id).await?;
        self.collection.remove(source_id);
        Ok(())
    }
}

/// Builds the JSON representation of a source config exposed over the
/// management surface, redacting property values through
/// `catalog_validate::redact_properties` rather than the lossy
/// `properties_as_json` used for plugin-internal validation.
fn to_source_json(config: &SourceConfig) -> serde_json::Value {
    json!({
        "id": config.id,
        "name": config.name,
        "type": config.source_type,
        "enabled": config.is_enabled(),
        "labels": config.labels,
        "origin": config.origin,
        "revision": config.revision,
        "properties": catalog_validate::redact_properties(&config.properties),
    })
}
