//! Provider Registry (spec.md §4.4): maps a source's `type` to a factory
//! that produces a `Provider`, the pure-relative-to-the-DB reader for that
//! source type.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use catalog_core::Result;
use catalog_validate::SourceConfig;
use serde_json::Value as Json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A draft entity produced by a provider, not yet persisted. `name` is
/// unique within the owning source (spec.md §3.1 "Entity").
#[derive(Debug, Clone)]
pub struct EntityDraft {
    pub name: String,
    pub custom_properties: Json,
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn load(&self) -> Result<Vec<EntityDraft>>;

    /// Optional push-based hot reload: long-lived producers notify via
    /// `tx` whenever the upstream source changes. Default: no watch support.
    async fn watch(&self, _tx: mpsc::Sender<()>, _cancel: CancellationToken) -> Result<()> {
        Ok(())
    }
}

pub type ProviderFactory = Arc<dyn Fn(&SourceConfig) -> Arc<dyn Provider> + Send + Sync>;

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source_type: impl Into<String>, factory: ProviderFactory) {
        self.factories.insert(source_type.into(), factory);
    }

    pub fn provider_types(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn build(&self, config: &SourceConfig) -> Option<Arc<dyn Provider>> {
        self.factories.get(&config.source_type).map(|factory| factory(config))
    }
}
