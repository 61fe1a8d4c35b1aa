//! Process-wide plugin directory. Grounded in `aerolithdb-plugins::PluginManager`,
//! generalized from a name-keyed `HashMap` to a `DashMap` so lookups from
//! concurrent request handlers don't need an outer lock (spec.md §5: "No
//! module-level mutable state beyond the Plugin Registry (init-time write,
//! read-only thereafter)").

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::error::{CatalogError, Result};
use crate::plugin::{CatalogPlugin, PluginDescriptor};

/// Directory mapping plugin name to its handle. Populated exactly once at
/// startup by enumerating a compiled-in set of plugin factories (spec.md
/// §9: "a single blank import wires a plugin in" restated for a statically
/// typed host as an explicit wiring table).
#[derive(Default)]
pub struct PluginRegistry {
    plugins: DashMap<String, Arc<dyn CatalogPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin. Fails if `name` or `base_path` collides with an
    /// already-registered plugin (spec.md §8 invariant).
    pub fn register(&self, plugin: Arc<dyn CatalogPlugin>) -> Result<()> {
        let descriptor = plugin.descriptor();

        if self.plugins.contains_key(&descriptor.name) {
            return Err(CatalogError::Validation(format!(
                "plugin name already registered: {}",
                descriptor.name
            )));
        }
        if self.base_path_taken(&descriptor.base_path) {
            return Err(CatalogError::Validation(format!(
                "plugin basePath already registered: {}",
                descriptor.base_path
            )));
        }

        info!(plugin = %descriptor.name, base_path = %descriptor.base_path, "registering plugin");
        self.plugins.insert(descriptor.name.clone(), plugin);
        Ok(())
    }

    fn base_path_taken(&self, base_path: &str) -> bool {
        self.plugins
            .iter()
            .any(|entry| entry.value().descriptor().base_path == base_path)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CatalogPlugin>> {
        self.plugins.get(name).map(|e| Arc::clone(e.value()))
    }

    pub fn list(&self) -> Vec<PluginDescriptor> {
        self.plugins.iter().map(|e| e.value().descriptor()).collect()
    }

    pub fn all(&self) -> Vec<Arc<dyn CatalogPlugin>> {
        self.plugins.iter().map(|e| Arc::clone(e.value())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginDescriptor;
    use async_trait::async_trait;
    use std::any::Any;

    struct StubPlugin(PluginDescriptor);

    #[async_trait]
    impl CatalogPlugin for StubPlugin {
        fn descriptor(&self) -> PluginDescriptor {
            self.0.clone()
        }
        async fn init(&self) -> Result<()> {
            Ok(())
        }
        async fn migrate(&self) -> Result<()> {
            Ok(())
        }
        fn register_routes(&self) -> Box<dyn Any + Send> {
            Box::new(())
        }
        async fn start(&self) -> Result<()> {
            Ok(())
        }
        async fn healthy(&self) -> bool {
            true
        }
        async fn stop(&self) -> Result<()> {
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn stub(name: &str, base_path: &str) -> Arc<dyn CatalogPlugin> {
        Arc::new(StubPlugin(PluginDescriptor {
            name: name.to_string(),
            version: "0.1.0".to_string(),
            description: "stub".to_string(),
            base_path: base_path.to_string(),
            entity_kinds: vec!["thing".to_string()],
        }))
    }

    #[test]
    fn rejects_duplicate_name() {
        let registry = PluginRegistry::new();
        registry.register(stub("models", "/api/models/v1alpha1")).unwrap();
        let err = registry
            .register(stub("models", "/api/models2/v1alpha1"))
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn rejects_duplicate_base_path() {
        let registry = PluginRegistry::new();
        registry.register(stub("models", "/api/shared/v1alpha1")).unwrap();
        let err = registry
            .register(stub("agents", "/api/shared/v1alpha1"))
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn lists_registered_plugins() {
        let registry = PluginRegistry::new();
        registry.register(stub("models", "/api/models/v1alpha1")).unwrap();
        registry.register(stub("agents", "/api/agents/v1alpha1")).unwrap();
        let mut names: Vec<_> = registry.list().into_iter().map(|d| d.name).collect();
        names.sort();
        assert_eq!(names, vec!["agents".to_string(), "models".to_string()]);
    }
}
