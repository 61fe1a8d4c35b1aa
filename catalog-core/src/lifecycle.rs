//! Plugin lifecycle coordinator: drives each registered plugin through the
//! `Unloaded -> Configured -> Initialized -> Migrated -> Routed -> Running`
//! state machine (spec.md §4.1). One plugin's failure never blocks another's
//! progress (spec.md invariant: "failure isolated per plugin") — grounded in
//! `aerolithdb-core::lib::AerolithsDB::start`'s dependency-ordered subsystem
//! startup, generalized to run independently per plugin instead of as one
//! fixed sequence.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::plugin::CatalogPlugin;
use crate::registry::PluginRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginState {
    Unloaded,
    Configured,
    Initialized,
    Migrated,
    Routed,
    Running,
    Disabled,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PluginStatus {
    pub state: PluginState,
    pub last_error: Option<String>,
}

impl Default for PluginStatus {
    fn default() -> Self {
        Self {
            state: PluginState::Unloaded,
            last_error: None,
        }
    }
}

/// Tracks per-plugin lifecycle state. Read by `/api/plugins` and the
/// `/readyz` probe (spec.md §4.10: readiness requires every plugin be
/// `Running` or `Disabled`, never stuck mid-sequence).
pub struct LifecycleCoordinator {
    registry: Arc<PluginRegistry>,
    statuses: RwLock<BTreeMap<String, PluginStatus>>,
}

impl LifecycleCoordinator {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            statuses: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn status(&self, plugin_name: &str) -> Option<PluginStatus> {
        self.statuses.read().get(plugin_name).cloned()
    }

    pub fn all_statuses(&self) -> BTreeMap<String, PluginStatus> {
        self.statuses.read().clone()
    }

    fn set(&self, name: &str, state: PluginState, last_error: Option<String>) {
        self.statuses
            .write()
            .insert(name.to_string(), PluginStatus { state, last_error });
    }

    /// Drives every registered plugin through the full startup sequence
    /// concurrently. A plugin that fails any step is left `Disabled` with
    /// `lastError` set and does not participate further; other plugins are
    /// unaffected.
    pub async fn start_all(&self) {
        let plugins = self.registry.all();
        let mut handles = Vec::with_capacity(plugins.len());

        for plugin in plugins {
            let name = plugin.descriptor().name;
            self.set(&name, PluginState::Configured, None);
            handles.push(self.drive_one(plugin));
        }

        futures::future::join_all(handles).await;
    }

    async fn drive_one(&self, plugin: Arc<dyn CatalogPlugin>) {
        let name = plugin.descriptor().name;

        if let Err(e) = plugin.init().await {
            self.disable(&name, format!("init failed: {e}"));
            return;
        }
        self.set(&name, PluginState::Initialized, None);

        if let Err(e) = plugin.migrate().await {
            self.disable(&name, format!("migrate failed: {e}"));
            return;
        }
        self.set(&name, PluginState::Migrated, None);

        // `register_routes()` itself is only mounted later by catalog-api,
        // once `start_all` has returned — the route tree is static and
        // doesn't need the plugin to be `Running` first, so `Routed` is set
        // here rather than waiting on that out-of-band step.
        self.set(&name, PluginState::Routed, None);

        if let Err(e) = plugin.start().await {
            self.disable(&name, format!("start failed: {e}"));
            return;
        }
        self.set(&name, PluginState::Running, None);
        info!(plugin = %name, "plugin running");
    }

    fn disable(&self, name: &str, message: String) {
        error!(plugin = %name, error = %message, "disabling plugin after lifecycle failure");
        self.set(name, PluginState::Disabled, Some(message));
    }

    /// `/readyz`: ready once every plugin has left the transient states.
    pub fn ready(&self) -> bool {
        let statuses = self.statuses.read();
        !statuses.is_empty()
            && statuses.values().all(|s| {
                matches!(s.state, PluginState::Running | PluginState::Disabled)
            })
    }

    pub async fn stop_all(&self) {
        for plugin in self.registry.all() {
            let name = plugin.descriptor().name;
            if let Err(e) = plugin.stop().await {
                warn!(plugin = %name, error = %e, "error stopping plugin");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::plugin::PluginDescriptor;
    use async_trait::async_trait;
    use std::any::Any;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct OkPlugin {
        descriptor: PluginDescriptor,
    }

    #[async_trait]
    impl CatalogPlugin for OkPlugin {
        fn descriptor(&self) -> PluginDescriptor {
            self.descriptor.clone()
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

    struct FailingPlugin {
        descriptor: PluginDescriptor,
        stopped: AtomicBool,
    }

    #[async_trait]
    impl CatalogPlugin for FailingPlugin {
        fn descriptor(&self) -> PluginDescriptor {
            self.descriptor.clone()
        }
        async fn init(&self) -> Result<()> {
            Err(crate::error::CatalogError::Internal(anyhow::anyhow!("boom")))
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
            false
        }
        async fn stop(&self) -> Result<()> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn descriptor(name: &str) -> PluginDescriptor {
        PluginDescriptor {
            name: name.to_string(),
            version: "0.1.0".to_string(),
            description: "test".to_string(),
            base_path: format!("/api/{name}/v1alpha1"),
            entity_kinds: vec!["thing".to_string()],
        }
    }

    #[tokio::test]
    async fn healthy_plugin_reaches_running() {
        let registry = Arc::new(PluginRegistry::new());
        registry
            .register(Arc::new(OkPlugin {
                descriptor: descriptor("models"),
            }))
            .unwrap();
        let coordinator = LifecycleCoordinator::new(registry);

        coordinator.start_all().await;

        assert_eq!(coordinator.status("models").unwrap().state, PluginState::Running);
        assert!(coordinator.ready());
    }

    #[tokio::test]
    async fn one_failing_plugin_does_not_block_another() {
        let registry = Arc::new(PluginRegistry::new());
        registry
            .register(Arc::new(OkPlugin {
                descriptor: descriptor("models"),
            }))
            .unwrap();
        registry
            .register(Arc::new(FailingPlugin {
                descriptor: descriptor("agents"),
                stopped: AtomicBool::new(false),
            }))
            .unwrap();
        let coordinator = LifecycleCoordinator::new(registry);

        coordinator.start_all().await;

        assert_eq!(coordinator.status("models").unwrap().state, PluginState::Running);
        let failed = coordinator.status("agents").unwrap();
        assert_eq!(failed.state, PluginState::Disabled);
        assert!(failed.last_error.unwrap().contains("init failed"));
        assert!(coordinator.ready());
    }
}
