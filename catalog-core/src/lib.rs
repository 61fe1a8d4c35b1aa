//! Catalog host core: root configuration, the error taxonomy, the plugin
//! trait family, the plugin registry, and the lifecycle coordinator that
//! drives registered plugins through startup and shutdown.
//!
//! Everything that depends on axum, sqlx, or a specific plugin's provider
//! type lives in the sibling `catalog-*` crates; this crate is the shared
//! foundation every one of them depends on.

mod config;
mod error;
mod lifecycle;
mod plugin;
mod registry;

pub use config::{
    AuthConfig, AuthMode, AuthzMode, CatalogConfig, ConfigStoreMode, DatabaseConfig, JobsConfig,
    ServerConfig, StoreConfig,
};
pub use error::{CatalogError, Result};
pub use lifecycle::{LifecycleCoordinator, PluginState, PluginStatus};
pub use plugin::{
    CapabilitiesV2Provider, CatalogPlugin, DiagnosticsProvider, PluginDescriptor, RefreshOutcome,
    RefreshProvider, SourceInspector, SourceManager,
};
pub use registry::PluginRegistry;
