//! Core plugin trait and the optional capability traits plugins may also
//! implement. Grounded in the `AerolithsPlugin` trait family
//! (`aerolithdb-plugins::lib`), generalized from a fixed `PluginType` enum
//! to capability-set discovery via defaulted `as_*` accessor methods, since
//! Rust trait objects can't downcast from one trait to another the way
//! `std::any::Any` downcasts to a concrete type (spec.md §9).

use std::any::Any;
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identity of a plugin, established once at registration and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Unique route prefix, e.g. `/api/mcpservers/v1alpha1`.
    pub base_path: String,
    pub entity_kinds: Vec<String>,
}

/// The mandatory lifecycle surface every plugin implements.
///
/// Optional capabilities (`SourceManager`, `RefreshProvider`,
/// `DiagnosticsProvider`, `CapabilitiesV2Provider`, `SourceInspector`) are
/// probed for via the defaulted `as_*` methods below: a plugin that also
/// implements the capability trait overrides the matching accessor to
/// return `Some(self)`, everything else keeps the `None` default. This is
/// the capability-set pattern of spec.md §9 translated into a statically
/// typed, object-safe form.
#[async_trait]
pub trait CatalogPlugin: Send + Sync {
    fn descriptor(&self) -> PluginDescriptor;

    async fn init(&self) -> Result<()>;

    /// Runs schema/bootstrap migrations. Must be idempotent: called exactly
    /// once per process start, but plugins cannot assume they're the only
    /// replica doing so (the host guards this with an advisory lock).
    async fn migrate(&self) -> Result<()>;

    /// Registers plugin-owned entity query routes onto the shared router.
    /// Implemented in `catalog-api` via a axum `Router` the plugin returns;
    /// kept opaque here (`Any`) to avoid a core -> axum dependency.
    fn register_routes(&self) -> Box<dyn Any + Send>;

    async fn start(&self) -> Result<()>;

    async fn healthy(&self) -> bool;

    async fn stop(&self) -> Result<()>;

    /// Used for capability probing; plugins should return `self`.
    fn as_any(&self) -> &dyn Any;

    fn as_source_manager(&self) -> Option<&dyn SourceManager> {
        None
    }

    fn as_refresh_provider(&self) -> Option<&dyn RefreshProvider> {
        None
    }

    fn as_diagnostics_provider(&self) -> Option<&dyn DiagnosticsProvider> {
        None
    }

    fn as_capabilities_v2_provider(&self) -> Option<&dyn CapabilitiesV2Provider> {
        None
    }

    fn as_source_inspector(&self) -> Option<&dyn SourceInspector> {
        None
    }
}

/// Optional capability: the plugin manages ingestion sources.
#[async_trait]
pub trait SourceManager: Send + Sync {
    /// Validate a candidate source's plugin-specific properties (layer 5 of
    /// the multi-layer validator). Errors here are always treated as
    /// validation errors, never warnings.
    async fn validate_source(&self, properties: &BTreeMap<String, serde_json::Value>) -> Result<()>;

    /// Registered provider types this plugin understands, e.g. `["yaml", "git", "http"]`.
    fn provider_types(&self) -> Vec<String>;
}

/// Optional capability: the plugin can run a refresh cycle on demand.
#[async_trait]
pub trait RefreshProvider: Send + Sync {
    async fn refresh_source(&self, source_id: &str) -> Result<RefreshOutcome>;
    async fn refresh_all(&self) -> Result<Vec<RefreshOutcome>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshOutcome {
    pub source_id: String,
    pub entities_loaded: i64,
    pub entities_removed: i64,
    pub duration_ms: i64,
    pub error: Option<String>,
}

/// Optional capability: the plugin exposes extra free-form diagnostics.
#[async_trait]
pub trait DiagnosticsProvider: Send + Sync {
    async fn diagnostics(&self) -> Result<serde_json::Value>;
}

/// Optional capability: the plugin supplies its own capabilities v2 document
/// rather than the host deriving one from generic field reflection.
pub trait CapabilitiesV2Provider: Send + Sync {
    fn capabilities_v2(&self) -> serde_json::Value;
}

/// Optional capability: the plugin exposes its merged Source Collection to
/// the management surface (spec.md §4.9 `GET {basePath}/management/sources`).
/// JSON-shaped rather than this crate's own type so `catalog-core` never
/// depends on `catalog-validate`; implementers are expected to redact
/// sensitive property values before returning them (spec.md §2 "Secret
/// Redactor").
#[async_trait]
pub trait SourceInspector: Send + Sync {
    async fn list_sources(&self) -> Result<Vec<serde_json::Value>>;

    async fn get_source(&self, source_id: &str) -> Result<Option<serde_json::Value>>;

    /// Re-reads every persisted source config from the Source Config Store
    /// and merges it into the in-memory Source Collection (spec.md §4.2
    /// "Reconciliation"). Called after every successful Apply/Rollback.
    async fn sync_sources(&self) -> Result<()>;

    /// Cascade-deletes this source's entities, then removes it from the
    /// in-memory Source Collection (spec.md §3.1 "destroyed by DeleteSource
    /// which must cascade to owned entities").
    async fn remove_source(&self, source_id: &str) -> Result<()>;
}
