//! The `SourceConfigStore` interface shared by both backends (spec.md §4.2).

use async_trait::async_trait;
use catalog_core::Result;

use crate::model::Revision;

#[async_trait]
pub trait SourceConfigStore: Send + Sync {
    /// Returns the current raw payload and its revision for one source.
    async fn get(&self, plugin: &str, source_id: &str) -> Result<(Vec<u8>, String)>;

    /// Persists `payload` as the new current config for `source_id`. When
    /// `expected_revision` is set, the write is rejected with
    /// `CatalogError::Conflict` unless it still matches the stored revision
    /// (optimistic concurrency).
    async fn apply(
        &self,
        plugin: &str,
        source_id: &str,
        payload: Vec<u8>,
        expected_revision: Option<&str>,
    ) -> Result<String>;

    async fn list_revisions(&self, plugin: &str, source_id: &str) -> Result<Vec<Revision>>;

    /// Equivalent to `apply(plugin, source_id, payload_of(revision), None)`.
    async fn rollback(&self, plugin: &str, source_id: &str, revision: &str) -> Result<String>;

    async fn list_sources(&self, plugin: &str) -> Result<Vec<String>>;

    async fn delete(&self, plugin: &str, source_id: &str) -> Result<()>;
}
