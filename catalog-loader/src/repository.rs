//! Contract for the plugin-owned entity repository. spec.md §1 explicitly
//! puts "database schema migrations and the generic per-entity repository
//! (commodity CRUD over property rows)" out of scope for the core — each
//! plugin owns its entity table and mapping. The Loader only needs this
//! narrow interface to compute and apply the upsert/delete diff described
//! in §4.5.
use async_trait::async_trait;
use catalog_core::Result;

use crate::provider::EntityDraft;

#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertStats {
    pub upserted: i64,
}

#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Upserts by `(sourceId, name)` (spec.md §4.5 step 4).
    async fn upsert_many(&self, source_id: &str, drafts: &[EntityDraft]) -> Result<UpsertStats>;

    /// Deletes rows for `source_id` whose `name` is not in `keep_names`;
    /// returns the number removed.
    async fn delete_missing(&self, source_id: &str, keep_names: &[String]) -> Result<i64>;

    /// Cascade delete for `DeleteSource` (spec.md §3.1 "Source Config"
    /// lifecycle).
    async fn delete_by_source(&self, source_id: &str) -> Result<i64>;

    async fn count_by_source(&self, source_id: &str) -> Result<i64>;
}
