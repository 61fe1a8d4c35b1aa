//! In-memory merged view of one plugin's sources (spec.md §3.2, §4.4). The
//! Loader that owns a `SourceCollection` is its single mutable-state writer;
//! handlers only ever read snapshots.

use std::collections::BTreeMap;

use catalog_validate::{SourceConfig, SourceOrigin};
use dashmap::DashMap;

#[derive(Default)]
pub struct SourceCollection {
    sources: DashMap<String, SourceConfig>,
}

impl SourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts `incoming` keyed by source id. A source already present keeps
    /// its existing `origin` rather than taking `origin` from this call, so
    /// path resolution against the original backend survives later Apply
    /// cycles from a different entry point (spec.md §4.2 "Reconciliation").
    pub fn merge(&self, origin: SourceOrigin, incoming: BTreeMap<String, SourceConfig>) {
        for (id, mut config) in incoming {
            config.origin = self.sources.get(&id).map(|e| e.origin).unwrap_or(origin);
            self.sources.insert(id, config);
        }
    }

    pub fn upsert_one(&self, config: SourceConfig) {
        self.sources.insert(config.id.clone(), config);
    }

    pub fn remove(&self, id: &str) -> Option<SourceConfig> {
        self.sources.remove(id).map(|(_, v)| v)
    }

    pub fn get(&self, id: &str) -> Option<SourceConfig> {
        self.sources.get(id).map(|e| e.clone())
    }

    /// A point-in-time snapshot; callers must not expect it to track
    /// further mutations (spec.md §4.4: "callers must not retain references
    /// past the call").
    pub fn all_sources(&self) -> Vec<SourceConfig> {
        self.sources.iter().map(|e| e.value().clone()).collect()
    }

    pub fn enabled_sources(&self) -> Vec<SourceConfig> {
        self.sources.iter().filter(|e| e.is_enabled()).map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: &str, origin: SourceOrigin) -> SourceConfig {
        SourceConfig {
            id: id.to_string(),
            name: id.to_string(),
            source_type: "yaml".to_string(),
            enabled: Some(true),
            labels: vec![],
            properties: Default::default(),
            origin,
            revision: None,
        }
    }

    #[test]
    fn merge_preserves_existing_origin() {
        let collection = SourceCollection::new();
        collection.upsert_one(config("s1", SourceOrigin::File));

        let mut incoming = BTreeMap::new();
        incoming.insert("s1".to_string(), config("s1", SourceOrigin::Api));
        collection.merge(SourceOrigin::Api, incoming);

        assert_eq!(collection.get("s1").unwrap().origin, SourceOrigin::File);
    }

    #[test]
    fn merge_assigns_origin_for_new_entries() {
        let collection = SourceCollection::new();
        let mut incoming = BTreeMap::new();
        incoming.insert("s1".to_string(), config("s1", SourceOrigin::Api));
        collection.merge(SourceOrigin::Api, incoming);

        assert_eq!(collection.get("s1").unwrap().origin, SourceOrigin::Api);
    }
}
