//! Cluster-API-backed `SourceConfigStore` (spec.md §4.2 "Cluster-API
//! backend"): one aggregated config object per plugin, optimistic
//! concurrency via `expectedRevision`, and annotation-keyed revision
//! snapshots capped at 10. Grounded in `aerolithdb-plugins`'s own use of
//! `reqwest` for out-of-process integrations.
//!
//! The exact cluster API surface (authentication, resource shape) is an
//! external collaborator this crate does not design — see spec.md §1's
//! "deliberately out of scope" list for the analogous case of token
//! verification. This backend speaks a plain JSON document protocol against
//! a configurable base URL; adapting it to a specific platform's actual API
//! object format is an integration concern, not a core one.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use catalog_core::{CatalogError, Result};

use crate::model::Revision;
use crate::store::SourceConfigStore;

const MAX_AGGREGATE_BYTES: usize = 900 * 1024;
const MAX_RETAINED_SNAPSHOTS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct AggregatedConfig {
    /// sourceId -> raw payload, base64-free since transport is JSON-native text.
    sources: BTreeMap<String, String>,
    /// Monotonic resource version, compared against `expectedRevision`.
    revision: u64,
    /// `rev-<timestamp>` -> snapshot of the full `sources` map at that revision.
    history: BTreeMap<String, BTreeMap<String, String>>,
}

impl AggregatedConfig {
    fn size_bytes(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(usize::MAX)
    }
}

pub struct ClusterApiConfigStore {
    client: reqwest::Client,
    base_url: String,
}

impl ClusterApiConfigStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn object_url(&self, plugin: &str) -> String {
        format!("{}/plugins/{plugin}/sources", self.base_url)
    }

    async fn fetch(&self, plugin: &str) -> Result<AggregatedConfig> {
        let response = self
            .client
            .get(self.object_url(plugin))
            .send()
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("cluster API request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(AggregatedConfig::default());
        }
        response
            .error_for_status_ref()
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("cluster API error: {e}")))?;

        response
            .json()
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("decoding aggregated config: {e}")))
    }

    async fn put(&self, plugin: &str, config: &AggregatedConfig) -> Result<()> {
        if config.size_bytes() > MAX_AGGREGATE_BYTES {
            return Err(CatalogError::Validation(format!(
                "aggregated config for plugin {plugin} exceeds the {MAX_AGGREGATE_BYTES}-byte platform limit"
            )));
        }

        let response = self
            .client
            .put(self.object_url(plugin))
            .json(config)
            .send()
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("cluster API request failed: {e}")))?;

        response
            .error_for_status()
            .map(|_| ())
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("cluster API error: {e}")))
    }
}

#[async_trait]
impl SourceConfigStore for ClusterApiConfigStore {
    async fn get(&self, plugin: &str, source_id: &str) -> Result<(Vec<u8>, String)> {
        let config = self.fetch(plugin).await?;
        let payload = config
            .sources
            .get(source_id)
            .ok_or_else(|| CatalogError::NotFound(format!("source {source_id} not found for plugin {plugin}")))?;
        Ok((payload.clone().into_bytes(), config.revision.to_string()))
    }

    async fn apply(
        &self,
        plugin: &str,
        source_id: &str,
        payload: Vec<u8>,
        expected_revision: Option<&str>,
    ) -> Result<String> {
        let mut config = self.fetch(plugin).await?;

        if let Some(expected) = expected_revision {
            if expected != config.revision.to_string() {
                return Err(CatalogError::Conflict {
                    expected: expected.to_string(),
                    found: config.revision.to_string(),
                });
            }
        }

        let text = String::from_utf8(payload)
            .map_err(|e| CatalogError::Validation(format!("payload must be UTF-8 text: {e}")))?;
        config.sources.insert(source_id.to_string(), text);
        config.revision += 1;

        let snapshot_key = format!("rev-{}", Utc::now().timestamp_millis());
        config.history.insert(snapshot_key, config.sources.clone());
        while config.history.len() > MAX_RETAINED_SNAPSHOTS {
            if let Some(oldest) = config.history.keys().next().cloned() {
                config.history.remove(&oldest);
            }
        }

        self.put(plugin, &config).await?;
        Ok(config.revision.to_string())
    }

    async fn list_revisions(&self, plugin: &str, source_id: &str) -> Result<Vec<Revision>> {
        let config = self.fetch(plugin).await?;
        let mut revisions: Vec<Revision> = config
            .history
            .iter()
            .filter_map(|(key, snapshot)| {
                let payload = snapshot.get(source_id)?.clone().into_bytes();
                let timestamp_ms: i64 = key.strip_prefix("rev-")?.parse().ok()?;
                Some(Revision {
                    version: key.clone(),
                    timestamp: chrono::DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_else(Utc::now),
                    size: payload.len(),
                    payload,
                })
            })
            .collect();
        revisions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(revisions)
    }

    async fn rollback(&self, plugin: &str, source_id: &str, revision: &str) -> Result<String> {
        let revisions = self.list_revisions(plugin, source_id).await?;
        let target = revisions
            .into_iter()
            .find(|r| r.version == revision)
            .ok_or_else(|| CatalogError::NotFound(format!("revision {revision} not found for source {source_id}")))?;

        self.apply(plugin, source_id, target.payload, None).await
    }

    async fn list_sources(&self, plugin: &str) -> Result<Vec<String>> {
        let config = self.fetch(plugin).await?;
        Ok(config.sources.keys().cloned().collect())
    }

    async fn delete(&self, plugin: &str, source_id: &str) -> Result<()> {
        let mut config = self.fetch(plugin).await?;
        if config.sources.remove(source_id).is_none() {
            return Err(CatalogError::NotFound(format!("source {source_id} not found for plugin {plugin}")));
        }
        config.revision += 1;
        self.put(plugin, &config).await
    }
}
