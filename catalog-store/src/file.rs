//! File-backed `SourceConfigStore` (spec.md §4.2 "File backend"). Grounded
//! in `riptide-persistence`'s use of the `notify` crate for hot reload, and
//! in the teacher's atomic-write discipline elsewhere in the workspace
//! (write `.tmp`, fsync, rename).
//!
//! Layout per source: `<root>/<plugin>/<sourceId>/current.yaml`,
//! `<root>/<plugin>/<sourceId>/.revision`, and
//! `<root>/<plugin>/<sourceId>/.history/rev-<n>.yaml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use catalog_core::{CatalogError, Result};

use crate::model::Revision;
use crate::store::SourceConfigStore;

pub struct FileConfigStore {
    root: PathBuf,
    min_retained_revisions: usize,
    max_payload_bytes: usize,
    /// Per-`(plugin, sourceId)` locks serializing concurrent `Apply` calls.
    /// Process-local only — a single file-backend process is assumed, same
    /// as the teacher's own single-node file paths.
    locks: parking_lot::Mutex<BTreeMap<String, Arc<AsyncMutex<()>>>>,
}

impl FileConfigStore {
    pub fn new(root: impl Into<PathBuf>, min_retained_revisions: usize, max_payload_bytes: usize) -> Self {
        Self {
            root: root.into(),
            min_retained_revisions,
            max_payload_bytes,
            locks: parking_lot::Mutex::new(BTreeMap::new()),
        }
    }

    fn source_dir(&self, plugin: &str, source_id: &str) -> PathBuf {
        self.root.join(plugin).join(source_id)
    }

    fn lock_for(&self, plugin: &str, source_id: &str) -> Arc<AsyncMutex<()>> {
        let key = format!("{plugin}/{source_id}");
        let mut locks = self.locks.lock();
        locks.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    async fn read_revision_counter(&self, dir: &Path) -> u64 {
        match fs::read_to_string(dir.join(".revision")).await {
            Ok(s) => s.trim().parse().unwrap_or(0),
            Err(_) => 0,
        }
    }

    async fn atomic_write(&self, path: &Path, payload: &[u8]) -> Result<()> {
        let tmp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("creating {}: {e}", tmp_path.display())))?;
        tokio::io::AsyncWriteExt::write_all(&mut file, payload)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!(e)))?;
        file.sync_all()
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!(e)))?;
        fs::rename(&tmp_path, path)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn prune_history(&self, history_dir: &Path) -> Result<()> {
        let mut entries = fs::read_dir(history_dir)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!(e)))?;
        let mut revs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!(e)))?
        {
            if let Some(n) = parse_rev_filename(&entry.file_name().to_string_lossy()) {
                revs.push((n, entry.path()));
            }
        }
        revs.sort_by_key(|(n, _)| *n);

        if revs.len() > self.min_retained_revisions {
            let excess = revs.len() - self.min_retained_revisions;
            for (_, path) in revs.into_iter().take(excess) {
                if let Err(e) = fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "failed to prune old revision snapshot");
                }
            }
        }
        Ok(())
    }
}

fn parse_rev_filename(name: &str) -> Option<u64> {
    name.strip_prefix("rev-")?.strip_suffix(".yaml")?.parse().ok()
}

fn short_hash(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    hex::encode(&digest[..4])
}

#[async_trait]
impl SourceConfigStore for FileConfigStore {
    async fn get(&self, plugin: &str, source_id: &str) -> Result<(Vec<u8>, String)> {
        let dir = self.source_dir(plugin, source_id);
        let payload = fs::read(dir.join("current.yaml"))
            .await
            .map_err(|_| CatalogError::NotFound(format!("source {source_id} not found for plugin {plugin}")))?;
        let revision = self.read_revision_counter(&dir).await;
        Ok((payload, revision.to_string()))
    }

    async fn apply(
        &self,
        plugin: &str,
        source_id: &str,
        payload: Vec<u8>,
        expected_revision: Option<&str>,
    ) -> Result<String> {
        if payload.len() > self.max_payload_bytes {
            return Err(CatalogError::Validation(format!(
                "payload of {} bytes exceeds the {}-byte limit",
                payload.len(),
                self.max_payload_bytes
            )));
        }

        let lock = self.lock_for(plugin, source_id);
        let _guard = lock.lock().await;

        let dir = self.source_dir(plugin, source_id);
        let history_dir = dir.join(".history");
        fs::create_dir_all(&history_dir)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!(e)))?;

        let current_revision = self.read_revision_counter(&dir).await;
        if let Some(expected) = expected_revision {
            if expected != current_revision.to_string() {
                return Err(CatalogError::Conflict {
                    expected: expected.to_string(),
                    found: current_revision.to_string(),
                });
            }
        }

        let new_revision = current_revision + 1;
        let hash = short_hash(&payload);
        debug!(plugin, source_id, new_revision, hash, "applying source config");

        self.atomic_write(&dir.join("current.yaml"), &payload).await?;
        self.atomic_write(&history_dir.join(format!("rev-{new_revision:010}.yaml")), &payload)
            .await?;
        self.atomic_write(&dir.join(".revision"), new_revision.to_string().as_bytes())
            .await?;
        self.prune_history(&history_dir).await?;

        Ok(new_revision.to_string())
    }

    async fn list_revisions(&self, plugin: &str, source_id: &str) -> Result<Vec<Revision>> {
        let dir = self.source_dir(plugin, source_id);
        let history_dir = dir.join(".history");
        let mut entries = match fs::read_dir(&history_dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(Vec::new()),
        };

        let mut revisions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!(e)))?
        {
            let Some(n) = parse_rev_filename(&entry.file_name().to_string_lossy()) else {
                continue;
            };
            let payload = fs::read(entry.path())
                .await
                .map_err(|e| CatalogError::Internal(anyhow::anyhow!(e)))?;
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| CatalogError::Internal(anyhow::anyhow!(e)))?;
            let timestamp = metadata
                .modified()
                .map(chrono::DateTime::<chrono::Utc>::from)
                .unwrap_or_else(|_| chrono::Utc::now());

            revisions.push(Revision {
                version: n.to_string(),
                timestamp,
                size: payload.len(),
                payload,
            });
        }

        revisions.sort_by(|a, b| b.version.parse::<u64>().unwrap_or(0).cmp(&a.version.parse::<u64>().unwrap_or(0)));
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
        let plugin_dir = self.root.join(plugin);
        let mut entries = match fs::read_dir(&plugin_dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(Vec::new()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!(e)))?
        {
            if entry
                .file_type()
                .await
                .map_err(|e| CatalogError::Internal(anyhow::anyhow!(e)))?
                .is_dir()
            {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(ids)
    }

    async fn delete(&self, plugin: &str, source_id: &str) -> Result<()> {
        let dir = self.source_dir(plugin, source_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CatalogError::NotFound(format!("source {source_id} not found for plugin {plugin}")))
            }
            Err(e) => Err(CatalogError::Internal(anyhow::anyhow!(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn apply_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path(), 10, 1024 * 1024);

        let rev = store.apply("models", "s1", b"name: one".to_vec(), None).await.unwrap();
        assert_eq!(rev, "1");

        let (payload, got_rev) = store.get("models", "s1").await.unwrap();
        assert_eq!(payload, b"name: one");
        assert_eq!(got_rev, "1");
    }

    #[tokio::test]
    async fn sequential_applies_increase_revision_by_two() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path(), 10, 1024 * 1024);

        store.apply("models", "s1", b"v1".to_vec(), None).await.unwrap();
        let rev2 = store.apply("models", "s1", b"v2".to_vec(), None).await.unwrap();
        assert_eq!(rev2, "2");

        let revisions = store.list_revisions("models", "s1").await.unwrap();
        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[0].version, "2");
        assert_eq!(revisions[1].version, "1");
    }

    #[tokio::test]
    async fn conflicting_expected_revision_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path(), 10, 1024 * 1024);

        store.apply("models", "s1", b"v1".to_vec(), None).await.unwrap();
        let err = store
            .apply("models", "s1", b"v2".to_vec(), Some("999"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "conflict");
    }

    #[tokio::test]
    async fn rollback_reapplies_old_payload_as_new_revision() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path(), 10, 1024 * 1024);

        store.apply("models", "s1", b"v1".to_vec(), None).await.unwrap();
        store.apply("models", "s1", b"v2".to_vec(), None).await.unwrap();

        let rev3 = store.rollback("models", "s1", "1").await.unwrap();
        assert_eq!(rev3, "3");

        let (payload, _) = store.get("models", "s1").await.unwrap();
        assert_eq!(payload, b"v1");
    }

    #[tokio::test]
    async fn delete_removes_source_from_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path(), 10, 1024 * 1024);

        store.apply("models", "s1", b"v1".to_vec(), None).await.unwrap();
        store.apply("models", "s2", b"v1".to_vec(), None).await.unwrap();
        store.delete("models", "s1").await.unwrap();

        let sources = store.list_sources("models").await.unwrap();
        assert_eq!(sources, vec!["s2".to_string()]);
    }
}
