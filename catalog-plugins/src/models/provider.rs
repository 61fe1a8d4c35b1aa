//! YAML-file provider for the `models` plugin (spec.md §4.4 "a Provider
//! exposes Load(ctx)"). Grounded in the file-watch pattern `catalog_store`
//! already uses for source configs — a models provider reads its own
//! `path` property and re-parses the whole file on every `load()`.

use catalog_core::{CatalogError, Result};
use catalog_loader::{EntityDraft, Provider};
use catalog_validate::SourceConfig;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
struct ModelFile {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
    #[serde(flatten)]
    properties: serde_json::Map<String, serde_json::Value>,
}

/// Reads a flat YAML file of model entries from the `path` property of the
/// owning source config. Property absence is validated before a source is
/// ever persisted (layer 5, see [`validate_properties`]); if it somehow
/// reaches here anyway, `load()` fails that source alone rather than the
/// factory panicking and taking the whole reload down with it.
pub struct YamlFileProvider {
    path: Option<String>,
}

impl YamlFileProvider {
    pub fn new(config: &SourceConfig) -> Self {
        let path = config.properties.get("path").and_then(|v| v.as_str()).map(str::to_string);
        Self { path }
    }
}

#[async_trait::async_trait]
impl Provider for YamlFileProvider {
    async fn load(&self) -> Result<Vec<EntityDraft>> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| CatalogError::Validation("models source requires a string `path` property".to_string()))?;

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("reading {path}: {e}")))?;

        let file: ModelFile = serde_yaml::from_str(&contents)
            .map_err(|e| CatalogError::Internal(anyhow::anyhow!("parsing {path}: {e}")))?;

        Ok(file
            .models
            .into_iter()
            .map(|entry| EntityDraft {
                name: entry.name,
                custom_properties: serde_json::Value::Object(entry.properties),
            })
            .collect())
    }

    /// No push-based watch for the plain file provider; the host's own
    /// `catalog_store` file watcher drives hot reload for file-origin
    /// source configs, which in turn triggers this provider's `load()`
    /// again through the normal reload pipeline.
    async fn watch(&self, _tx: mpsc::Sender<()>, _cancel: CancellationToken) -> Result<()> {
        Ok(())
    }
}

/// Strict schema for a `content` property holding an embedded mini-catalog
/// document (spec.md §4.3 layer 5: "the plugin defines a strict schema and
/// applies strict decoding; unknown fields here are errors"). Field names
/// mirror the real `mcpservers` catalog format this provider's YAML files
/// use, trimmed to what the embedded form needs.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmbeddedCatalogDocument {
    #[serde(default)]
    mcpservers: Vec<EmbeddedMcpServer>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmbeddedMcpServer {
    name: String,
    #[serde(rename = "serverUrl")]
    server_url: String,
}

/// Validates the `models` plugin's own view of a candidate source's
/// properties (spec.md §4.3 layer 5). A source either points at a file via
/// `path`, or embeds the catalog document directly in `content`, in which
/// case it's decoded against [`EmbeddedCatalogDocument`] with unknown fields
/// rejected rather than silently dropped.
pub fn validate_properties(properties: &std::collections::BTreeMap<String, serde_json::Value>) -> Result<()> {
    if let Some(content) = properties.get("content").and_then(|v| v.as_str()) {
        serde_yaml::from_str::<EmbeddedCatalogDocument>(content)
            .map_err(|e| CatalogError::Validation(format!("embedded `content` failed strict schema validation: {e}")))?;
        return Ok(());
    }

    match properties.get("path").and_then(|v| v.as_str()) {
        Some(path) if !path.trim().is_empty() => Ok(()),
        _ => Err(CatalogError::Validation(
            "models source requires a non-empty string `path` property or an embedded `content` property".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn source_config(path: &str) -> SourceConfig {
        let mut properties = std::collections::BTreeMap::new();
        properties.insert(
            "path".to_string(),
            catalog_validate::PropertyValue::String(path.to_string()),
        );
        SourceConfig {
            id: "s1".to_string(),
            name: "s1".to_string(),
            source_type: "yaml".to_string(),
            enabled: Some(true),
            labels: vec![],
            properties,
            origin: catalog_validate::SourceOrigin::File,
            revision: None,
        }
    }

    #[tokio::test]
    async fn loads_entries_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "models:\n  - name: gpt-widget\n    framework: pytorch\n  - name: vision-net\n    framework: onnx\n"
        )
        .unwrap();

        let config = source_config(file.path().to_str().unwrap());
        let provider = YamlFileProvider::new(&config);
        let drafts = provider.load().await.unwrap();

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].name, "gpt-widget");
        assert_eq!(drafts[0].custom_properties["framework"], "pytorch");
    }

    #[test]
    fn missing_path_property_is_rejected() {
        let properties = std::collections::BTreeMap::new();
        assert!(validate_properties(&properties).is_err());
    }

    #[test]
    fn embedded_content_with_unknown_field_is_rejected() {
        let mut properties = std::collections::BTreeMap::new();
        properties.insert(
            "content".to_string(),
            serde_json::Value::String(
                "mcpservers:\n- name: s\n  serverUrl: http://x\n  unknownField: true\n".to_string(),
            ),
        );

        let err = validate_properties(&properties).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn embedded_content_without_unknown_fields_is_accepted() {
        let mut properties = std::collections::BTreeMap::new();
        properties.insert(
            "content".to_string(),
            serde_json::Value::String("mcpservers:\n- name: s\n  serverUrl: http://x\n".to_string()),
        );

        assert!(validate_properties(&properties).is_ok());
    }
}
