//! The five validation layers (spec.md §4.3), each a `ValidationLayer`
//! pushed into the pipeline's ordered `Vec<Box<dyn ValidationLayer>>`.

use async_trait::async_trait;

use catalog_core::SourceManager;

use crate::model::{is_sensitive_key, PropertyValue, SourceConfig};
use crate::result::{Diagnostic, LayerResult};

/// Shared, mutable state layers thread along the pipeline: the raw payload
/// every layer can re-inspect, and the progressively more structured view
/// later layers build on.
pub struct ValidationState {
    pub raw: Vec<u8>,
    pub parsed: Option<SourceConfig>,
    pub provider_types: Vec<String>,
}

impl ValidationState {
    pub fn new(raw: Vec<u8>, provider_types: Vec<String>) -> Self {
        Self {
            raw,
            parsed: None,
            provider_types,
        }
    }
}

#[async_trait]
pub trait ValidationLayer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, state: &mut ValidationState) -> LayerResult;
}

/// Layer 1: the payload must be well-formed YAML at all.
pub struct ParseLayer;

#[async_trait]
impl ValidationLayer for ParseLayer {
    fn name(&self) -> &'static str {
        "parse"
    }

    async fn run(&self, state: &mut ValidationState) -> LayerResult {
        match serde_yaml::from_slice::<serde_yaml::Value>(&state.raw) {
            Ok(_) => LayerResult::ok(self.name()),
            Err(e) => LayerResult {
                layer: self.name(),
                diagnostics: vec![Diagnostic::error(self.name(), "$", e.to_string())],
                fatal: true,
            },
        }
    }
}

/// Layer 2: decode into the strict `SourceConfig` shape (unknown fields are
/// errors via `#[serde(deny_unknown_fields)]`), then enforce the
/// non-empty-field and registered-type invariants of spec.md §3.1.
pub struct StrictFieldsLayer;

#[async_trait]
impl ValidationLayer for StrictFieldsLayer {
    fn name(&self) -> &'static str {
        "strict_fields"
    }

    async fn run(&self, state: &mut ValidationState) -> LayerResult {
        let parsed: SourceConfig = match serde_yaml::from_slice(&state.raw) {
            Ok(config) => config,
            Err(e) => {
                return LayerResult {
                    layer: self.name(),
                    diagnostics: vec![Diagnostic::error(self.name(), "$", e.to_string())],
                    fatal: true,
                }
            }
        };

        let mut diagnostics = Vec::new();
        if parsed.id.trim().is_empty() {
            diagnostics.push(Diagnostic::error(self.name(), "id", "id must not be empty"));
        }
        if parsed.name.trim().is_empty() {
            diagnostics.push(Diagnostic::error(self.name(), "name", "name must not be empty"));
        }
        if parsed.source_type.trim().is_empty() {
            diagnostics.push(Diagnostic::error(self.name(), "type", "type must not be empty"));
        } else if !state.provider_types.iter().any(|t| t == &parsed.source_type) {
            diagnostics.push(Diagnostic::error(
                self.name(),
                "type",
                format!("type {:?} is not registered for this plugin", parsed.source_type),
            ));
        }

        let fatal = !diagnostics.is_empty();
        state.parsed = Some(parsed);

        LayerResult {
            layer: self.name(),
            diagnostics,
            fatal,
        }
    }
}

/// Layer 3: field-level semantic checks beyond strict decoding (spec.md
/// §4.3: "required fields per field spec, enum membership, numeric
/// ranges"). The core-level checks here are plugin-agnostic; a plugin's own
/// semantic rules run later in the plugin-specific layer.
pub struct SemanticLayer;

#[async_trait]
impl ValidationLayer for SemanticLayer {
    fn name(&self) -> &'static str {
        "semantic"
    }

    async fn run(&self, state: &mut ValidationState) -> LayerResult {
        let Some(parsed) = state.parsed.as_ref() else {
            return LayerResult::ok(self.name());
        };

        let mut diagnostics = Vec::new();
        for label in &parsed.labels {
            if label.trim().is_empty() {
                diagnostics.push(Diagnostic::error(self.name(), "labels", "labels must not contain empty strings"));
                break;
            }
        }

        LayerResult {
            layer: self.name(),
            diagnostics,
            fatal: false,
        }
    }
}

/// Layer 4: flags sensitive-looking properties stored as plain strings
/// instead of `SecretRef`. Always warnings, never errors (`WarningOnly`).
pub struct SecurityWarningsLayer;

#[async_trait]
impl ValidationLayer for SecurityWarningsLayer {
    fn name(&self) -> &'static str {
        "security"
    }

    async fn run(&self, state: &mut ValidationState) -> LayerResult {
        let Some(parsed) = state.parsed.as_ref() else {
            return LayerResult::ok(self.name());
        };

        let mut diagnostics = Vec::new();
        scan_properties(&parsed.properties, self.name(), &mut diagnostics);

        LayerResult {
            layer: self.name(),
            diagnostics,
            fatal: false,
        }
    }
}

fn scan_properties(
    properties: &std::collections::BTreeMap<String, PropertyValue>,
    layer: &'static str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (key, value) in properties {
        match value {
            PropertyValue::String(_) if is_sensitive_key(key) => {
                diagnostics.push(Diagnostic::warning(
                    layer,
                    key.clone(),
                    format!("property {key:?} looks sensitive; store it as a SecretRef instead of a plain string"),
                ));
            }
            PropertyValue::Map(nested) => scan_properties(nested, layer, diagnostics),
            _ => {}
        }
    }
}

/// Layer 5: delegates to the owning plugin's `SourceManager::validate_source`.
/// Errors from this layer are full validation errors (spec.md §4.3: "unknown
/// fields here are errors"). Borrowed rather than `Arc`-owned: a `Validator`
/// is always built fresh for the one request/reload it serves, so it never
/// needs to outlive the caller's reference to the owning plugin.
pub struct PluginSpecificLayer<'a> {
    pub source_manager: Option<&'a dyn SourceManager>,
}

#[async_trait]
impl<'a> ValidationLayer for PluginSpecificLayer<'a> {
    fn name(&self) -> &'static str {
        "plugin"
    }

    async fn run(&self, state: &mut ValidationState) -> LayerResult {
        let Some(parsed) = state.parsed.as_ref() else {
            return LayerResult::ok(self.name());
        };
        let Some(manager) = self.source_manager.as_ref() else {
            return LayerResult::ok(self.name());
        };

        match manager.validate_source(&parsed.properties_as_json()).await {
            Ok(()) => LayerResult::ok(self.name()),
            Err(e) => LayerResult {
                layer: self.name(),
                diagnostics: vec![Diagnostic::error(self.name(), "properties", e.to_string())],
                fatal: false,
            },
        }
    }
}
