//! Structured validator output (spec.md §3.1 "Validation Result").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub layer: &'static str,
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn error(layer: &'static str, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            layer,
            field: field.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(layer: &'static str, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            layer,
            field: field.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

/// Outcome of a single layer in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerResult {
    pub layer: &'static str,
    pub diagnostics: Vec<Diagnostic>,
    /// Layers 2 ("strict top-level fields") and 1 ("parse") set this to stop
    /// the pipeline early — a malformed payload can't meaningfully be
    /// checked by later layers.
    pub fatal: bool,
}

impl LayerResult {
    pub fn ok(layer: &'static str) -> Self {
        Self {
            layer,
            diagnostics: Vec::new(),
            fatal: false,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

/// Full pipeline output (spec.md §3.1, §4.3: "valid = true iff no
/// non-warning layer produced errors").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub layer_results: Vec<LayerResult>,
}

impl ValidationResult {
    pub fn from_layers(layer_results: Vec<LayerResult>) -> Self {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for layer in &layer_results {
            for diagnostic in &layer.diagnostics {
                match diagnostic.severity {
                    Severity::Error => errors.push(diagnostic.clone()),
                    Severity::Warning => warnings.push(diagnostic.clone()),
                }
            }
        }

        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
            layer_results,
        }
    }
}
