//! Source configuration data model (spec.md §3.1). `PropertyValue` is the
//! dynamic property-bag encoding described in §9: a tagged sum rather than a
//! generic `serde_json::Value`, so `SecretRef` stays a distinct, structured
//! variant redaction can key off without string-sniffing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A reference to an externally stored secret, never the secret value itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub name: String,
    pub namespace: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Number(f64),
    Bool(bool),
    Map(BTreeMap<String, PropertyValue>),
    Secret(SecretRef),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_secret_ref(&self) -> bool {
        matches!(self, PropertyValue::Secret(_))
    }
}

/// Known sensitive key substrings (spec.md §4.3 layer 4), matched
/// case-insensitively against a property name.
pub const SENSITIVE_KEY_PATTERNS: &[&str] =
    &["password", "token", "secret", "apikey", "credential"];

pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEY_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Operator-authored configuration of an ingestion source (spec.md §3.1).
///
/// `deny_unknown_fields` is what makes this the "strict top-level fields"
/// layer of the validator (§4.3 layer 2) rather than a separate parallel
/// struct: decoding directly into this type both shapes the data and
/// enforces strictness in one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    pub origin: SourceOrigin,
    #[serde(default)]
    pub revision: Option<String>,
}

fn default_enabled() -> Option<bool> {
    Some(true)
}

impl SourceConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Converts the property bag to plain JSON for consumption by a
    /// plugin's `SourceManager::validate_source`, which lives in
    /// `catalog-core` and can't depend on this crate's `PropertyValue` type.
    pub fn properties_as_json(&self) -> BTreeMap<String, serde_json::Value> {
        self.properties
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap_or(serde_json::Value::Null)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOrigin {
    File,
    Api,
    Framework,
}
