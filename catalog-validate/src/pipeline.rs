//! Pipeline orchestrator: runs the ordered layer list, stopping early on a
//! fatal layer result (spec.md §4.3: "a layer may be skipped only if a
//! prior layer produced a fatal error").

use catalog_core::SourceManager;

use crate::layers::{
    ParseLayer, PluginSpecificLayer, SecurityWarningsLayer, SemanticLayer, StrictFieldsLayer,
    ValidationLayer, ValidationState,
};
use crate::result::{LayerResult, ValidationResult};

pub struct Validator<'a> {
    layers: Vec<Box<dyn ValidationLayer + 'a>>,
    provider_types: Vec<String>,
}

impl<'a> Validator<'a> {
    /// Builds the fixed five-layer pipeline for one plugin. `provider_types`
    /// comes from the plugin's `SourceManager::provider_types()`;
    /// `source_manager` is `None` for plugins that don't implement the
    /// capability (layer 5 then always passes).
    pub fn new(provider_types: Vec<String>, source_manager: Option<&'a dyn SourceManager>) -> Self {
        Self {
            layers: vec![
                Box::new(ParseLayer),
                Box::new(StrictFieldsLayer),
                Box::new(SemanticLayer),
                Box::new(SecurityWarningsLayer),
                Box::new(PluginSpecificLayer { source_manager }),
            ],
            provider_types,
        }
    }

    pub async fn validate(&self, raw: Vec<u8>) -> ValidationResult {
        let mut state = ValidationState::new(raw, self.provider_types.clone());
        let mut layer_results: Vec<LayerResult> = Vec::with_capacity(self.layers.len());

        for layer in &self.layers {
            let result = layer.run(&mut state).await;
            let fatal = result.fatal;
            layer_results.push(result);
            if fatal {
                break;
            }
        }

        ValidationResult::from_layers(layer_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_top_level_key_is_rejected() {
        let validator = Validator::new(vec!["yaml".to_string()], None);
        let payload = b"id: x\nname: x\ntype: yaml\norigin: api\nunknownField: true\n".to_vec();

        let result = validator.validate(payload).await;

        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.layer == "strict_fields"));
    }

    #[tokio::test]
    async fn sensitive_plain_string_is_a_warning_not_an_error() {
        let validator = Validator::new(vec!["yaml".to_string()], None);
        let payload = br#"
id: x
name: x
type: yaml
origin: api
properties:
  apiToken: "plain-value"
"#
        .to_vec();

        let result = validator.validate(payload).await;

        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].layer, "security");
    }

    #[tokio::test]
    async fn unregistered_type_is_rejected() {
        let validator = Validator::new(vec!["yaml".to_string()], None);
        let payload = b"id: x\nname: x\ntype: git\norigin: api\n".to_vec();

        let result = validator.validate(payload).await;

        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.field == "type"));
    }

    #[tokio::test]
    async fn malformed_yaml_is_fatal_at_parse_layer() {
        let validator = Validator::new(vec!["yaml".to_string()], None);
        let payload = b"id: [unterminated".to_vec();

        let result = validator.validate(payload).await;

        assert!(!result.valid);
        assert_eq!(result.layer_results.len(), 1);
        assert_eq!(result.layer_results[0].layer, "parse");
    }
}
