//! Secret reference resolution and output redaction (spec.md §2 "Secret
//! Redactor / SecretRef"). Two directions: resolving a `SecretRef` to its
//! real value at ingestion time (the external secret store itself is a
//! contracted interface, not designed here — the same posture spec.md §1
//! takes for "authentication token verification"), and redacting sensitive
//! property values before they ever reach an API response.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use catalog_core::{CatalogError, Result};
use serde_json::Value;

use crate::model::{is_sensitive_key, PropertyValue, SecretRef};

/// Resolves a `SecretRef` to the real secret value. The concrete backend
/// (Vault, a cloud secret manager, a Kubernetes Secret) lives outside this
/// workspace; this crate only contracts the interface a provider calls at
/// ingestion time.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, secret_ref: &SecretRef) -> Result<String>;
}

/// Resolves secrets from process environment variables named
/// `{namespace}_{name}_{key}` (upper-cased, non-alphanumerics replaced with
/// `_`). The simplest possible concrete resolver absent any secret-manager
/// dependency in this workspace; operators wanting Vault/KMS-backed
/// secrets supply their own `SecretResolver`.
pub struct EnvSecretResolver;

#[async_trait]
impl SecretResolver for EnvSecretResolver {
    async fn resolve(&self, secret_ref: &SecretRef) -> Result<String> {
        let var_name = env_var_name(secret_ref);
        std::env::var(&var_name).map_err(|_| CatalogError::NotFound(format!("secret {var_name} not set in environment")))
    }
}

fn env_var_name(secret_ref: &SecretRef) -> String {
    let raw = format!("{}_{}_{}", secret_ref.namespace, secret_ref.name, secret_ref.key);
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Resolves every `SecretRef` in `properties` into its real value,
/// producing the plain JSON a provider actually reads (spec.md §4.4
/// "Providers are pure relative to the shared DB").
pub async fn resolve_properties(
    properties: &BTreeMap<String, PropertyValue>,
    resolver: &dyn SecretResolver,
) -> Result<BTreeMap<String, Value>> {
    let mut resolved = BTreeMap::new();
    for (key, value) in properties {
        resolved.insert(key.clone(), resolve_value(value, resolver).await?);
    }
    Ok(resolved)
}

fn resolve_value<'a>(
    value: &'a PropertyValue,
    resolver: &'a dyn SecretResolver,
) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>> {
    Box::pin(async move {
        match value {
            PropertyValue::String(s) => Ok(Value::String(s.clone())),
            PropertyValue::Number(n) => Ok(serde_json::json!(n)),
            PropertyValue::Bool(b) => Ok(Value::Bool(*b)),
            PropertyValue::Secret(secret_ref) => Ok(Value::String(resolver.resolve(secret_ref).await?)),
            PropertyValue::Map(map) => {
                let mut object = serde_json::Map::new();
                for (k, v) in map {
                    object.insert(k.clone(), resolve_value(v, resolver).await?);
                }
                Ok(Value::Object(object))
            }
        }
    })
}

/// Redacts property values before they reach an API response. A
/// `SecretRef` already carries no raw secret, but a sensitive key stored
/// as a plain string is masked too, as a second line of defense behind
/// the validator's security-warnings layer.
pub fn redact_properties(properties: &BTreeMap<String, PropertyValue>) -> BTreeMap<String, Value> {
    properties.iter().map(|(key, value)| (key.clone(), redact_value(key, value))).collect()
}

fn redact_value(key: &str, value: &PropertyValue) -> Value {
    match value {
        PropertyValue::String(s) => {
            if is_sensitive_key(key) {
                Value::String("<redacted>".to_string())
            } else {
                Value::String(s.clone())
            }
        }
        PropertyValue::Number(n) => serde_json::json!(n),
        PropertyValue::Bool(b) => Value::Bool(*b),
        PropertyValue::Secret(secret_ref) => serde_json::json!({
            "$secretRef": {
                "name": secret_ref.name,
                "namespace": secret_ref.namespace,
                "key": secret_ref.key,
            }
        }),
        PropertyValue::Map(map) => {
            let object: serde_json::Map<String, Value> = map.iter().map(|(k, v)| (k.clone(), redact_value(k, v))).collect();
            Value::Object(object)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_ref() -> SecretRef {
        SecretRef {
            name: "db".to_string(),
            namespace: "default".to_string(),
            key: "password".to_string(),
        }
    }

    struct FixedResolver(String);

    #[async_trait]
    impl SecretResolver for FixedResolver {
        async fn resolve(&self, _secret_ref: &SecretRef) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn resolves_secret_ref_to_real_value() {
        let mut properties = BTreeMap::new();
        properties.insert("password".to_string(), PropertyValue::Secret(secret_ref()));

        let resolved = resolve_properties(&properties, &FixedResolver("hunter2".to_string())).await.unwrap();
        assert_eq!(resolved["password"], Value::String("hunter2".to_string()));
    }

    #[tokio::test]
    async fn env_resolver_maps_ref_to_upper_snake_case_var() {
        let secret_ref = secret_ref();
        std::env::set_var(env_var_name(&secret_ref), "s3cr3t");
        let resolved = EnvSecretResolver.resolve(&secret_ref).await.unwrap();
        assert_eq!(resolved, "s3cr3t");
        std::env::remove_var(env_var_name(&secret_ref));
    }

    #[test]
    fn redacts_sensitive_plain_string_but_not_ordinary_field() {
        let mut properties = BTreeMap::new();
        properties.insert("apiToken".to_string(), PropertyValue::String("plain".to_string()));
        properties.insert("region".to_string(), PropertyValue::String("us-east".to_string()));

        let redacted = redact_properties(&properties);
        assert_eq!(redacted["apiToken"], Value::String("<redacted>".to_string()));
        assert_eq!(redacted["region"], Value::String("us-east".to_string()));
    }

    #[test]
    fn secret_ref_renders_as_structured_reference_not_raw_value() {
        let mut properties = BTreeMap::new();
        properties.insert("password".to_string(), PropertyValue::Secret(secret_ref()));

        let redacted = redact_properties(&properties);
        assert!(redacted["password"]["$secretRef"].is_object());
    }
}
