//! Identity extraction (spec.md §4.10): trusted-proxy headers or a verified
//! bearer token with configurable claim paths. The host only consumes a
//! role/identity — it never issues tokens or manages sessions (spec.md §1).

use std::collections::BTreeMap;

use async_trait::async_trait;
use catalog_core::{AuthConfig, AuthMode, CatalogError, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;

/// Caller identity resolved from the incoming request, independent of how
/// it was extracted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub groups: Vec<String>,
    pub roles: Vec<String>,
}

impl Identity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// A request's headers, decoupled from any particular HTTP framework's
/// header map type so this crate doesn't need an axum dependency.
pub trait HeaderSource {
    fn get(&self, name: &str) -> Option<&str>;
}

impl HeaderSource for BTreeMap<String, String> {
    fn get(&self, name: &str) -> Option<&str> {
        BTreeMap::get(self, name).map(String::as_str)
    }
}

#[async_trait]
pub trait IdentityExtractor: Send + Sync {
    async fn extract(&self, headers: &dyn HeaderSource) -> Result<Option<Identity>>;
}

/// `CATALOG_AUTH_MODE=header`: identity is carried by a trusted reverse
/// proxy in `X-Forwarded-User` / `X-Forwarded-Groups` / `X-User-Role`.
pub struct HeaderIdentityExtractor;

#[async_trait]
impl IdentityExtractor for HeaderIdentityExtractor {
    async fn extract(&self, headers: &dyn HeaderSource) -> Result<Option<Identity>> {
        let Some(subject) = headers.get("x-forwarded-user") else {
            return Ok(None);
        };
        let groups = headers.get("x-forwarded-groups").map(split_csv).unwrap_or_default();
        let roles = headers.get("x-user-role").map(split_csv).unwrap_or_default();
        Ok(Some(Identity {
            subject: subject.to_string(),
            groups,
            roles,
        }))
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

#[derive(Deserialize)]
struct BearerClaims {
    sub: String,
    #[serde(flatten)]
    rest: BTreeMap<String, Value>,
}

/// `CATALOG_AUTH_MODE=jwt`: identity comes from a verified bearer token;
/// the role list lives at a configurable dot-path. Generalizes the claim
/// layout `aerolithdb-saas::auth::SaaSClaims` hard-codes into an arbitrary
/// nested path, since this host has no fixed claim schema of its own.
pub struct JwtIdentityExtractor {
    decoding_key: DecodingKey,
    validation: Validation,
    role_claim_path: String,
}

impl JwtIdentityExtractor {
    pub fn new(hmac_secret: &[u8], role_claim_path: String) -> Self {
        let validation = Validation::new(Algorithm::HS256);
        Self {
            decoding_key: DecodingKey::from_secret(hmac_secret),
            validation,
            role_claim_path,
        }
    }
}

#[async_trait]
impl IdentityExtractor for JwtIdentityExtractor {
    async fn extract(&self, headers: &dyn HeaderSource) -> Result<Option<Identity>> {
        let Some(token) = headers.get("authorization").and_then(|h| h.strip_prefix("Bearer ")) else {
            return Ok(None);
        };

        let data = decode::<BearerClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| CatalogError::PermissionDenied(format!("invalid bearer token: {e}")))?;

        let claims_value = serde_json::to_value(&data.claims.rest).map_err(|e| CatalogError::Internal(e.into()))?;
        let roles = claim_path_strings(&claims_value, &self.role_claim_path);

        Ok(Some(Identity {
            subject: data.claims.sub,
            groups: Vec::new(),
            roles,
        }))
    }
}

/// Walks a dot-path (e.g. `realm_access.roles`) into a JSON value and
/// collects any string array found there.
fn claim_path_strings(root: &Value, path: &str) -> Vec<String> {
    let mut current = root;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(v) => current = v,
            None => return Vec::new(),
        }
    }
    current
        .as_array()
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Resolves identity for the configured [`AuthMode`].
pub fn extractor_for(config: &AuthConfig, jwt_hmac_secret: &[u8]) -> Box<dyn IdentityExtractor> {
    match config.mode {
        AuthMode::Header => Box::new(HeaderIdentityExtractor),
        AuthMode::Jwt => Box::new(JwtIdentityExtractor::new(jwt_hmac_secret, config.jwt_role_claim_path.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn header_mode_parses_csv_groups_and_roles() {
        let h = headers(&[
            ("x-forwarded-user", "alice"),
            ("x-forwarded-groups", "eng, platform"),
            ("x-user-role", "operator"),
        ]);
        let identity = HeaderIdentityExtractor.extract(&h).await.unwrap().unwrap();
        assert_eq!(identity.subject, "alice");
        assert_eq!(identity.groups, vec!["eng", "platform"]);
        assert!(identity.has_role("operator"));
    }

    #[tokio::test]
    async fn header_mode_returns_none_without_user_header() {
        let h = headers(&[]);
        assert!(HeaderIdentityExtractor.extract(&h).await.unwrap().is_none());
    }

    #[test]
    fn claim_path_walks_nested_objects() {
        let value = serde_json::json!({"realm_access": {"roles": ["viewer", "operator"]}});
        let roles = claim_path_strings(&value, "realm_access.roles");
        assert_eq!(roles, vec!["viewer", "operator"]);
    }

    #[test]
    fn claim_path_missing_segment_yields_empty() {
        let value = serde_json::json!({"roles": ["viewer"]});
        assert!(claim_path_strings(&value, "realm_access.roles").is_empty());
    }
}
