//! Authorization (spec.md §4.10): in `sar` mode, mutating verbs call the
//! platform's access-review API with a resource tuple derived from the
//! route; read verbs are ungated. A missing identity in `sar` mode is
//! fail-closed.

use async_trait::async_trait;
use catalog_core::{AuthzMode, CatalogError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::identity::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Update,
    Delete,
    Enable,
    Refresh,
    Rollback,
    Read,
}

impl Verb {
    pub fn is_mutating(self) -> bool {
        !matches!(self, Verb::Read)
    }

    fn as_str(self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
            Verb::Enable => "enable",
            Verb::Refresh => "refresh",
            Verb::Rollback => "rollback",
            Verb::Read => "read",
        }
    }
}

/// Resource tuple derived from the route, e.g. `plugins/models/sources/my-source`.
#[derive(Debug, Clone)]
pub struct ResourceRef {
    pub plugin: String,
    pub source_id: Option<String>,
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, identity: Option<&Identity>, verb: Verb, resource: &ResourceRef) -> Result<()>;
}

/// `CATALOG_AUTHZ_MODE=none`: every request the identity extractor lets
/// through is authorized.
pub struct NoneAuthorizer;

#[async_trait]
impl Authorizer for NoneAuthorizer {
    async fn authorize(&self, _identity: Option<&Identity>, _verb: Verb, _resource: &ResourceRef) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct SarRequest<'a> {
    subject: &'a str,
    groups: &'a [String],
    verb: &'a str,
    resource: String,
}

#[derive(Deserialize)]
struct SarResponse {
    allowed: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// `CATALOG_AUTHZ_MODE=sar`: mutating verbs call the platform's access
/// review API; read verbs pass through unchecked.
pub struct SarAuthorizer {
    client: reqwest::Client,
    review_url: String,
}

impl SarAuthorizer {
    pub fn new(review_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            review_url,
        }
    }
}

#[async_trait]
impl Authorizer for SarAuthorizer {
    async fn authorize(&self, identity: Option<&Identity>, verb: Verb, resource: &ResourceRef) -> Result<()> {
        if !verb.is_mutating() {
            return Ok(());
        }

        let Some(identity) = identity else {
            warn!(verb = verb.as_str(), "sar mode: missing identity, failing closed");
            return Err(CatalogError::PermissionDenied("missing caller identity".to_string()));
        };

        let resource_path = match &resource.source_id {
            Some(source_id) => format!("plugins/{}/sources/{}", resource.plugin, source_id),
            None => format!("plugins/{}", resource.plugin),
        };

        let request = SarRequest {
            subject: &identity.subject,
            groups: &identity.groups,
            verb: verb.as_str(),
            resource: resource_path,
        };

        let response = self
            .client
            .post(&self.review_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CatalogError::Internal(e.into()))?;

        let sar: SarResponse = response.json().await.map_err(|e| CatalogError::Internal(e.into()))?;

        if sar.allowed {
            Ok(())
        } else {
            Err(CatalogError::PermissionDenied(
                sar.reason.unwrap_or_else(|| "access review denied".to_string()),
            ))
        }
    }
}

/// Resolves an authorizer for the configured [`AuthzMode`]. `review_url`
/// is required (and only used) in `sar` mode.
pub fn authorizer_for(mode: AuthzMode, review_url: Option<String>) -> Box<dyn Authorizer> {
    match mode {
        AuthzMode::None => Box::new(NoneAuthorizer),
        AuthzMode::Sar => {
            Box::new(SarAuthorizer::new(review_url.expect("CATALOG_AUTHZ_MODE=sar requires a review URL")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            subject: "alice".to_string(),
            groups: vec!["eng".to_string()],
            roles: vec!["operator".to_string()],
        }
    }

    #[tokio::test]
    async fn none_mode_always_allows() {
        let authz = NoneAuthorizer;
        let resource = ResourceRef {
            plugin: "models".to_string(),
            source_id: None,
        };
        assert!(authz.authorize(None, Verb::Delete, &resource).await.is_ok());
    }

    #[tokio::test]
    async fn sar_mode_read_verb_bypasses_identity_check() {
        let authz = SarAuthorizer::new("http://unused.invalid".to_string());
        let resource = ResourceRef {
            plugin: "models".to_string(),
            source_id: None,
        };
        assert!(authz.authorize(None, Verb::Read, &resource).await.is_ok());
    }

    #[tokio::test]
    async fn sar_mode_mutating_verb_without_identity_fails_closed() {
        let authz = SarAuthorizer::new("http://unused.invalid".to_string());
        let resource = ResourceRef {
            plugin: "models".to_string(),
            source_id: None,
        };
        let err = authz.authorize(None, Verb::Delete, &resource).await.unwrap_err();
        assert!(matches!(err, CatalogError::PermissionDenied(_)));
    }

    #[test]
    fn identity_has_role_checks_membership() {
        assert!(identity().has_role("operator"));
        assert!(!identity().has_role("admin"));
    }
}
