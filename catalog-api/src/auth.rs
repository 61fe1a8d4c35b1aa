//! Adapts axum's `HeaderMap` to `catalog_security::HeaderSource`, then
//! extracts and authorizes identity for one management request (spec.md
//! §4.10).

use axum::http::HeaderMap;
use catalog_security::{HeaderSource, Identity, ResourceRef, Verb};

use crate::context::ApiContext;
use crate::error::ApiError;

struct AxumHeaders<'a>(&'a HeaderMap);

impl<'a> HeaderSource for AxumHeaders<'a> {
    fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Extracts the caller's identity from `headers` and runs it past the
/// configured authorizer for `verb` against `resource`. Returns the
/// identity (possibly `None` outside `sar` mode) on success.
pub async fn authorize(
    ctx: &ApiContext,
    headers: &HeaderMap,
    verb: Verb,
    resource: ResourceRef,
) -> std::result::Result<Option<Identity>, ApiError> {
    let adapted = AxumHeaders(headers);
    let identity = ctx.identity_extractor.extract(&adapted).await.map_err(wrap)?;
    ctx.authorizer.authorize(identity.as_ref(), verb, &resource).await.map_err(wrap)?;
    Ok(identity)
}

fn wrap(e: catalog_core::CatalogError) -> ApiError {
    ApiError(e)
}
