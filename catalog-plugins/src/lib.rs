//! Concrete plugin implementations hosted by the catalog runtime.
//!
//! `catalog-core` only contracts the plugin trait family; this crate is
//! where an actual plugin — with its own entity table, provider, and
//! routes — lives. `models` is the one shipped example, grounded in the
//! capability-trait pattern `aerolithdb-plugins` used for its own example
//! plugins (blockchain/payment integrations), generalized to this host's
//! `CatalogPlugin`/`SourceManager`/`RefreshProvider` trait family.

mod models;

pub use models::{ModelEntityRepository, ModelEntityRow, ModelsPlugin};

use axum::response::{IntoResponse, Response};
use axum::Json;
use catalog_core::CatalogError;
use serde_json::json;

/// Shared `CatalogError` -> HTTP response mapping (spec.md §7 error
/// envelope), used by every plugin's own route handlers.
pub(crate) fn error_response(error: &CatalogError) -> Response {
    let status = match error {
        CatalogError::Validation(_) => axum::http::StatusCode::BAD_REQUEST,
        CatalogError::Conflict { .. } => axum::http::StatusCode::CONFLICT,
        CatalogError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
        CatalogError::RateLimited { .. } => axum::http::StatusCode::TOO_MANY_REQUESTS,
        CatalogError::Provider { .. } => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        CatalogError::PluginLifecycle { .. } => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        CatalogError::PermissionDenied(_) => axum::http::StatusCode::FORBIDDEN,
        CatalogError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "code": error.code(), "message": error.to_string() }))).into_response()
}
