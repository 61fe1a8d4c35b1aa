//! `CatalogError` -> HTTP response mapping (spec.md §7 error envelope),
//! shared by every management handler in this crate.

use axum::response::{IntoResponse, Response};
use axum::Json;
use catalog_core::CatalogError;
use serde_json::json;

pub struct ApiError(pub CatalogError);

impl From<CatalogError> for ApiError {
    fn from(error: CatalogError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.0;
        let status = match &error {
            CatalogError::Validation(_) => axum::http::StatusCode::BAD_REQUEST,
            CatalogError::Conflict { .. } => axum::http::StatusCode::CONFLICT,
            CatalogError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            CatalogError::RateLimited { .. } => axum::http::StatusCode::TOO_MANY_REQUESTS,
            CatalogError::Provider { .. } => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            CatalogError::PluginLifecycle { .. } => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            CatalogError::PermissionDenied(_) => axum::http::StatusCode::FORBIDDEN,
            CatalogError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut response =
            (status, Json(json!({ "code": error.code(), "message": error.to_string() }))).into_response();

        if let CatalogError::RateLimited { retry_after_secs } = &error {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry_after_secs.to_string().parse().unwrap());
        }

        response
    }
}
