//! Error taxonomy shared by every layer of the catalog host.
//!
//! Mirrors the kind-not-type taxonomy in the design: each variant maps to a
//! stable `code` string and HTTP status at the API edge (see `catalog-api`).

use thiserror::Error;

/// Core error type propagated across crate boundaries.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("config store conflict: expected revision {expected}, found {found}")]
    Conflict { expected: String, found: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("provider error for source {source_id}: {message}")]
    Provider { source_id: String, message: String },

    #[error("plugin lifecycle error in {plugin}: {message}")]
    PluginLifecycle { plugin: String, message: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CatalogError {
    /// Stable machine-readable code, used in the JSON error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::Validation(_) => "validation_error",
            CatalogError::Conflict { .. } => "conflict",
            CatalogError::NotFound(_) => "not_found",
            CatalogError::RateLimited { .. } => "rate_limited",
            CatalogError::Provider { .. } => "provider_error",
            CatalogError::PluginLifecycle { .. } => "plugin_lifecycle_error",
            CatalogError::PermissionDenied(_) => "permission_denied",
            CatalogError::Internal(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
