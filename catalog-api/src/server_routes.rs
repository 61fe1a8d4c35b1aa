//! Server-wide routes: plugin directory, health probes, and the refresh job
//! status endpoint (spec.md §4.9 bottom rows).

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use crate::context::ApiContext;
use crate::error::ApiError;

pub fn router(ctx: Arc<ApiContext>) -> Router {
    Router::new()
        .route("/api/plugins", get(list_plugins))
        .route("/api/plugins/:name/capabilities", get(plugin_capabilities))
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
        .route("/api/jobs/v1alpha1/refresh/:id", get(refresh_job_status))
        .with_state(ctx)
}

async fn list_plugins(State(ctx): State<Arc<ApiContext>>) -> impl IntoResponse {
    let statuses = ctx.lifecycle.all_statuses();
    let plugins: Vec<_> = ctx
        .registry
        .list()
        .into_iter()
        .map(|descriptor| {
            let status = statuses.get(&descriptor.name).cloned();
            json!({
                "name": descriptor.name,
                "version": descriptor.version,
                "description": descriptor.description,
                "basePath": descriptor.base_path,
                "entityKinds": descriptor.entity_kinds,
                "status": status,
            })
        })
        .collect();
    Json(json!({ "plugins": plugins }))
}

async fn plugin_capabilities(State(ctx): State<Arc<ApiContext>>, Path(name): Path<String>) -> Response {
    let Some(plugin) = ctx.registry.get(&name) else {
        return ApiError(catalog_core::CatalogError::NotFound(format!("plugin {name}"))).into_response();
    };

    if let Some(provider) = plugin.as_capabilities_v2_provider() {
        return Json(provider.capabilities_v2()).into_response();
    }

    let descriptor = plugin.descriptor();
    Json(json!({
        "name": descriptor.name,
        "entityKinds": descriptor.entity_kinds,
        "capabilities": {
            "sources": plugin.as_source_manager().is_some(),
            "refresh": plugin.as_refresh_provider().is_some(),
            "diagnostics": plugin.as_diagnostics_provider().is_some(),
        },
    }))
    .into_response()
}

async fn livez() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn readyz(State(ctx): State<Arc<ApiContext>>) -> Response {
    let ready = ctx.lifecycle.ready();
    let body = json!({
        "ready": ready,
        "replicaId": ctx.replica_id,
        "leader": ctx.is_leader.load(Ordering::Relaxed),
    });

    if ready {
        Json(body).into_response()
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

async fn refresh_job_status(State(ctx): State<Arc<ApiContext>>, Path(id): Path<Uuid>) -> Response {
    match ctx.refresh_jobs.get(id).await {
        Ok(Some(job)) => Json(job).into_response(),
        Ok(None) => ApiError(catalog_core::CatalogError::NotFound(format!("refresh job {id}"))).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}
