//! Per-plugin management routes mounted at `{basePath}/management` (spec.md
//! §4.9). Every handler here is plugin-neutral: it only calls through the
//! optional capability accessors on `dyn CatalogPlugin`, never a concrete
//! plugin type.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use catalog_core::{CatalogError, CatalogPlugin};
use catalog_security::{ResourceRef, Verb};
use catalog_validate::{SourceConfig, Validator};
use serde::Deserialize;
use serde_json::json;

use crate::auth::authorize;
use crate::context::ApiContext;
use crate::error::ApiError;

#[derive(Clone)]
struct ManagementState {
    ctx: Arc<ApiContext>,
    plugin: Arc<dyn CatalogPlugin>,
}

pub fn router(ctx: Arc<ApiContext>, plugin: Arc<dyn CatalogPlugin>) -> Router {
    let state = ManagementState { ctx, plugin };
    Router::new()
        .route("/sources", get(list_sources))
        .route("/validate-source", post(validate_candidate))
        .route("/apply-source", post(apply_source))
        .route("/sources/:id", post(source_colon_action).delete(delete_source))
        .route("/sources/:id/enable", post(enable_source))
        .route("/sources/:id/revisions", get(list_revisions))
        .route("/refresh", post(enqueue_refresh_all))
        .route("/refresh/:id", post(enqueue_refresh_source))
        .route("/diagnostics", get(diagnostics))
        .with_state(state)
}

fn plugin_name(plugin: &Arc<dyn CatalogPlugin>) -> String {
    plugin.descriptor().name
}

async fn list_sources(State(state): State<ManagementState>, headers: HeaderMap) -> Response {
    let resource = ResourceRef { plugin: plugin_name(&state.plugin), source_id: None };
    if let Err(e) = authorize(&state.ctx, &headers, Verb::Read, resource).await {
        return e.into_response();
    }

    let Some(inspector) = state.plugin.as_source_inspector() else {
        return ApiError(CatalogError::Validation("plugin does not manage sources".to_string())).into_response();
    };

    match inspector.list_sources().await {
        Ok(sources) => Json(json!({ "sources": sources })).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn validate_candidate(State(state): State<ManagementState>, headers: HeaderMap, body: Bytes) -> Response {
    let resource = ResourceRef { plugin: plugin_name(&state.plugin), source_id: None };
    if let Err(e) = authorize(&state.ctx, &headers, Verb::Read, resource).await {
        return e.into_response();
    }

    let result = run_validator(&state.plugin, body.to_vec()).await;
    Json(result).into_response()
}

async fn source_colon_action(
    State(state): State<ManagementState>,
    headers: HeaderMap,
    Path(id_with_suffix): Path<String>,
    body: Bytes,
) -> Response {
    if let Some(id) = id_with_suffix.strip_suffix(":validate") {
        revalidate_stored(state, headers, id).await
    } else if let Some(id) = id_with_suffix.strip_suffix(":rollback") {
        rollback(state, headers, id, body).await
    } else {
        ApiError(CatalogError::Validation(format!("unknown custom method on source {id_with_suffix:?}"))).into_response()
    }
}

async fn revalidate_stored(state: ManagementState, headers: HeaderMap, id: &str) -> Response {
    let resource = ResourceRef { plugin: plugin_name(&state.plugin), source_id: Some(id.to_string()) };
    if let Err(e) = authorize(&state.ctx, &headers, Verb::Read, resource).await {
        return e.into_response();
    }

    let plugin_name = plugin_name(&state.plugin);
    let (payload, _revision) = match state.ctx.config_store.get(&plugin_name, id).await {
        Ok(v) => v,
        Err(e) => return ApiError(e).into_response(),
    };

    let result = run_validator(&state.plugin, payload).await;
    Json(result).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RollbackRequest {
    revision: String,
}

async fn rollback(state: ManagementState, headers: HeaderMap, id: &str, body: Bytes) -> Response {
    let resource = ResourceRef { plugin: plugin_name(&state.plugin), source_id: Some(id.to_string()) };
    if let Err(e) = authorize(&state.ctx, &headers, Verb::Rollback, resource).await {
        return e.into_response();
    }

    let request: RollbackRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return ApiError(CatalogError::Validation(format!("invalid rollback request: {e}"))).into_response(),
    };

    let plugin_name = plugin_name(&state.plugin);
    let new_revision = match state.ctx.config_store.rollback(&plugin_name, id, &request.revision).await {
        Ok(r) => r,
        Err(e) => return ApiError(e).into_response(),
    };

    if let Some(inspector) = state.plugin.as_source_inspector() {
        if let Err(e) = inspector.sync_sources().await {
            return ApiError(e).into_response();
        }
    }

    Json(json!({ "revision": new_revision })).into_response()
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ApplyParams {
    expected_revision: Option<String>,
    #[serde(default)]
    refresh_after_apply: bool,
}

async fn apply_source(
    State(state): State<ManagementState>,
    headers: HeaderMap,
    Query(params): Query<ApplyParams>,
    body: Bytes,
) -> Response {
    let resource = ResourceRef { plugin: plugin_name(&state.plugin), source_id: None };
    if let Err(e) = authorize(&state.ctx, &headers, Verb::Create, resource).await {
        return e.into_response();
    }

    let result = run_validator(&state.plugin, body.to_vec()).await;
    if !result.valid {
        return (axum::http::StatusCode::UNPROCESSABLE_ENTITY, Json(result)).into_response();
    }

    let config: SourceConfig = match serde_yaml::from_slice(&body) {
        Ok(c) => c,
        Err(e) => return ApiError(CatalogError::Validation(format!("re-parsing validated payload: {e}"))).into_response(),
    };

    let plugin_name = plugin_name(&state.plugin);
    let revision = match state
        .ctx
        .config_store
        .apply(&plugin_name, &config.id, body.to_vec(), params.expected_revision.as_deref())
        .await
    {
        Ok(r) => r,
        Err(e) => return ApiError(e).into_response(),
    };

    // Apply -> Reload is a happens-before chain: the response is only
    // returned once the Source Collection reflects the new config.
    if let Some(inspector) = state.plugin.as_source_inspector() {
        if let Err(e) = inspector.sync_sources().await {
            return ApiError(e).into_response();
        }
    }

    let mut response = json!({ "revision": revision, "valid": true });

    if params.refresh_after_apply {
        if let Some(refresh) = state.plugin.as_refresh_provider() {
            match refresh.refresh_source(&config.id).await {
                Ok(outcome) => response["refresh"] = json!(outcome),
                Err(e) => return ApiError(e).into_response(),
            }
        }
    }

    Json(response).into_response()
}

async fn enable_source(State(state): State<ManagementState>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let resource = ResourceRef { plugin: plugin_name(&state.plugin), source_id: Some(id.clone()) };
    if let Err(e) = authorize(&state.ctx, &headers, Verb::Enable, resource).await {
        return e.into_response();
    }

    let plugin_name = plugin_name(&state.plugin);
    let (payload, revision) = match state.ctx.config_store.get(&plugin_name, &id).await {
        Ok(v) => v,
        Err(e) => return ApiError(e).into_response(),
    };

    let mut config: SourceConfig = match serde_yaml::from_slice(&payload) {
        Ok(c) => c,
        Err(e) => return ApiError(CatalogError::Internal(anyhow::anyhow!("stored source config unparseable: {e}"))).into_response(),
    };
    config.enabled = Some(!config.is_enabled());

    let new_payload = match serde_yaml::to_vec(&config) {
        Ok(p) => p,
        Err(e) => return ApiError(CatalogError::Internal(anyhow::anyhow!("serializing toggled config: {e}"))).into_response(),
    };

    let new_revision = match state.ctx.config_store.apply(&plugin_name, &id, new_payload, Some(&revision)).await {
        Ok(r) => r,
        Err(e) => return ApiError(e).into_response(),
    };

    if let Some(inspector) = state.plugin.as_source_inspector() {
        if let Err(e) = inspector.sync_sources().await {
            return ApiError(e).into_response();
        }
    }

    Json(json!({ "id": id, "enabled": config.is_enabled(), "revision": new_revision })).into_response()
}

async fn delete_source(State(state): State<ManagementState>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let resource = ResourceRef { plugin: plugin_name(&state.plugin), source_id: Some(id.clone()) };
    if let Err(e) = authorize(&state.ctx, &headers, Verb::Delete, resource).await {
        return e.into_response();
    }

    // Cascade-delete entities first (spec.md §3.1), then the persisted
    // config — the other order could leave orphaned entities if the
    // process dies in between.
    if let Some(inspector) = state.plugin.as_source_inspector() {
        if let Err(e) = inspector.remove_source(&id).await {
            return ApiError(e).into_response();
        }
    }

    let plugin_name = plugin_name(&state.plugin);
    match state.ctx.config_store.delete(&plugin_name, &id).await {
        Ok(()) => Json(json!({ "deleted": true })).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn list_revisions(State(state): State<ManagementState>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let resource = ResourceRef { plugin: plugin_name(&state.plugin), source_id: Some(id.clone()) };
    if let Err(e) = authorize(&state.ctx, &headers, Verb::Read, resource).await {
        return e.into_response();
    }

    let plugin_name = plugin_name(&state.plugin);
    match state.ctx.config_store.list_revisions(&plugin_name, &id).await {
        Ok(revisions) => {
            // Payload bytes are an implementation detail of rollback, not
            // something a revision list response should dump.
            let summaries: Vec<_> = revisions
                .iter()
                .map(|r| json!({ "version": r.version, "timestamp": r.timestamp, "size": r.size }))
                .collect();
            Json(json!({ "revisions": summaries })).into_response()
        }
        Err(e) => ApiError(e).into_response(),
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RefreshParams {
    idempotency_key: Option<String>,
}

async fn enqueue_refresh_all(
    State(state): State<ManagementState>,
    headers: HeaderMap,
    Query(params): Query<RefreshParams>,
) -> Response {
    enqueue_refresh(state, headers, None, params).await
}

async fn enqueue_refresh_source(
    State(state): State<ManagementState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<RefreshParams>,
) -> Response {
    enqueue_refresh(state, headers, Some(id), params).await
}

async fn enqueue_refresh(
    state: ManagementState,
    headers: HeaderMap,
    source_id: Option<String>,
    params: RefreshParams,
) -> Response {
    let resource = ResourceRef { plugin: plugin_name(&state.plugin), source_id: source_id.clone() };
    let identity = match authorize(&state.ctx, &headers, Verb::Refresh, resource).await {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    let plugin_name = plugin_name(&state.plugin);
    let cooldown_key = source_id.clone().unwrap_or_else(|| "*".to_string());
    if let Err(remaining) = state.ctx.rate_limiter.check(&plugin_name, &cooldown_key) {
        let error = CatalogError::RateLimited { retry_after_secs: remaining.as_secs().max(1) };
        return ApiError(error).into_response();
    }

    if let Some(key) = params.idempotency_key.as_deref() {
        match state.ctx.refresh_jobs.find_by_idempotency_key(key).await {
            Ok(Some(existing)) => return (axum::http::StatusCode::ACCEPTED, Json(json!({ "jobId": existing.id }))).into_response(),
            Ok(None) => {}
            Err(e) => return ApiError(e).into_response(),
        }
    }

    let requested_by = identity.map(|i| i.subject).unwrap_or_else(|| "anonymous".to_string());
    match state
        .ctx
        .refresh_jobs
        .enqueue(&state.ctx.config.namespace, &plugin_name, source_id.as_deref(), &requested_by, params.idempotency_key.as_deref())
        .await
    {
        Ok(job) => (axum::http::StatusCode::ACCEPTED, Json(json!({ "jobId": job.id }))).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn diagnostics(State(state): State<ManagementState>, headers: HeaderMap) -> Response {
    let resource = ResourceRef { plugin: plugin_name(&state.plugin), source_id: None };
    if let Err(e) = authorize(&state.ctx, &headers, Verb::Read, resource).await {
        return e.into_response();
    }

    let Some(provider) = state.plugin.as_diagnostics_provider() else {
        return Json(json!({ "plugin": plugin_name(&state.plugin) })).into_response();
    };

    match provider.diagnostics().await {
        Ok(value) => Json(value).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn run_validator(plugin: &Arc<dyn CatalogPlugin>, raw: Vec<u8>) -> catalog_validate::ValidationResult {
    let source_manager = plugin.as_source_manager();
    let provider_types = source_manager.map(|sm| sm.provider_types()).unwrap_or_default();
    let validator = Validator::new(provider_types, source_manager);
    validator.validate(raw).await
}
