//! Entity query routes for the `models` plugin (spec.md §4.9 "Entity query
//! endpoints (plugin-defined)"). Filter/sort/paginate is delegated
//! entirely to `catalog_query`, the uniform contract every plugin's entity
//! endpoint shares.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use catalog_query::{query_entities, EntityQueryParams};
use serde_json::{json, Value};

use super::repository::{ModelEntityRepository, ModelEntityRow};

#[derive(Clone)]
struct ModelsApiState {
    repository: Arc<ModelEntityRepository>,
}

pub fn router(repository: Arc<ModelEntityRepository>) -> Router {
    let state = ModelsApiState { repository };
    Router::new()
        .route("/models", get(list_models))
        .route("/models/:name", get(get_model))
        .with_state(state)
}

fn to_entity_json(row: &ModelEntityRow) -> Value {
    json!({
        "id": row.id,
        "name": row.name,
        "sourceId": row.source_id,
        "createTimeSinceEpoch": row.create_time.timestamp_millis(),
        "lastUpdateTimeSinceEpoch": row.last_update_time.timestamp_millis(),
        "customProperties": row.custom_properties,
    })
}

async fn list_models(
    State(state): State<ModelsApiState>,
    Query(params): Query<EntityQueryParams>,
) -> Response {
    let rows = match state.repository.list_all().await {
        Ok(rows) => rows,
        Err(e) => return super::super::error_response(&e),
    };

    let entities: Vec<Value> = rows.iter().map(to_entity_json).collect();
    match query_entities(entities, &params) {
        Ok(page) => Json(page).into_response(),
        Err(message) => (axum::http::StatusCode::BAD_REQUEST, Json(json!({ "code": "validation_error", "message": message }))).into_response(),
    }
}

async fn get_model(State(state): State<ModelsApiState>, Path(name): Path<String>) -> Response {
    // `name` alone is ambiguous across sources; entity lookup by name is
    // scoped to the single matching row when exactly one source uses it.
    let rows = match state.repository.list_all().await {
        Ok(rows) => rows,
        Err(e) => return super::super::error_response(&e),
    };

    match rows.into_iter().find(|r| r.name == name) {
        Some(row) => Json(to_entity_json(&row)).into_response(),
        None => (
            axum::http::StatusCode::NOT_FOUND,
            Json(json!({ "code": "not_found", "message": format!("model {name} not found") })),
        )
            .into_response(),
    }
}
