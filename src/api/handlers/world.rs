//! World handlers: entity read/write, whole-world snapshot, clear.
//!
//! Request bodies are read as raw bytes and parsed as JSON whatever the
//! `Content-Type`, so plain `curl -d` clients work too.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::Value;

use crate::app_state::AppState;
use crate::domain::Attributes;
use crate::error::{ErrorResponse, ServerError};

fn parse_value(body: &Bytes) -> Result<Value, ServerError> {
    serde_json::from_slice(body)
        .map_err(|e| ServerError::InvalidRequest(format!("body is not valid JSON: {e}")))
}

fn parse_attributes(body: &Bytes) -> Result<Attributes, ServerError> {
    match parse_value(body)? {
        Value::Object(attributes) => Ok(attributes),
        _ => Err(ServerError::InvalidRequest(
            "entity body must be a JSON object".to_string(),
        )),
    }
}

/// `POST|PUT /entity/{entity}` — Replace an entity's attributes.
///
/// # Errors
///
/// Returns [`ServerError::InvalidRequest`] if the body is not a JSON object.
#[utoipa::path(
    method(post, put),
    path = "/entity/{entity}",
    tag = "World",
    summary = "Replace an entity",
    description = "Replaces the entity's whole attribute mapping and broadcasts the change to every subscriber.",
    params(
        ("entity" = String, Path, description = "Entity identifier"),
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Stored attributes", body = serde_json::Value),
        (status = 400, description = "Body is not a JSON object", body = ErrorResponse),
    )
)]
pub async fn set_entity(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    let data = parse_attributes(&body)?;
    let stored = state.world.set(&entity, data).await;
    Ok(Json(stored))
}

/// `GET /entity/{entity}` — Read one entity.
#[utoipa::path(
    get,
    path = "/entity/{entity}",
    tag = "World",
    summary = "Get an entity",
    description = "Returns the entity's attributes, or an empty object if it does not exist.",
    params(
        ("entity" = String, Path, description = "Entity identifier"),
    ),
    responses(
        (status = 200, description = "Entity attributes", body = serde_json::Value),
    )
)]
pub async fn get_entity(
    State(state): State<AppState>,
    Path(entity): Path<String>,
) -> impl IntoResponse {
    Json(state.world.get(&entity).await)
}

/// `PUT /entity/{entity}/{key}` — Set one attribute, keeping the others.
///
/// # Errors
///
/// Returns [`ServerError::InvalidRequest`] if the body is not valid JSON.
#[utoipa::path(
    put,
    path = "/entity/{entity}/{key}",
    tag = "World",
    summary = "Update one attribute",
    description = "Sets a single attribute on the entity (creating it if needed) and broadcasts the merged attributes.",
    params(
        ("entity" = String, Path, description = "Entity identifier"),
        ("key" = String, Path, description = "Attribute name"),
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Merged attributes", body = serde_json::Value),
        (status = 400, description = "Body is not valid JSON", body = ErrorResponse),
    )
)]
pub async fn update_attribute(
    State(state): State<AppState>,
    Path((entity, key)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    let value = parse_value(&body)?;
    let merged = state.world.update(&entity, &key, value).await;
    Ok(Json(merged))
}

/// `GET|POST /world` — Whole-world snapshot.
#[utoipa::path(
    method(get, post),
    path = "/world",
    tag = "World",
    summary = "Get the world",
    description = "Returns every entity keyed by identifier.",
    responses(
        (status = 200, description = "World snapshot", body = serde_json::Value),
    )
)]
pub async fn get_world(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.world.snapshot().await)
}

/// `GET|POST /clear` — Remove every entity.
#[utoipa::path(
    method(get, post),
    path = "/clear",
    tag = "World",
    summary = "Clear the world",
    description = "Empties the world and returns the (empty) snapshot. Subscribers receive an empty object per removed entity unless disabled.",
    responses(
        (status = 200, description = "Empty world", body = serde_json::Value),
    )
)]
pub async fn clear_world(State(state): State<AppState>) -> impl IntoResponse {
    state.world.clear().await;
    Json(state.world.snapshot().await)
}

/// `GET /` — Redirect to the bundled client page.
pub async fn root_redirect() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/static/index.html")])
}

/// World routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root_redirect))
        .route("/entity/{entity}", get(get_entity).post(set_entity).put(set_entity))
        .route("/entity/{entity}/{key}", put(update_attribute))
        .route("/world", get(get_world).post(get_world))
        .route("/clear", get(clear_world).post(clear_world))
}
