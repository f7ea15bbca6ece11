//! REST API layer: route handlers, static assets, and the OpenAPI document.
//!
//! Endpoints are mounted at the root, matching the paths existing clients
//! already use (`/entity/{entity}`, `/world`, `/clear`).

pub mod handlers;

use std::path::Path;

use axum::Router;
use tower_http::services::ServeDir;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI description of the REST endpoints.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "worldcast",
        description = "Shared world state with real-time change broadcast over `/subscribe`."
    ),
    paths(
        handlers::world::set_entity,
        handlers::world::get_entity,
        handlers::world::update_attribute,
        handlers::world::get_world,
        handlers::world::clear_world,
        handlers::system::health_handler,
    ),
    tags(
        (name = "World", description = "Entity and world state"),
        (name = "System", description = "Service status"),
    )
)]
pub struct ApiDoc;

/// Builds the complete REST router, serving `static_dir` under `/static`.
pub fn build_router(static_dir: &Path) -> Router<AppState> {
    Router::new()
        .merge(handlers::routes())
        .nest_service("/static", ServeDir::new(static_dir))
}
