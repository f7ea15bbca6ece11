//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::session::SubscriberSession;
use crate::app_state::AppState;

/// `GET /subscribe` — Upgrade HTTP connection to a subscriber WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let session = SubscriberSession::new(Arc::clone(&state.world), Arc::clone(&state.router));

    ws.on_upgrade(move |socket| async move {
        session.run(socket).await;
    })
}
