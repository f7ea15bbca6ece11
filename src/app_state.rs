//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::{BroadcastRouter, ChangeListener, SharedState};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The world every endpoint reads and writes.
    pub world: Arc<SharedState>,
    /// Subscriber fan-out for WebSocket sessions.
    pub router: Arc<BroadcastRouter>,
}

impl AppState {
    /// Builds the world and router and registers the router as the world's
    /// change listener.
    pub async fn new(subscriber_queue_capacity: usize, broadcast_on_clear: bool) -> Self {
        let world = Arc::new(SharedState::new(broadcast_on_clear));
        let router = Arc::new(BroadcastRouter::new(subscriber_queue_capacity));
        world
            .add_listener(Arc::clone(&router) as Arc<dyn ChangeListener>)
            .await;
        Self { world, router }
    }
}
