//! The shared world state and its listener registry.
//!
//! [`SharedState`] stores every entity behind a single
//! [`tokio::sync::RwLock`]. Each mutation and the notification of all
//! registered [`ChangeListener`]s happen under the same write guard, so
//! listeners observe changes in exactly the order the mutations were
//! applied. Reads share the lock and return owned copies; no caller ever
//! holds a reference into the world.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use super::change_event::{Attributes, ChangeEvent, World};

/// Receives every [`ChangeEvent`] produced by a [`SharedState`] mutation.
///
/// Called while the world write lock is held: implementations must not
/// block and must not call back into the [`SharedState`].
pub trait ChangeListener: fmt::Debug + Send + Sync {
    /// Handles one change.
    fn on_change(&self, event: &ChangeEvent);
}

#[derive(Debug, Default)]
struct Inner {
    world: World,
    listeners: Vec<Arc<dyn ChangeListener>>,
}

impl Inner {
    fn notify(&self, event: &ChangeEvent) {
        for listener in &self.listeners {
            listener.on_change(event);
        }
    }
}

/// In-memory world state with synchronous change notification.
///
/// # Concurrency
///
/// - Reads (`get`, `snapshot`) run concurrently with each other.
/// - Mutations are serialized, and each one finishes notifying its
///   listeners before the next mutation starts.
#[derive(Debug)]
pub struct SharedState {
    inner: RwLock<Inner>,
    broadcast_on_clear: bool,
}

impl SharedState {
    /// Creates an empty world.
    ///
    /// With `broadcast_on_clear`, [`clear`](Self::clear) emits one
    /// `{"<entity>": {}}` change per entity it removes.
    #[must_use]
    pub fn new(broadcast_on_clear: bool) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            broadcast_on_clear,
        }
    }

    /// Registers a listener for all future changes.
    pub async fn add_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.inner.write().await.listeners.push(listener);
    }

    /// Replaces the entity's whole attribute mapping with `data`.
    ///
    /// Returns the stored mapping.
    pub async fn set(&self, entity: &str, data: Attributes) -> Attributes {
        let mut inner = self.inner.write().await;
        inner.world.insert(entity.to_string(), data.clone());
        inner.notify(&ChangeEvent::new(entity, data.clone()));
        tracing::debug!(entity, "entity set");
        data
    }

    /// Sets a single attribute, keeping every other attribute of the entity.
    ///
    /// The value replaces whatever was stored under `key`; nested objects
    /// are not merged. Returns the merged mapping.
    pub async fn update(&self, entity: &str, key: &str, value: Value) -> Attributes {
        let mut inner = self.inner.write().await;
        let entry = inner.world.entry(entity.to_string()).or_default();
        entry.insert(key.to_string(), value);
        let merged = entry.clone();
        inner.notify(&ChangeEvent::new(entity, merged.clone()));
        tracing::debug!(entity, key, "entity updated");
        merged
    }

    /// Returns the entity's mapping, or an empty mapping if it does not exist.
    pub async fn get(&self, entity: &str) -> Attributes {
        self.inner
            .read()
            .await
            .world
            .get(entity)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns a copy of the whole world.
    pub async fn snapshot(&self) -> World {
        self.inner.read().await.world.clone()
    }

    /// Empties the world in one step. Returns how many entities were removed.
    pub async fn clear(&self) -> usize {
        let mut inner = self.inner.write().await;
        let cleared = std::mem::take(&mut inner.world);
        let count = cleared.len();
        if self.broadcast_on_clear {
            for entity in cleared.into_keys() {
                inner.notify(&ChangeEvent::new(entity, Attributes::new()));
            }
        }
        tracing::info!(entities = count, "world cleared");
        count
    }

    /// Returns the number of entities in the world.
    pub async fn len(&self) -> usize {
        self.inner.read().await.world.len()
    }

    /// Returns `true` if the world holds no entities.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.world.is_empty()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(true)
    }
}
