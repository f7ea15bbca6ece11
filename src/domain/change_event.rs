//! Change events emitted by [`super::SharedState`] mutations.
//!
//! A [`ChangeEvent`] is ephemeral: it is produced at the instant a mutation
//! completes, serialized once by the [`super::BroadcastRouter`], and never
//! stored. On the wire it is a single-key object `{"<entity>": {..}}`.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::ServerError;

/// Attribute mapping of one entity. No schema is enforced.
pub type Attributes = Map<String, Value>;

/// The whole world: entity identifier to attribute mapping.
pub type World = HashMap<String, Attributes>;

/// The `(entity, full current attributes)` pair produced by a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Identifier of the mutated entity.
    pub entity: String,
    /// The entity's complete attribute mapping after the mutation.
    pub data: Attributes,
}

impl ChangeEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(entity: impl Into<String>, data: Attributes) -> Self {
        Self {
            entity: entity.into(),
            data,
        }
    }

    /// Serializes the event into its wire form `{"<entity>": <data>}`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Serialization`] if an attribute value cannot
    /// be encoded.
    pub fn to_message(&self) -> Result<String, ServerError> {
        let mut envelope = Map::with_capacity(1);
        envelope.insert(self.entity.clone(), Value::Object(self.data.clone()));
        Ok(serde_json::to_string(&envelope)?)
    }
}
