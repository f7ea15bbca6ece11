//! Inbound WebSocket message decoding.
//!
//! Clients send the same shape the server broadcasts: a JSON object with
//! exactly one key, the entity id, whose value is the entity's attribute
//! object.

use serde_json::Value;

use crate::domain::ChangeEvent;
use crate::error::ServerError;

/// Parses a client frame of the form `{"<entity>": {..}}`.
///
/// # Errors
///
/// Returns [`ServerError::MalformedMessage`] if the text is not JSON, is not
/// an object with exactly one entry, or that entry's value is not an
/// object.
pub fn parse_change_request(text: &str) -> Result<ChangeEvent, ServerError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ServerError::MalformedMessage(format!("invalid JSON: {e}")))?;

    let Value::Object(envelope) = value else {
        return Err(ServerError::MalformedMessage(
            "expected a JSON object".to_string(),
        ));
    };
    if envelope.len() != 1 {
        return Err(ServerError::MalformedMessage(format!(
            "expected exactly one entity, got {}",
            envelope.len()
        )));
    }

    let Some((entity, data)) = envelope.into_iter().next() else {
        return Err(ServerError::MalformedMessage("empty object".to_string()));
    };
    match data {
        Value::Object(attributes) => Ok(ChangeEvent::new(entity, attributes)),
        _ => Err(ServerError::MalformedMessage(format!(
            "attributes of {entity:?} must be an object"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_single_entity() {
        let Ok(change) = parse_change_request(r#"{"robot1": {"x": 1, "tags": ["a"]}}"#) else {
            panic!("valid message rejected");
        };
        assert_eq!(change.entity, "robot1");
        assert_eq!(Value::Object(change.data), json!({"x": 1, "tags": ["a"]}));
    }

    #[test]
    fn accepts_empty_attributes() {
        let Ok(change) = parse_change_request(r#"{"e": {}}"#) else {
            panic!("empty attributes rejected");
        };
        assert!(change.data.is_empty());
    }

    #[test]
    fn rejects_malformed_shapes() {
        for text in [
            "not json",
            "[1, 2]",
            "{}",
            r#"{"a": {}, "b": {}}"#,
            r#"{"a": 5}"#,
            r#"{"a": [1]}"#,
        ] {
            let result = parse_change_request(text);
            assert!(
                matches!(result, Err(ServerError::MalformedMessage(_))),
                "accepted {text}"
            );
        }
    }
}
