use super::{Event, EventHeader};
use serde_json::{Map, Value};
use thiserror::Error;

/// Validation errors for Event construction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("event envelope must be a JSON object")]
    EnvelopeNotObject,
    #[error("event header is required")]
    MissingHeader,
    #[error("topic is required")]
    MissingTopic,
    #[error("payload is required")]
    MissingPayload,
    #[error("payload must be a JSON object")]
    PayloadNotObject,
    #[error("response requested but no response topic given")]
    MissingResponseTopic,
    #[error("field '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// Validates header invariants.
///
/// Rules:
/// - Topic: required, non-empty
/// - Response topic: required (and non-empty) when a response is requested
pub(super) fn validate_header(header: &EventHeader) -> Result<(), EventError> {
    if header.topic.is_empty() {
        return Err(EventError::MissingTopic);
    }

    if header.response_requested
        && header.respond_to.as_ref().map_or(true, |t| t.is_empty())
    {
        return Err(EventError::MissingResponseTopic);
    }

    Ok(())
}

/// Unwraps the payload into a JSON object.
pub(super) fn payload_object(payload: Value) -> Result<Map<String, Value>, EventError> {
    match payload {
        Value::Object(map) => Ok(map),
        Value::Null => Err(EventError::MissingPayload),
        _ => Err(EventError::PayloadNotObject),
    }
}

/// Parses a raw wire envelope into an Event.
///
/// Presence of the header and payload is checked before anything inside the
/// header, so a body lacking both reports the missing envelope part first.
/// JSON `null` counts as absent.
pub(super) fn parse_envelope(value: Value) -> Result<Event, EventError> {
    let mut envelope = match value {
        Value::Object(map) => map,
        _ => return Err(EventError::EnvelopeNotObject),
    };

    let header = non_null(envelope.remove("event")).ok_or(EventError::MissingHeader)?;
    let payload = non_null(envelope.remove("payload")).ok_or(EventError::MissingPayload)?;

    let header = match header {
        Value::Object(map) => map,
        _ => {
            return Err(EventError::InvalidField {
                field: "event",
                expected: "an object",
            })
        }
    };

    let topic = match non_null(header.get("topic").cloned()) {
        None => return Err(EventError::MissingTopic),
        Some(Value::String(topic)) => topic,
        Some(_) => {
            return Err(EventError::InvalidField {
                field: "topic",
                expected: "a string",
            })
        }
    };

    let respond_to = match non_null(header.get("respond_to").cloned()) {
        None => None,
        Some(Value::String(topic)) => Some(topic),
        Some(_) => {
            return Err(EventError::InvalidField {
                field: "respond_to",
                expected: "a string",
            })
        }
    };

    let response_requested = match non_null(header.get("response_requested").cloned()) {
        None => false,
        Some(Value::Bool(flag)) => flag,
        Some(_) => {
            return Err(EventError::InvalidField {
                field: "response_requested",
                expected: "a boolean",
            })
        }
    };

    Event::new(
        EventHeader {
            topic,
            respond_to,
            response_requested,
        },
        payload,
    )
}

fn non_null(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

#[cfg(test)]
mod validation_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_topic_rejected() {
        assert_eq!(
            validate_header(&EventHeader::new("")),
            Err(EventError::MissingTopic)
        );
    }

    #[test]
    fn test_received_request_without_response_topic_rejected() {
        let result = parse_envelope(json!({
            "event": {"topic": "/x", "response_requested": true},
            "payload": {}
        }));

        assert_eq!(result.unwrap_err(), EventError::MissingResponseTopic);
    }

    #[test]
    fn test_empty_response_topic_rejected() {
        let header = EventHeader::new("/a").request_response("");
        assert_eq!(
            validate_header(&header),
            Err(EventError::MissingResponseTopic)
        );
    }

    #[test]
    fn test_respond_to_without_request_is_allowed() {
        let header = EventHeader {
            topic: "/a".to_string(),
            respond_to: Some("/a/reply".to_string()),
            response_requested: false,
        };
        assert!(validate_header(&header).is_ok());
    }

    #[test]
    fn test_payload_shapes() {
        assert!(payload_object(json!({})).is_ok());
        assert_eq!(payload_object(Value::Null), Err(EventError::MissingPayload));
        assert_eq!(payload_object(json!([1, 2])), Err(EventError::PayloadNotObject));
        assert_eq!(payload_object(json!("text")), Err(EventError::PayloadNotObject));
    }
}
