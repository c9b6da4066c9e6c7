use super::*;
use serde_json::json;

#[test]
fn test_valid_event_exposes_topic_and_payload() {
    let payload = json!({"value": 23.5, "unit": "celsius"});
    let event = Event::new(EventHeader::new("/sensors/temperature"), payload.clone()).unwrap();

    assert_eq!(event.topic(), "/sensors/temperature");
    assert_eq!(&Value::Object(event.payload().clone()), &payload);
    assert!(!event.is_response_requested());
    assert_eq!(event.response_topic(), None);
    assert_eq!(event.source(), None);
}

#[test]
fn test_missing_topic_fails() {
    let result = Event::new(EventHeader::new(""), json!({"value": 1}));
    assert_eq!(result.unwrap_err(), EventError::MissingTopic);
}

#[test]
fn test_missing_payload_fails() {
    let result = Event::new(EventHeader::new("/a"), Value::Null);
    assert_eq!(result.unwrap_err(), EventError::MissingPayload);
}

#[test]
fn test_payload_not_object_fails() {
    let result = Event::new(EventHeader::new("/a"), json!("not an object"));
    assert_eq!(result.unwrap_err(), EventError::PayloadNotObject);
}

#[test]
fn test_response_request_requires_topic() {
    let header = EventHeader {
        topic: "/a".to_string(),
        respond_to: None,
        response_requested: true,
    };
    let result = Event::new(header, json!({}));
    assert_eq!(result.unwrap_err(), EventError::MissingResponseTopic);
}

#[test]
fn test_request_response_header() {
    let event = Event::new(
        EventHeader::new("/math/add").request_response("/math/add/reply"),
        json!({"a": 1, "b": 2}),
    )
    .unwrap();

    assert!(event.is_response_requested());
    assert_eq!(event.response_topic(), Some("/math/add/reply"));
}

#[test]
fn test_serializes_to_wire_envelope() {
    let event = Event::new(
        EventHeader::new("/math/add").request_response("/math/add/reply"),
        json!({"a": 1}),
    )
    .unwrap();

    let wire = serde_json::to_value(&event).unwrap();
    assert_eq!(
        wire,
        json!({
            "event": {
                "topic": "/math/add",
                "respond_to": "/math/add/reply",
                "response_requested": true
            },
            "payload": {"a": 1}
        })
    );
}

#[test]
fn test_plain_event_omits_respond_to() {
    let event = Event::new(EventHeader::new("/x"), json!({})).unwrap();
    let wire = serde_json::to_value(&event).unwrap();
    assert_eq!(
        wire,
        json!({"event": {"topic": "/x", "response_requested": false}, "payload": {}})
    );
}

#[test]
fn test_from_value_parses_wire_envelope() {
    let event = Event::from_value(json!({
        "event": {"topic": "/x", "respond_to": "/x/reply", "response_requested": true},
        "payload": {"k": "v"}
    }))
    .unwrap();

    assert_eq!(event.topic(), "/x");
    assert_eq!(event.response_topic(), Some("/x/reply"));
    assert!(event.is_response_requested());
    assert_eq!(event.payload().get("k"), Some(&json!("v")));
}

#[test]
fn test_from_value_defaults_response_requested() {
    let event = Event::try_from(json!({"event": {"topic": "/x"}, "payload": {}})).unwrap();
    assert!(!event.is_response_requested());
}

#[test]
fn test_from_value_missing_parts() {
    assert_eq!(
        Event::from_value(json!({"payload": {}})).unwrap_err(),
        EventError::MissingHeader
    );
    assert_eq!(
        Event::from_value(json!({"event": {"topic": "/x"}})).unwrap_err(),
        EventError::MissingPayload
    );
    assert_eq!(
        Event::from_value(json!({"event": {}, "payload": {}})).unwrap_err(),
        EventError::MissingTopic
    );
    assert_eq!(
        Event::from_value(json!({"event": {"topic": null}, "payload": {}})).unwrap_err(),
        EventError::MissingTopic
    );
}

#[test]
fn test_from_value_reports_missing_payload_before_topic() {
    let result = Event::from_value(json!({"event": {}}));
    assert_eq!(result.unwrap_err(), EventError::MissingPayload);
}

#[test]
fn test_from_value_rejects_wrong_types() {
    assert_eq!(
        Event::from_value(json!([1, 2, 3])).unwrap_err(),
        EventError::EnvelopeNotObject
    );
    match Event::from_value(json!({"event": {"topic": 42}, "payload": {}})).unwrap_err() {
        EventError::InvalidField { field, .. } => assert_eq!(field, "topic"),
        other => panic!("Expected InvalidField, got {:?}", other),
    }
    match Event::from_value(json!({"event": {"topic": "/x", "response_requested": "yes"}, "payload": {}}))
        .unwrap_err()
    {
        EventError::InvalidField { field, .. } => assert_eq!(field, "response_requested"),
        other => panic!("Expected InvalidField, got {:?}", other),
    }
}

#[test]
fn test_outgoing_event_destination() {
    let event = Event::new(EventHeader::new("/x"), json!({})).unwrap();

    let plain = OutgoingEvent::from(event.clone());
    assert_eq!(plain.destination(), None);

    let routed = OutgoingEvent::with_destination(event.clone(), "http://10.0.0.5:9000/event");
    assert_eq!(routed.destination(), Some("http://10.0.0.5:9000/event"));
    assert_eq!(routed.into_event(), event);
}
