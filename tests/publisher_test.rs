// Integration tests for the HTTP publisher against a mock receiver

use event_connector::broker::{HttpPublisher, Publisher};
use event_connector::{Event, EventHeader};
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;

fn sample_event() -> Event {
    Event::new(
        EventHeader::new("/sensor/temp").request_response("/sensor/temp/reply"),
        json!({"celsius": 21}),
    )
    .unwrap()
}

#[tokio::test]
async fn test_publish_posts_wire_envelope() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/event")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "event": {
                "topic": "/sensor/temp",
                "respond_to": "/sensor/temp/reply",
                "response_requested": true
            },
            "payload": {"celsius": 21}
        })))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let publisher = HttpPublisher::new(Duration::from_secs(5)).unwrap();
    let result = publisher
        .publish(&format!("{}/event", server.url()), &sample_event())
        .await;

    assert!(result.is_ok(), "Expected Ok, got {:?}", result);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_publish_error_status_is_err() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/event")
        .with_status(500)
        .with_body(r#"{"msg":"boom"}"#)
        .create_async()
        .await;

    let publisher = HttpPublisher::new(Duration::from_secs(5)).unwrap();
    let result = publisher
        .publish(&format!("{}/event", server.url()), &sample_event())
        .await;

    let err = result.unwrap_err().to_string();
    assert!(err.contains("500"), "unexpected error: {}", err);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_publish_unreachable_is_err() {
    // Bind then drop to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let publisher = HttpPublisher::new(Duration::from_secs(2)).unwrap();
    let result = publisher
        .publish(&format!("http://127.0.0.1:{}/event", port), &sample_event())
        .await;

    assert!(result.is_err());
}
