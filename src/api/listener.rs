use crate::dispatch::InboundQueue;
use crate::event::{Event, EventError};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared listener state
#[derive(Clone)]
pub struct ListenerState {
    pub incoming: InboundQueue,
    pub max_body_bytes: usize,
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    msg: String,
}

/// Create router accepting events on `path`. Every other path answers 404.
///
/// `path` must be a literal absolute path (see `ClientConfig::validate`).
pub fn create_router(state: ListenerState, path: &str) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    Router::new()
        .route(path, post(receive_event))
        .fallback(not_found)
        .layer(body_limit)
        .with_state(Arc::new(state))
}

/// POST {path} - Accept one event envelope
async fn receive_event(
    State(state): State<Arc<ListenerState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, ListenerError> {
    let body = body.map_err(ListenerError::from)?;
    if body.len() > state.max_body_bytes {
        return Err(ListenerError::PayloadTooLarge);
    }

    let value: Value = serde_json::from_slice(&body).map_err(|_| ListenerError::InvalidJson)?;

    let mut event = Event::from_value(value).map_err(ListenerError::from)?;
    if let Some(ConnectInfo(addr)) = peer {
        event = event.with_source(addr);
    }

    debug!(topic = %event.topic(), source = ?event.source(), "Accepted event");

    state.incoming.push(event).map_err(|_| ListenerError::Unavailable)?;

    Ok(Json(json!({})))
}

async fn not_found() -> ListenerError {
    ListenerError::NotFound
}

/// Listener error types
#[derive(Debug)]
enum ListenerError {
    InvalidJson,
    MissingEventOrPayload,
    MissingTopic,
    Invalid(String),
    PayloadTooLarge,
    NotFound,
    Unavailable,
}

impl From<EventError> for ListenerError {
    fn from(e: EventError) -> Self {
        match e {
            EventError::MissingHeader | EventError::MissingPayload => {
                ListenerError::MissingEventOrPayload
            }
            EventError::MissingTopic => ListenerError::MissingTopic,
            other => ListenerError::Invalid(other.to_string()),
        }
    }
}

impl From<BytesRejection> for ListenerError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ListenerError::PayloadTooLarge
        } else {
            ListenerError::Invalid(rejection.body_text())
        }
    }
}

impl IntoResponse for ListenerError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ListenerError::InvalidJson => (StatusCode::BAD_REQUEST, "Invalid JSON".to_string()),
            ListenerError::MissingEventOrPayload => (
                StatusCode::BAD_REQUEST,
                "Missing event or payload".to_string(),
            ),
            ListenerError::MissingTopic => (StatusCode::BAD_REQUEST, "Missing topic".to_string()),
            ListenerError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg),
            ListenerError::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large".to_string())
            }
            ListenerError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            ListenerError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Unavailable".to_string(),
            ),
        };

        if status != StatusCode::NOT_FOUND {
            warn!(status = %status, msg = %msg, "Rejected incoming event");
        }

        (status, Json(ErrorResponse { msg })).into_response()
    }
}
