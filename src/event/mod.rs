use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::SocketAddr;

mod validation;
#[cfg(test)]
mod tests;

pub use validation::EventError;

/// Routing header of an event (the `"event"` object on the wire).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHeader {
    /// Routing key (e.g. "/sensors/temperature")
    pub topic: String,

    /// Topic the sender wants a correlated reply on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respond_to: Option<String>,

    #[serde(default)]
    pub response_requested: bool,
}

impl EventHeader {
    /// Header for a plain fire-and-forget event.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            respond_to: None,
            response_requested: false,
        }
    }

    /// Ask for a correlated reply on `response_topic`.
    pub fn request_response(mut self, response_topic: impl Into<String>) -> Self {
        self.respond_to = Some(response_topic.into());
        self.response_requested = true;
        self
    }
}

/// Event represents an immutable envelope exchanged with the broker.
///
/// Serializes to the wire format:
/// `{"event": {"topic": ..., "respond_to": ..., "response_requested": ...}, "payload": {...}}`
///
/// An Event can only be obtained through validated construction, so every
/// value in circulation has a non-empty topic and an object payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    #[serde(rename = "event")]
    header: EventHeader,

    /// Domain-specific data (opaque to the connector)
    payload: Map<String, Value>,

    /// Peer that delivered the event to the listener (never serialized)
    #[serde(skip)]
    source: Option<SocketAddr>,
}

impl Event {
    /// Builds an event from a header and a payload.
    ///
    /// Fails if the topic is empty, the payload is missing or not an object,
    /// or a response is requested without a response topic.
    pub fn new(header: EventHeader, payload: Value) -> Result<Self, EventError> {
        validation::validate_header(&header)?;
        let payload = validation::payload_object(payload)?;

        Ok(Self {
            header,
            payload,
            source: None,
        })
    }

    /// Builds an event from a raw wire envelope.
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        validation::parse_envelope(value)
    }

    pub(crate) fn with_source(mut self, source: SocketAddr) -> Self {
        self.source = Some(source);
        self
    }

    pub fn header(&self) -> &EventHeader {
        &self.header
    }

    pub fn topic(&self) -> &str {
        &self.header.topic
    }

    pub fn response_topic(&self) -> Option<&str> {
        self.header.respond_to.as_deref()
    }

    pub fn is_response_requested(&self) -> bool {
        self.header.response_requested
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Remote address the event arrived from, if it came through the listener.
    pub fn source(&self) -> Option<SocketAddr> {
        self.source
    }
}

impl TryFrom<Value> for Event {
    type Error = EventError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Event::from_value(value)
    }
}

/// An event queued for sending, optionally addressed to a specific destination
/// instead of the connected broker.
#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingEvent {
    event: Event,
    destination: Option<String>,
}

impl OutgoingEvent {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            destination: None,
        }
    }

    /// Send to `destination` (a full URL) instead of the broker.
    pub fn with_destination(event: Event, destination: impl Into<String>) -> Self {
        Self {
            event,
            destination: Some(destination.into()),
        }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn into_event(self) -> Event {
        self.event
    }
}

impl From<Event> for OutgoingEvent {
    fn from(event: Event) -> Self {
        OutgoingEvent::new(event)
    }
}
