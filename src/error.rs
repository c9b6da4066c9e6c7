use crate::event::EventError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to code driving the client.
///
/// Transport failures never show up here: outbound sends are fire-and-forget
/// and are only logged.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A response callback or await was requested for an event that does not
    /// ask for a response.
    #[error("response callback provided, but the event does not request a response")]
    ResponseNotRequested,

    /// A response callback or await was requested for an event without a
    /// response topic.
    #[error("response callback provided, but the event does not specify a response topic")]
    MissingResponseTopic,

    /// Another caller is already waiting on this response topic.
    #[error("a response on topic '{0}' is already being awaited")]
    WaitAlreadyPending(String),

    #[error("no response on topic '{0}' before the wait expired")]
    ResponseTimeout(String),

    #[error("timed out after {timeout:?} awaiting response on topic '{topic}'")]
    AwaitTimeout { topic: String, timeout: Duration },

    #[error("client is shut down")]
    Shutdown,

    #[error(transparent)]
    Event(#[from] EventError),
}
