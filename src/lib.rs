// Event model and validation
pub mod event;

// Module identity presented to the broker
pub mod module;

// Client error type
pub mod error;

// Configuration
pub mod config;

// Response correlation
pub mod correlator;

// Incoming and outgoing queues and their worker loops
pub mod dispatch;

// Broker control protocol and outbound HTTP
pub mod broker;

// Topic subscriptions
pub mod subscription;

// Inbound HTTP listener
pub mod api;

// Client facade
pub mod client;

pub use client::Client;
pub use dispatch::EventHandler;
pub use error::ClientError;
pub use event::{Event, EventError, EventHeader, OutgoingEvent};
pub use module::{ModuleDescriptor, ModuleType};
