// Broker-facing side: control event protocol and outbound transport

pub mod protocol;
mod publisher;

pub use publisher::{HttpPublisher, Publisher};
