//! Control events understood by the broker.

use crate::event::{Event, EventError, EventHeader};
use crate::module::ModuleDescriptor;
use serde_json::json;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Registers a module with the broker
pub const REGISTER_MODULE_TOPIC: &str = "/broker/register/module";

/// Adds topics to a module's subscription
pub const REGISTER_TOPIC_TOPIC: &str = "/broker/register/topic";

/// Removes topics from a module's subscription
pub const DEREGISTER_TOPIC_TOPIC: &str = "/broker/deregister/topic";

/// Topic list entry meaning "everything"
pub const WILDCARD_TOPIC: &str = "*";

/// Default path events are POSTed to, on both sides of the connection
pub const DEFAULT_EVENT_PATH: &str = "/event";

/// Builds the module registration event.
///
/// The topic list is the descriptor's topics, or `["*"]` when it has none.
/// Registration never requests a response; the `respond_to` topic is unique
/// per call so a broker reply cannot collide with anything else.
pub fn registration_event(descriptor: &ModuleDescriptor) -> Result<Event, EventError> {
    let mut topics: Vec<&str> = descriptor.topics().collect();
    if topics.is_empty() {
        topics.push(WILDCARD_TOPIC);
    }

    let header = EventHeader {
        topic: REGISTER_MODULE_TOPIC.to_string(),
        respond_to: Some(format!(
            "{}-ResponseEvent-for-{}",
            Uuid::new_v4(),
            REGISTER_MODULE_TOPIC
        )),
        response_requested: false,
    };

    Event::new(
        header,
        json!({
            "registration": {
                "name": descriptor.name,
                "description": descriptor.description,
                "version": descriptor.version,
                "type": descriptor.module_type,
                "eventHandler": descriptor.callback_address,
                "topics": topics,
            }
        }),
    )
}

/// Builds a subscribe/unsubscribe control event for `control_topic`.
pub fn topic_subscription_event(
    control_topic: &str,
    callback_address: &str,
    topics: &BTreeSet<String>,
) -> Result<Event, EventError> {
    Event::new(
        EventHeader::new(control_topic),
        json!({
            "eventHandler": callback_address,
            "topics": topics,
        }),
    )
}

/// URL events are POSTed to for a broker at `address`.
///
/// `address` is either `host:port` or a base URL with a scheme.
pub fn broker_event_url(address: &str, path: &str) -> String {
    if address.contains("://") {
        format!("{}{}", address.trim_end_matches('/'), path)
    } else {
        format!("http://{}{}", address.trim_end_matches('/'), path)
    }
}

/// Callback address advertised to the broker for a listener.
pub fn callback_address(host: &str, port: u16, path: &str) -> String {
    format!("http://{}:{}{}", host, port, path)
}
