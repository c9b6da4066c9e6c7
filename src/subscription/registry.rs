use crate::broker::protocol::{topic_subscription_event, DEREGISTER_TOPIC_TOPIC, REGISTER_TOPIC_TOPIC};
use crate::dispatch::OutboundQueue;
use crate::error::ClientError;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Issues subscribe/unsubscribe control events to the broker.
///
/// Holds no subscription state of its own: every call turns into exactly one
/// control event on the outgoing queue.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    /// Address the broker should push matching events to
    callback_address: String,
    outgoing: OutboundQueue,
}

impl SubscriptionRegistry {
    pub fn new(callback_address: String, outgoing: OutboundQueue) -> Self {
        Self {
            callback_address,
            outgoing,
        }
    }

    /// Asks the broker to start sending `topics` to this module.
    ///
    /// Returns false (and sends nothing) for an empty topic set.
    pub fn subscribe<I, S>(&self, topics: I) -> Result<bool, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.issue(REGISTER_TOPIC_TOPIC, topics)
    }

    /// Asks the broker to stop sending `topics` to this module.
    pub fn unsubscribe<I, S>(&self, topics: I) -> Result<bool, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.issue(DEREGISTER_TOPIC_TOPIC, topics)
    }

    fn issue<I, S>(&self, control_topic: &str, topics: I) -> Result<bool, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics: BTreeSet<String> = topics.into_iter().map(Into::into).collect();
        if topics.is_empty() {
            warn!(control_topic = %control_topic, "No topics given, nothing sent");
            return Ok(false);
        }

        let event = topic_subscription_event(control_topic, &self.callback_address, &topics)?;
        self.outgoing.push(event.into())?;

        info!(
            control_topic = %control_topic,
            topic_count = topics.len(),
            "Issued topic subscription change"
        );

        Ok(true)
    }
}
