use super::shutdown_signalled;
use crate::broker::protocol::broker_event_url;
use crate::broker::Publisher;
use crate::error::ClientError;
use crate::event::OutgoingEvent;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Broker address set by `connect_broker` and read for every send.
pub type SharedBrokerAddress = Arc<RwLock<Option<String>>>;

pub fn new_broker_address() -> SharedBrokerAddress {
    Arc::new(RwLock::new(None))
}

/// Producer side of the outgoing queue (many producers, one sender).
#[derive(Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<OutgoingEvent>,
}

impl OutboundQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutgoingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueues an event for sending. Never blocks; fails only once the
    /// sender is gone.
    pub fn push(&self, event: OutgoingEvent) -> Result<(), ClientError> {
        let topic = event.event().topic().to_string();
        self.tx.send(event).map_err(|_| ClientError::Shutdown)?;
        info!(topic = %topic, "Put event in outgoing queue");
        Ok(())
    }
}

/// Drains the outgoing queue and POSTs each event.
///
/// Delivery is best effort: a failed send is logged and the event dropped.
/// There is no retry and no dead-letter queue.
pub struct OutboundSender {
    outgoing: mpsc::UnboundedReceiver<OutgoingEvent>,
    publisher: Arc<dyn Publisher>,
    broker: SharedBrokerAddress,
    event_path: String,
    shutdown: watch::Receiver<bool>,
}

impl OutboundSender {
    pub fn new(
        outgoing: mpsc::UnboundedReceiver<OutgoingEvent>,
        publisher: Arc<dyn Publisher>,
        broker: SharedBrokerAddress,
        event_path: String,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            outgoing,
            publisher,
            broker,
            event_path,
            shutdown,
        }
    }

    /// Spawns the send loop.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!("Outbound sender started");

        loop {
            tokio::select! {
                _ = shutdown_signalled(&mut self.shutdown) => break,
                next = self.outgoing.recv() => match next {
                    Some(event) => self.forward(event).await,
                    None => break,
                },
            }
        }

        info!("Outbound sender stopped");
    }

    /// Sends one event to its destination, or to the broker if it has none.
    pub async fn forward(&self, outgoing: OutgoingEvent) {
        let topic = outgoing.event().topic();

        let url = match outgoing.destination() {
            Some(destination) => destination.to_string(),
            None => match self.broker_url() {
                Some(url) => url,
                None => {
                    error!(
                        topic = %topic,
                        "No broker connected and no destination given, dropping event"
                    );
                    return;
                }
            },
        };

        match self.publisher.publish(&url, outgoing.event()).await {
            Ok(()) => info!(topic = %topic, url = %url, "Forwarded event from outgoing queue"),
            Err(e) => error!(topic = %topic, url = %url, error = %e, "Error forwarding event"),
        }
    }

    fn broker_url(&self) -> Option<String> {
        self.broker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            .map(|address| broker_event_url(address, &self.event_path))
    }
}
