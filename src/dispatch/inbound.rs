use super::shutdown_signalled;
use crate::correlator::ResponseCorrelator;
use crate::error::ClientError;
use crate::event::Event;
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Application handler for incoming events that are not correlated responses.
///
/// Any `Fn(Event) + Send + Sync` closure is a handler.
///
/// # Example
/// ```no_run
/// use async_trait::async_trait;
/// use event_connector::dispatch::EventHandler;
/// use event_connector::Event;
///
/// struct Printer;
///
/// #[async_trait]
/// impl EventHandler for Printer {
///     async fn handle(&self, event: Event) {
///         println!("received {}", event.topic());
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event);
}

#[async_trait]
impl<F> EventHandler for F
where
    F: Fn(Event) + Send + Sync,
{
    async fn handle(&self, event: Event) {
        self(event)
    }
}

/// Single handler slot shared between the client and the dispatcher.
/// Last writer wins.
pub type SharedHandler = Arc<RwLock<Option<Arc<dyn EventHandler>>>>;

pub fn new_shared_handler() -> SharedHandler {
    Arc::new(RwLock::new(None))
}

/// Producer side of the incoming queue (many producers, one dispatcher).
#[derive(Clone)]
pub struct InboundQueue {
    tx: mpsc::UnboundedSender<Event>,
}

impl InboundQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueues an incoming event. Fails only once the dispatcher is gone.
    pub fn push(&self, event: Event) -> Result<(), ClientError> {
        let topic = event.topic().to_string();
        self.tx.send(event).map_err(|_| ClientError::Shutdown)?;
        info!(topic = %topic, "Put incoming event in queue");
        Ok(())
    }
}

/// Drains the incoming queue, routing each event to a waiting caller or to
/// the application handler.
pub struct InboundDispatcher {
    incoming: mpsc::UnboundedReceiver<Event>,
    correlator: Arc<ResponseCorrelator>,
    handler: SharedHandler,
    shutdown: watch::Receiver<bool>,
}

impl InboundDispatcher {
    pub fn new(
        incoming: mpsc::UnboundedReceiver<Event>,
        correlator: Arc<ResponseCorrelator>,
        handler: SharedHandler,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            incoming,
            correlator,
            handler,
            shutdown,
        }
    }

    /// Spawns the dispatch loop.
    ///
    /// The loop ends when shutdown is signalled or every producer is dropped.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!("Inbound dispatcher started");

        loop {
            tokio::select! {
                _ = shutdown_signalled(&mut self.shutdown) => break,
                next = self.incoming.recv() => match next {
                    Some(event) => self.dispatch(event).await,
                    None => break,
                },
            }
        }

        info!("Inbound dispatcher stopped");
    }

    /// Routes a single event.
    ///
    /// 1. No handler registered: discard
    /// 2. A caller waits on the topic: hand it over
    /// 3. Otherwise: invoke the handler (awaited, so order is preserved)
    pub async fn dispatch(&self, event: Event) {
        info!(topic = %event.topic(), "Processing incoming event");

        let Some(handler) = current_handler(&self.handler) else {
            warn!(
                topic = %event.topic(),
                "Received an event, but no event handler was registered. Discarding event"
            );
            return;
        };

        if self.correlator.deliver(&event) {
            debug!(topic = %event.topic(), "Event consumed by pending response wait");
            return;
        }

        handler.handle(event).await;
    }
}

fn current_handler(slot: &SharedHandler) -> Option<Arc<dyn EventHandler>> {
    slot.read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(Arc::clone)
}
