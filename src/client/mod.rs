//! Client facade: owns the queues, the correlation table and the background
//! tasks, and exposes connect/subscribe/send/await to the application.

use crate::api::{create_router, ListenerState};
use crate::broker::protocol::{callback_address, registration_event};
use crate::broker::{HttpPublisher, Publisher};
use crate::config::ClientConfig;
use crate::correlator::{ResponseCorrelator, WaitHandle};
use crate::dispatch::{
    new_broker_address, new_shared_handler, shutdown_signalled, EventHandler, InboundDispatcher,
    InboundQueue, OutboundQueue, OutboundSender, SharedBrokerAddress, SharedHandler,
};
use crate::error::ClientError;
use crate::event::{Event, OutgoingEvent};
use crate::module::ModuleDescriptor;
use crate::subscription::SubscriptionRegistry;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};


/// A running event-exchange client.
///
/// # Lifecycle
/// 1. `Client::start()` binds the listener and spawns the inbound dispatcher,
///    the outbound sender and the HTTP server
/// 2. The application sets a handler, connects to a broker, sends events
/// 3. `shutdown()` stops every task and fails all pending waits
///
/// Each client owns its own queues and tables, so several can run in one
/// process.
pub struct Client {
    config: ClientConfig,
    local_addr: SocketAddr,
    callback_address: String,
    outbound: OutboundQueue,
    correlator: Arc<ResponseCorrelator>,
    handler: SharedHandler,
    broker: SharedBrokerAddress,
    subscriptions: SubscriptionRegistry,
    shutdown_tx: watch::Sender<bool>,
    /// Dispatcher and sender loops
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    /// HTTP server task
    server_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Starts a client that sends events over HTTP.
    pub async fn start(config: ClientConfig) -> Result<Self> {
        let publisher = HttpPublisher::new(config.broker.send_timeout())?;
        Self::start_with_publisher(config, Arc::new(publisher)).await
    }

    /// Starts a client sending through `publisher`.
    pub async fn start_with_publisher(
        config: ClientConfig,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self> {
        config.validate().context("Invalid client configuration")?;

        let bind_addr = format!("{}:{}", config.listener.host, config.listener.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("Failed to bind event listener on {}", bind_addr))?;
        let local_addr = listener
            .local_addr()
            .context("Failed to read listener address")?;

        let callback_address = callback_address(
            config.listener.advertised_host(),
            local_addr.port(),
            &config.listener.path,
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (inbound, incoming_rx) = InboundQueue::new();
        let (outbound, outgoing_rx) = OutboundQueue::new();
        let correlator = Arc::new(ResponseCorrelator::new());
        let handler = new_shared_handler();
        let broker = new_broker_address();

        let dispatcher = InboundDispatcher::new(
            incoming_rx,
            Arc::clone(&correlator),
            Arc::clone(&handler),
            shutdown_rx.clone(),
        );
        let sender = OutboundSender::new(
            outgoing_rx,
            publisher,
            Arc::clone(&broker),
            config.broker.path.clone(),
            shutdown_rx.clone(),
        );
        let worker_handles = vec![dispatcher.start(), sender.start()];

        let router = create_router(
            ListenerState {
                incoming: inbound,
                max_body_bytes: config.listener.max_body_bytes,
            },
            &config.listener.path,
        );
        let mut server_shutdown = shutdown_rx;
        let server_handle = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { shutdown_signalled(&mut server_shutdown).await })
            .await;

            if let Err(e) = result {
                error!(error = %e, "Event listener error");
            }
        });

        info!(
            address = %local_addr,
            callback = %callback_address,
            "Event listener started"
        );

        let subscriptions = SubscriptionRegistry::new(callback_address.clone(), outbound.clone());

        Ok(Self {
            config,
            local_addr,
            callback_address,
            outbound,
            correlator,
            handler,
            broker,
            subscriptions,
            shutdown_tx,
            worker_handles: Mutex::new(worker_handles),
            server_handle: Mutex::new(Some(server_handle)),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL the broker should push events to.
    pub fn callback_address(&self) -> &str {
        &self.callback_address
    }

    /// Number of response waits currently outstanding.
    pub fn pending_responses(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Registers the handler for incoming events, replacing any previous one.
    pub fn set_event_handler<H>(&self, handler: H)
    where
        H: EventHandler + 'static,
    {
        let handler: Arc<dyn EventHandler> = Arc::new(handler);
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Descriptor built from configuration and this client's callback address.
    pub fn module_descriptor(&self) -> ModuleDescriptor {
        let module = &self.config.module;
        let mut descriptor = ModuleDescriptor::new(
            module.name.clone(),
            module.description.clone(),
            module.version.clone(),
            module.module_type,
            self.callback_address.clone(),
        );
        for topic in &module.topics {
            descriptor.add_topic(topic.clone());
        }
        descriptor
    }

    /// Connects to the broker at `address` (`host:port` or base URL) and
    /// queues the registration event for `descriptor`.
    pub fn connect_broker(
        &self,
        address: &str,
        descriptor: &ModuleDescriptor,
    ) -> Result<(), ClientError> {
        *self.broker.write().unwrap_or_else(PoisonError::into_inner) = Some(address.to_string());
        info!(broker = %address, module = %descriptor, "Connecting to broker");

        let event = registration_event(descriptor)?;
        self.outbound.push(event.into())
    }

    /// Queues `event` for the broker. Never blocks.
    pub fn send_event(&self, event: Event) -> Result<(), ClientError> {
        self.outbound.push(event.into())
    }

    /// Queues `event` for `destination` instead of the broker.
    pub fn send_event_to(
        &self,
        event: Event,
        destination: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.outbound
            .push(OutgoingEvent::with_destination(event, destination))
    }

    /// Queues `event` and invokes `callback(response, context)` when its
    /// response arrives.
    ///
    /// The event must request a response and name a response topic; otherwise
    /// nothing is sent. The wait runs in the background for the configured
    /// callback budget. On expiry the callback is never invoked.
    pub fn send_event_with_callback<C, F>(
        &self,
        event: Event,
        callback: F,
        context: C,
    ) -> Result<(), ClientError>
    where
        F: FnOnce(Event, C) + Send + 'static,
        C: Send + 'static,
    {
        let handle = self.prepare_correlated_send(event)?;
        let correlator = Arc::clone(&self.correlator);
        let budget = self.config.broker.callback_timeout();

        tokio::spawn(async move {
            let topic = handle.topic().to_string();
            match correlator.wait(handle, budget).await {
                Ok(response) => callback(response, context),
                Err(e) => error!(
                    topic = %topic,
                    error = %e,
                    "Canceled awaiting response event"
                ),
            }
        });

        Ok(())
    }

    /// Queues `event` and waits up to `timeout` for its response.
    pub async fn send_event_and_await_response(
        &self,
        event: Event,
        timeout: Duration,
    ) -> Result<Event, ClientError> {
        let handle = self.prepare_correlated_send(event)?;

        match self.correlator.wait(handle, timeout).await {
            Err(ClientError::ResponseTimeout(topic)) => {
                Err(ClientError::AwaitTimeout { topic, timeout })
            }
            other => other,
        }
    }

    /// Asks the broker to send `topics` to this client.
    pub fn subscribe<I, S>(&self, topics: I) -> Result<bool, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscriptions.subscribe(topics)
    }

    /// Asks the broker to stop sending `topics` to this client.
    pub fn unsubscribe<I, S>(&self, topics: I) -> Result<bool, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscriptions.unsubscribe(topics)
    }

    /// Waits until the HTTP listener stops (after `shutdown()` or a server
    /// error).
    pub async fn run_until_shutdown(&self) {
        let handle = self
            .server_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Event listener task failed");
            }
        }
    }

    /// Stops the listener and background loops and fails every pending wait
    /// with `ClientError::Shutdown`. Events still queued are dropped.
    pub async fn shutdown(&self) {
        info!("Shutting down event client");

        self.shutdown_tx.send_replace(true);
        let cancelled = self.correlator.cancel_all();

        let mut handles: Vec<JoinHandle<()>> = self
            .worker_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        if let Some(server) = self
            .server_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handles.push(server);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Background task failed during shutdown");
            }
        }

        info!(cancelled_waits = cancelled, "Event client stopped");
    }

    /// Validates a correlated send, registers its wait, then queues it.
    ///
    /// Registration happens before queueing so a fast response cannot arrive
    /// ahead of its waiter.
    fn prepare_correlated_send(&self, event: Event) -> Result<WaitHandle, ClientError> {
        if !event.is_response_requested() {
            return Err(ClientError::ResponseNotRequested);
        }
        let response_topic = event
            .response_topic()
            .ok_or(ClientError::MissingResponseTopic)?
            .to_string();

        let handle = self.correlator.register_wait(&response_topic)?;
        if let Err(e) = self.outbound.push(event.into()) {
            self.correlator.abandon(handle);
            return Err(e);
        }

        Ok(handle)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);

        let workers = self
            .worker_handles
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for handle in workers.drain(..) {
            handle.abort();
        }
        if let Some(server) = self
            .server_handle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            server.abort();
        }
    }
}
