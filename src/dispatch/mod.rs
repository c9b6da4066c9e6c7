// Queue processors: inbound routing and outbound forwarding

mod inbound;
mod outbound;

pub use inbound::{new_shared_handler, EventHandler, InboundDispatcher, InboundQueue, SharedHandler};
pub use outbound::{new_broker_address, OutboundQueue, OutboundSender, SharedBrokerAddress};

use tokio::sync::watch;

/// Resolves once `true` is published on the shutdown channel, or the sender
/// is dropped.
pub(crate) async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
