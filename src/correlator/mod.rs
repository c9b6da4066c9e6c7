//! Response correlation: matches incoming events to callers waiting on a
//! response topic.
//!
//! Flow:
//! 1. Caller registers a wait on its response topic (before sending)
//! 2. Caller hands the request to the outgoing queue
//! 3. Inbound dispatcher calls `deliver()` for each incoming event
//! 4. Caller awaits the handle or times out
//!
//! Correlation is by topic, so at most one wait per response topic can be
//! outstanding. A second registration on a busy topic is rejected.

use crate::error::ClientError;
use crate::event::Event;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A registered wait inside the table
struct PendingWait {
    /// Distinguishes this registration from a later one on the same topic
    id: u64,
    /// Channel to hand the response to the waiter
    sender: oneshot::Sender<Event>,
}

/// Receiving side of a registered wait, consumed by `ResponseCorrelator::wait`.
#[derive(Debug)]
pub struct WaitHandle {
    topic: String,
    id: u64,
    receiver: oneshot::Receiver<Event>,
}

impl WaitHandle {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Table of response topics with an outstanding waiter.
#[derive(Default)]
pub struct ResponseCorrelator {
    pending: DashMap<String, PendingWait>,
    next_id: AtomicU64,
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a wait for `response_topic`.
    ///
    /// Fails with `WaitAlreadyPending` if another live wait holds the topic.
    /// An entry whose waiter has gone away is replaced.
    pub fn register_wait(&self, response_topic: &str) -> Result<WaitHandle, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        let wait = PendingWait { id, sender };

        match self.pending.entry(response_topic.to_string()) {
            Entry::Occupied(mut slot) => {
                if !slot.get().sender.is_closed() {
                    warn!(topic = %response_topic, "Response topic already has a pending wait");
                    return Err(ClientError::WaitAlreadyPending(response_topic.to_string()));
                }
                debug!(topic = %response_topic, "Replacing abandoned wait");
                slot.insert(wait);
            }
            Entry::Vacant(slot) => {
                slot.insert(wait);
            }
        }

        debug!(topic = %response_topic, wait_id = id, "Registered response wait");

        Ok(WaitHandle {
            topic: response_topic.to_string(),
            id,
            receiver,
        })
    }

    /// Hands `event` to the waiter registered on its topic.
    ///
    /// Returns true if a wait was registered for the topic (the entry is
    /// removed either way), false if nobody was waiting.
    pub fn deliver(&self, event: &Event) -> bool {
        let Some((topic, wait)) = self.pending.remove(event.topic()) else {
            return false;
        };

        if wait.sender.send(event.clone()).is_err() {
            warn!(
                topic = %topic,
                wait_id = wait.id,
                "Waiter gone before response arrived, dropping late response"
            );
        } else {
            debug!(topic = %topic, wait_id = wait.id, "Delivered response to waiter");
        }

        true
    }

    /// Waits up to `timeout` for the response registered by `handle`.
    ///
    /// On expiry the entry is removed and `ResponseTimeout` returned. If a
    /// delivery claimed the entry first, its event is returned instead, so an
    /// entry is resolved exactly once.
    pub async fn wait(&self, handle: WaitHandle, timeout: Duration) -> Result<Event, ClientError> {
        let WaitHandle {
            topic,
            id,
            mut receiver,
        } = handle;

        match tokio::time::timeout(timeout, &mut receiver).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) => {
                self.release(&topic, id);
                Err(ClientError::Shutdown)
            }
            Err(_) => {
                if self.release(&topic, id) {
                    warn!(
                        topic = %topic,
                        timeout_ms = timeout.as_millis() as u64,
                        "Canceled awaiting response, timeout reached"
                    );
                    return Err(ClientError::ResponseTimeout(topic));
                }

                // Delivery removed the entry first; take what it sent.
                receiver.close();
                receiver
                    .try_recv()
                    .map_err(|_| ClientError::ResponseTimeout(topic))
            }
        }
    }

    /// Withdraws a wait whose request never went out.
    pub fn abandon(&self, handle: WaitHandle) -> bool {
        self.release(&handle.topic, handle.id)
    }

    /// Drops every pending wait. Waiters observe `ClientError::Shutdown`.
    pub fn cancel_all(&self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        if count > 0 {
            debug!(count = count, "Cancelled pending response waits");
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, response_topic: &str) -> bool {
        self.pending.contains_key(response_topic)
    }

    /// Removes the entry for `topic` only if it still belongs to wait `id`.
    fn release(&self, topic: &str, id: u64) -> bool {
        self.pending
            .remove_if(topic, |_, wait| wait.id == id)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventHeader;
    use serde_json::json;
    use std::sync::Arc;

    fn event(topic: &str, value: i64) -> Event {
        Event::new(EventHeader::new(topic), json!({"value": value})).unwrap()
    }

    #[tokio::test]
    async fn test_delivery_before_timeout_returns_event() {
        let correlator = Arc::new(ResponseCorrelator::new());
        let handle = correlator.register_wait("/reply").unwrap();
        assert!(correlator.is_pending("/reply"));

        let response = event("/reply", 1);
        assert!(correlator.deliver(&response));
        assert!(!correlator.is_pending("/reply"));

        let received = correlator
            .wait(handle, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(received, response);
    }

    #[tokio::test]
    async fn test_delivery_while_waiting() {
        let correlator = Arc::new(ResponseCorrelator::new());
        let handle = correlator.register_wait("/reply").unwrap();

        let waiter = {
            let correlator = Arc::clone(&correlator);
            tokio::spawn(async move { correlator.wait(handle, Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(correlator.deliver(&event("/reply", 7)));

        let received = waiter.await.unwrap().unwrap();
        assert_eq!(received.payload().get("value"), Some(&json!(7)));
    }

    #[tokio::test]
    async fn test_second_delivery_not_routed_to_old_waiter() {
        let correlator = ResponseCorrelator::new();
        let handle = correlator.register_wait("/reply").unwrap();

        assert!(correlator.deliver(&event("/reply", 1)));
        assert!(!correlator.deliver(&event("/reply", 2)));

        let received = correlator
            .wait(handle, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(received.payload().get("value"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_timeout_removes_entry() {
        let correlator = ResponseCorrelator::new();
        let handle = correlator.register_wait("/reply").unwrap();

        let result = correlator.wait(handle, Duration::from_millis(50)).await;

        assert!(matches!(result, Err(ClientError::ResponseTimeout(ref t)) if t == "/reply"));
        assert!(!correlator.is_pending("/reply"));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_late_delivery_after_timeout_is_not_consumed() {
        let correlator = ResponseCorrelator::new();
        let handle = correlator.register_wait("/reply").unwrap();
        let _ = correlator.wait(handle, Duration::from_millis(20)).await;

        assert!(!correlator.deliver(&event("/reply", 1)));
    }

    #[test]
    fn test_concurrent_wait_on_same_topic_rejected() {
        let correlator = ResponseCorrelator::new();
        let _first = correlator.register_wait("/reply").unwrap();

        let second = correlator.register_wait("/reply");
        assert!(matches!(second, Err(ClientError::WaitAlreadyPending(ref t)) if t == "/reply"));
        assert_eq!(correlator.pending_count(), 1);
    }

    #[test]
    fn test_abandoned_wait_is_replaced() {
        let correlator = ResponseCorrelator::new();
        let first = correlator.register_wait("/reply").unwrap();
        drop(first);

        assert!(correlator.register_wait("/reply").is_ok());
        assert_eq!(correlator.pending_count(), 1);
    }

    #[test]
    fn test_distinct_topics_are_independent() {
        let correlator = ResponseCorrelator::new();
        let _a = correlator.register_wait("/a").unwrap();
        let _b = correlator.register_wait("/b").unwrap();

        assert_eq!(correlator.pending_count(), 2);
        assert!(correlator.deliver(&event("/b", 1)));
        assert!(correlator.is_pending("/a"));
    }

    #[test]
    fn test_abandon_removes_own_entry_only() {
        let correlator = ResponseCorrelator::new();
        let stale = correlator.register_wait("/reply").unwrap();
        let stale_id = stale.id;
        assert!(correlator.abandon(stale));
        assert!(!correlator.is_pending("/reply"));

        let _current = correlator.register_wait("/reply").unwrap();
        assert!(!correlator.release("/reply", stale_id));
        assert!(correlator.is_pending("/reply"));
    }

    #[tokio::test]
    async fn test_cancel_all_wakes_waiters() {
        let correlator = Arc::new(ResponseCorrelator::new());
        let handle = correlator.register_wait("/reply").unwrap();

        let waiter = {
            let correlator = Arc::clone(&correlator);
            tokio::spawn(async move { correlator.wait(handle, Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(correlator.cancel_all(), 1);

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(ClientError::Shutdown)));
    }
}
