//! Fan-out of change events to per-subscriber delivery queues.
//!
//! [`BroadcastRouter`] is the [`ChangeListener`] registered on the
//! [`super::SharedState`]. It serializes each [`ChangeEvent`] once and
//! pushes the resulting message onto every live subscriber's bounded
//! [`tokio::sync::mpsc`] queue with `try_send`, so a mutation never waits
//! on a slow subscriber. A full queue drops the message for that
//! subscriber only.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::change_event::ChangeEvent;
use super::shared_state::ChangeListener;
use super::subscriber_id::SubscriberId;

/// A serialized change message, shared between all subscriber queues.
pub type OutboundMessage = Arc<str>;

/// Registry of live subscriber queues.
///
/// The subscriber set is a [`DashMap`], so sessions may register and
/// deregister while a fan-out is iterating it.
#[derive(Debug)]
pub struct BroadcastRouter {
    subscribers: DashMap<SubscriberId, mpsc::Sender<OutboundMessage>>,
    queue_capacity: usize,
    dropped: AtomicU64,
}

impl BroadcastRouter {
    /// Creates a router whose subscriber queues hold up to `queue_capacity`
    /// pending messages each (at least one).
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            queue_capacity: queue_capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Registers a new subscriber and returns its delivery queue.
    ///
    /// The subscriber stays registered until the returned [`Subscription`]
    /// is dropped or [`unsubscribe`](Self::unsubscribe) is called.
    #[must_use]
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = SubscriberId::new();
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        self.subscribers.insert(id, sender);
        tracing::debug!(subscriber = %id, total = self.subscribers.len(), "subscriber registered");
        Subscription {
            id,
            receiver,
            router: Arc::clone(self),
        }
    }

    /// Removes a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber = %id, total = self.subscribers.len(), "subscriber removed");
        }
        removed
    }

    /// Enqueues `message` on every subscriber queue without waiting.
    ///
    /// Returns the number of queues that accepted the message.
    pub fn publish(&self, message: OutboundMessage) -> usize {
        let mut delivered = 0;
        let mut stale = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(Arc::clone(&message)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(subscriber = %entry.key(), "delivery queue full, message dropped");
                }
                Err(TrySendError::Closed(_)) => stale.push(*entry.key()),
            }
        }

        // Removing while iterating would deadlock on the shard lock.
        for id in stale {
            self.unsubscribe(id);
        }
        delivered
    }

    /// Returns the current number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Returns how many messages were dropped because a queue was full.
    #[must_use]
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Deregisters every subscriber, closing all delivery queues.
    ///
    /// Each session's writer sees its queue end once it drains what is
    /// already buffered. Used on process shutdown.
    pub fn close_all(&self) {
        let count = self.subscribers.len();
        self.subscribers.clear();
        tracing::info!(subscribers = count, "all subscriber queues closed");
    }
}

impl ChangeListener for BroadcastRouter {
    fn on_change(&self, event: &ChangeEvent) {
        match event.to_message() {
            Ok(text) => {
                let delivered = self.publish(Arc::from(text));
                tracing::trace!(entity = %event.entity, delivered, "change broadcast");
            }
            Err(err) => {
                tracing::error!(entity = %event.entity, error = %err, "failed to encode change");
            }
        }
    }
}

/// A registered subscriber's end of the router: its id and delivery queue.
///
/// Dropping the subscription deregisters it from the router, on every exit
/// path of the owning session.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<OutboundMessage>,
    router: Arc<BroadcastRouter>,
}

impl Subscription {
    /// Returns the subscriber's identity.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next message. Returns `None` once the router has
    /// closed this queue and it is drained.
    pub async fn recv(&mut self) -> Option<OutboundMessage> {
        self.receiver.recv().await
    }

    /// Takes the next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<OutboundMessage> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.router.unsubscribe(self.id);
    }
}
