//! Fan-out of snapshot events to bounded subscriber channels.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::types::{
    DropReason, SnapshotEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId,
};

struct Subscriber {
    filter: SubscriptionFilter,
    tx: Sender<SnapshotEvent>,
}

/// Broadcasts store events to subscribers.
///
/// A subscriber whose buffer is full when an event arrives is removed and
/// receives a final `Dropped` event if there is room for it.
pub struct SubscriptionManager {
    subscribers: Mutex<BTreeMap<SubscriptionId, Subscriber>>,
    next_id: AtomicU64,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber. Only events published afterwards are delivered.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, receiver) = bounded(config.buffer_size.max(1));

        self.subscribers.lock().insert(
            id,
            Subscriber {
                filter: config.filter,
                tx,
            },
        );

        SubscriptionHandle { id, receiver }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(subscriber) = self.subscribers.lock().remove(&id) {
            let _ = subscriber.tx.try_send(SnapshotEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Deliver `event` to every subscriber whose filter accepts it.
    pub fn publish(&self, event: SnapshotEvent) {
        self.subscribers.lock().retain(|id, subscriber| {
            if !subscriber.filter.accepts(&event) {
                return true;
            }
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Disconnected(_)) => {
                    debug!(subscription = id.0, "removing disconnected subscriber");
                    false
                }
                Err(TrySendError::Full(_)) => {
                    debug!(subscription = id.0, "dropping slow subscriber");
                    let _ = subscriber.tx.try_send(SnapshotEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                    false
                }
            }
        });
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
