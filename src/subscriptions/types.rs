//! Subscription types for snapshot change notifications.

use crate::types::{Snapshot, SnapshotId, Timestamp, Version};
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Only these namespaces (None = all).
    pub namespaces: Option<Vec<String>>,

    /// Include snapshot creation events.
    pub include_created: bool,

    /// Include deletion, eviction and clear events.
    pub include_removed: bool,

    /// Include bulk import events.
    pub include_imported: bool,
}

impl SubscriptionFilter {
    /// Every event from every namespace.
    pub fn all() -> Self {
        Self {
            namespaces: None,
            include_created: true,
            include_removed: true,
            include_imported: true,
        }
    }

    /// Every event from the given namespaces.
    pub fn namespaces(namespaces: Vec<String>) -> Self {
        Self {
            namespaces: Some(namespaces),
            ..Self::all()
        }
    }

    /// Only creation events.
    pub fn created() -> Self {
        Self {
            include_created: true,
            ..Default::default()
        }
    }

    /// Whether an event passes this filter. `Dropped` never does; it is
    /// sent directly to the affected subscriber.
    pub fn accepts(&self, event: &SnapshotEvent) -> bool {
        let kind = match event {
            SnapshotEvent::Created { .. } => self.include_created,
            SnapshotEvent::Deleted { .. }
            | SnapshotEvent::Evicted { .. }
            | SnapshotEvent::Cleared { .. } => self.include_removed,
            SnapshotEvent::Imported { .. } => self.include_imported,
            SnapshotEvent::Dropped { .. } => false,
        };

        kind && match (&self.namespaces, event.namespace()) {
            (Some(allowed), Some(ns)) => allowed.iter().any(|n| n == ns),
            _ => true,
        }
    }
}

/// Events emitted by subscriptions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotEvent {
    /// A snapshot was appended.
    Created {
        namespace: String,
        snapshot: SnapshotSummary,
    },

    /// A snapshot was deleted by id.
    Deleted { namespace: String, id: SnapshotId },

    /// The oldest snapshot was removed by the retention limit.
    Evicted { namespace: String, id: SnapshotId },

    /// All snapshots of the namespace were removed.
    Cleared { namespace: String },

    /// The history was replaced by an import.
    Imported { namespace: String, count: usize },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

impl SnapshotEvent {
    pub fn namespace(&self) -> Option<&str> {
        match self {
            SnapshotEvent::Created { namespace, .. }
            | SnapshotEvent::Deleted { namespace, .. }
            | SnapshotEvent::Evicted { namespace, .. }
            | SnapshotEvent::Cleared { namespace }
            | SnapshotEvent::Imported { namespace, .. } => Some(namespace),
            SnapshotEvent::Dropped { .. } => None,
        }
    }
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Summary of a snapshot (for events, avoids sending the full state).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub id: SnapshotId,
    pub timestamp: Timestamp,
    pub version: Version,
    pub auto: bool,
    pub field_count: usize,
}

impl SnapshotSummary {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            timestamp: snapshot.timestamp,
            version: snapshot.version.clone(),
            auto: snapshot
                .metadata
                .as_ref()
                .map_or(false, |m| m.is_auto()),
            field_count: snapshot.state.as_object().map_or(0, |o| o.len()),
        }
    }
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<SnapshotEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<SnapshotEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<SnapshotEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<SnapshotEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_accepts() {
        let imported = SnapshotEvent::Imported {
            namespace: "signup".to_string(),
            count: 3,
        };
        let dropped = SnapshotEvent::Dropped {
            reason: DropReason::Unsubscribed,
        };

        assert!(SubscriptionFilter::all().accepts(&imported));
        assert!(!SubscriptionFilter::all().accepts(&dropped));
        assert!(!SubscriptionFilter::created().accepts(&imported));
        assert!(!SubscriptionFilter::namespaces(vec!["checkout".to_string()]).accepts(&imported));
    }

    #[test]
    fn test_event_tagged_serialization() {
        let event = SnapshotEvent::Cleared {
            namespace: "signup".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "cleared", "namespace": "signup"})
        );
    }
}
