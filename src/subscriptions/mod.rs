//! Change notifications for snapshot histories.
//!
//! Stores with an attached [`SubscriptionManager`] publish a
//! [`SnapshotEvent`] for every mutation. Notifications are advisory: they
//! tell other views of the same namespace to reload, they do not lock.
//!
//! Subscriptions support:
//! - Filtering by namespace and event kind
//! - Bounded buffers with slow-subscriber dropping
//!
//! # Example
//!
//! ```ignore
//! let manager = Arc::new(SubscriptionManager::new());
//! let store = SnapshotStore::new(MemoryStorage::new(), config)
//!     .with_subscriptions(Arc::clone(&manager));
//!
//! let handle = manager.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::namespaces(vec!["signup".to_string()]),
//!     ..Default::default()
//! });
//!
//! while let Ok(event) = handle.recv() {
//!     match event {
//!         SnapshotEvent::Created { snapshot, .. } => println!("new {}", snapshot.id),
//!         SnapshotEvent::Dropped { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    DropReason, SnapshotEvent, SnapshotSummary, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId,
};
