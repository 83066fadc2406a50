//! Snapshot store: the persisted history of one form namespace.

use crate::diff::shallow_changes;
use crate::error::{Result, SnapshotError};
use crate::storage::{KvStorage, PayloadEncoding};
use crate::subscriptions::{SnapshotEvent, SnapshotSummary, SubscriptionManager};
use crate::types::{FormConfig, Snapshot, SnapshotId, SnapshotMetadata, Timestamp, Version};
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Form identity; scopes the storage key.
    pub namespace: String,

    /// Prefix of the storage key (`"{key_prefix}:{namespace}"`).
    pub key_prefix: String,

    /// Retention limit applied when `auto_cleanup` is on.
    pub max_snapshots: usize,

    /// Evict the oldest snapshots once the limit is exceeded.
    pub auto_cleanup: bool,

    /// Encoding of the persisted snapshot list.
    pub encoding: PayloadEncoding,

    /// Schema version stamped on new snapshots.
    pub schema_version: Version,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            key_prefix: "form_snapshots".to_string(),
            max_snapshots: 50,
            auto_cleanup: true,
            encoding: PayloadEncoding::Json,
            schema_version: Version::default(),
        }
    }
}

impl StoreConfig {
    pub fn for_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }
}

/// The snapshot store.
///
/// Read paths and the plain mutation methods never return storage errors:
/// failures are logged and the call degrades to an empty result. The
/// `try_*` methods expose the underlying error instead.
pub struct SnapshotStore<S: KvStorage> {
    config: StoreConfig,

    storage: S,

    /// Optional change notifications.
    subscriptions: Option<Arc<SubscriptionManager>>,

    /// Mixed into generated ids.
    id_counter: AtomicU64,

    /// Lock for read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl<S: KvStorage> SnapshotStore<S> {
    pub fn new(storage: S, config: StoreConfig) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::from(d.subsec_nanos()))
            .unwrap_or_default();

        Self {
            config,
            storage,
            subscriptions: None,
            id_counter: AtomicU64::new(seed),
            write_lock: Mutex::new(()),
        }
    }

    /// Publish change events through `manager`.
    pub fn with_subscriptions(mut self, manager: Arc<SubscriptionManager>) -> Self {
        self.subscriptions = Some(manager);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Key of this namespace's record in the backing storage.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.config.key_prefix, self.config.namespace)
    }

    // --- Snapshot Operations ---

    /// Capture `state` as a new snapshot.
    ///
    /// Returns `None` if the history could not be written; the failure is logged.
    pub fn create_snapshot(
        &self,
        state: Value,
        metadata: Option<SnapshotMetadata>,
    ) -> Option<Snapshot> {
        match self.try_create_snapshot(state, metadata) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(namespace = %self.config.namespace, error = %e, "failed to create snapshot");
                None
            }
        }
    }

    /// Capture `state` as a new snapshot, surfacing storage errors.
    ///
    /// A corrupt stored history is replaced rather than reported.
    pub fn try_create_snapshot(
        &self,
        state: Value,
        metadata: Option<SnapshotMetadata>,
    ) -> Result<Snapshot> {
        let _lock = self.write_lock.lock();

        let mut snapshots = self.load_for_write()?;

        // Never earlier than the newest stored snapshot.
        let now = Timestamp::now();
        let timestamp = snapshots
            .last()
            .map_or(now, |last| last.timestamp.max(now));

        let snapshot = Snapshot {
            id: self.generate_id(timestamp, &snapshots),
            timestamp,
            state,
            version: self.config.schema_version.clone(),
            metadata,
        };
        snapshots.push(snapshot.clone());

        let evicted = self.apply_retention(&mut snapshots);
        self.persist(&snapshots)?;

        debug!(
            namespace = %self.config.namespace,
            snapshot_id = %snapshot.id,
            total = snapshots.len(),
            "snapshot created"
        );

        for id in evicted {
            self.publish(SnapshotEvent::Evicted {
                namespace: self.config.namespace.clone(),
                id,
            });
        }
        self.publish(SnapshotEvent::Created {
            namespace: self.config.namespace.clone(),
            snapshot: SnapshotSummary::from_snapshot(&snapshot),
        });

        Ok(snapshot)
    }

    /// Create a snapshot only if a field marked important changed.
    ///
    /// The snapshot's metadata records `auto: true` and every changed field.
    pub fn create_auto_snapshot(
        &self,
        config: &FormConfig,
        current: &Value,
        prev: &Value,
    ) -> Option<Snapshot> {
        let important_changed = config.important_fields().any(|field| {
            let before = prev.get(field).unwrap_or(&Value::Null);
            let after = current.get(field).unwrap_or(&Value::Null);
            before != after
        });

        if !important_changed {
            return None;
        }

        let changes = shallow_changes(prev, current, None);
        self.create_snapshot(current.clone(), Some(SnapshotMetadata::auto(changes)))
    }

    /// Get a snapshot by id.
    pub fn get_snapshot(&self, id: &SnapshotId) -> Option<Snapshot> {
        self.get_all_snapshots().into_iter().find(|s| &s.id == id)
    }

    /// All snapshots in stored order. Empty if the history is unreadable.
    pub fn get_all_snapshots(&self) -> Vec<Snapshot> {
        match self.try_get_all_snapshots() {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(namespace = %self.config.namespace, error = %e, "failed to read snapshots");
                Vec::new()
            }
        }
    }

    /// All snapshots in stored order, surfacing storage and decoding errors.
    pub fn try_get_all_snapshots(&self) -> Result<Vec<Snapshot>> {
        match self.storage.get(&self.storage_key())? {
            Some(payload) => self.config.encoding.decode(&payload),
            None => Ok(Vec::new()),
        }
    }

    /// The most recently appended snapshot.
    pub fn latest_snapshot(&self) -> Option<Snapshot> {
        self.get_all_snapshots().pop()
    }

    pub fn snapshot_count(&self) -> usize {
        self.get_all_snapshots().len()
    }

    /// State captured by a snapshot.
    pub fn restore_snapshot(&self, id: &SnapshotId) -> Option<Value> {
        self.get_snapshot(id).map(|s| s.state)
    }

    /// State captured by a snapshot, surfacing read errors and missing ids.
    pub fn try_restore_snapshot(&self, id: &SnapshotId) -> Result<Value> {
        self.try_get_all_snapshots()?
            .into_iter()
            .find(|s| &s.id == id)
            .map(|s| s.state)
            .ok_or_else(|| SnapshotError::SnapshotNotFound(id.to_string()))
    }

    /// Delete a snapshot. Returns false if it does not exist or the history
    /// could not be rewritten.
    pub fn delete_snapshot(&self, id: &SnapshotId) -> bool {
        let _lock = self.write_lock.lock();

        let mut snapshots = match self.try_get_all_snapshots() {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(namespace = %self.config.namespace, error = %e, "failed to read snapshots");
                return false;
            }
        };

        let Some(index) = snapshots.iter().position(|s| &s.id == id) else {
            return false;
        };
        snapshots.remove(index);

        if let Err(e) = self.persist(&snapshots) {
            warn!(namespace = %self.config.namespace, snapshot_id = %id, error = %e, "failed to delete snapshot");
            return false;
        }

        self.publish(SnapshotEvent::Deleted {
            namespace: self.config.namespace.clone(),
            id: id.clone(),
        });
        true
    }

    /// Remove every snapshot of this namespace.
    pub fn clear_snapshots(&self) {
        let _lock = self.write_lock.lock();

        if let Err(e) = self.storage.remove(&self.storage_key()) {
            warn!(namespace = %self.config.namespace, error = %e, "failed to clear snapshots");
            return;
        }

        self.publish(SnapshotEvent::Cleared {
            namespace: self.config.namespace.clone(),
        });
    }

    // --- Import / Export ---

    /// The whole history as a pretty-printed JSON array.
    pub fn export_snapshots(&self) -> Result<String> {
        let snapshots = self.try_get_all_snapshots()?;
        Ok(serde_json::to_string_pretty(&snapshots)?)
    }

    /// Replace the history with snapshots from a JSON array.
    ///
    /// Duplicate ids are rejected. With auto-cleanup on, only the newest
    /// `max_snapshots` entries are kept. Returns the number stored.
    pub fn import_snapshots(&self, json: &str) -> Result<usize> {
        let mut snapshots: Vec<Snapshot> = serde_json::from_str(json)
            .map_err(|e| SnapshotError::Deserialization(e.to_string()))?;

        let mut seen = HashSet::new();
        for snapshot in &snapshots {
            if !seen.insert(&snapshot.id) {
                return Err(SnapshotError::InvalidOperation(format!(
                    "Duplicate snapshot id in import: {}",
                    snapshot.id
                )));
            }
        }

        let _lock = self.write_lock.lock();

        self.apply_retention(&mut snapshots);
        self.persist(&snapshots)?;

        let count = snapshots.len();
        debug!(namespace = %self.config.namespace, count, "snapshots imported");
        self.publish(SnapshotEvent::Imported {
            namespace: self.config.namespace.clone(),
            count,
        });

        Ok(count)
    }

    // --- Internal Helpers ---

    /// Load the history before rewriting it. Unreadable payloads are dropped.
    fn load_for_write(&self) -> Result<Vec<Snapshot>> {
        match self.try_get_all_snapshots() {
            Ok(snapshots) => Ok(snapshots),
            Err(e) if e.is_corrupt_payload() => {
                warn!(
                    namespace = %self.config.namespace,
                    error = %e,
                    "discarding unreadable snapshot history"
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn persist(&self, snapshots: &[Snapshot]) -> Result<()> {
        if snapshots.is_empty() {
            return self.storage.remove(&self.storage_key());
        }
        let payload = self.config.encoding.encode(snapshots)?;
        self.storage.set(&self.storage_key(), &payload)
    }

    /// Drop the oldest entries beyond the limit. Returns their ids.
    fn apply_retention(&self, snapshots: &mut Vec<Snapshot>) -> Vec<SnapshotId> {
        if !self.config.auto_cleanup || snapshots.len() <= self.config.max_snapshots {
            return Vec::new();
        }

        let overflow = snapshots.len() - self.config.max_snapshots;
        let evicted: Vec<SnapshotId> = snapshots.drain(..overflow).map(|s| s.id).collect();
        debug!(
            namespace = %self.config.namespace,
            evicted = evicted.len(),
            "retention limit reached"
        );
        evicted
    }

    fn generate_id(&self, timestamp: Timestamp, existing: &[Snapshot]) -> SnapshotId {
        loop {
            let n = self.id_counter.fetch_add(1, Ordering::SeqCst);

            let mut hasher = Sha256::new();
            hasher.update(self.config.namespace.as_bytes());
            hasher.update(timestamp.0.to_le_bytes());
            hasher.update(n.to_le_bytes());
            let digest = hasher.finalize();

            let id = SnapshotId(format!("snap_{}", hex::encode(&digest[..8])));
            if !existing.iter().any(|s| s.id == id) {
                return id;
            }
        }
    }

    fn publish(&self, event: SnapshotEvent) {
        if let Some(manager) = &self.subscriptions {
            manager.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::types::{FieldConfig, FieldType};
    use serde_json::json;

    fn test_store(max_snapshots: usize) -> SnapshotStore<MemoryStorage> {
        SnapshotStore::new(
            MemoryStorage::new(),
            StoreConfig {
                namespace: "signup".to_string(),
                max_snapshots,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_create_and_get() {
        let store = test_store(10);
        let snapshot = store.create_snapshot(json!({"email": "a@b.c"}), None).unwrap();

        assert!(snapshot.id.as_str().starts_with("snap_"));
        assert_eq!(snapshot.version, Version::from("1.0.0"));
        assert_eq!(store.get_snapshot(&snapshot.id), Some(snapshot.clone()));
        assert_eq!(
            store.restore_snapshot(&snapshot.id),
            Some(json!({"email": "a@b.c"}))
        );
        assert_eq!(store.storage_key(), "form_snapshots:signup");
    }

    #[test]
    fn test_ids_unique_and_timestamps_non_decreasing() {
        let store = test_store(100);
        for i in 0..20 {
            store.create_snapshot(json!({"step": i}), None).unwrap();
        }

        let all = store.get_all_snapshots();
        let ids: HashSet<_> = all.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids.len(), 20);
        assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(all[19].state, json!({"step": 19}));
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let store = test_store(3);
        for i in 0..4 {
            store.create_snapshot(json!({"n": i}), None).unwrap();
        }

        let states: Vec<Value> = store.get_all_snapshots().into_iter().map(|s| s.state).collect();
        assert_eq!(states, vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
    }

    #[test]
    fn test_no_eviction_without_auto_cleanup() {
        let store = SnapshotStore::new(
            MemoryStorage::new(),
            StoreConfig {
                max_snapshots: 2,
                auto_cleanup: false,
                ..Default::default()
            },
        );
        for i in 0..4 {
            store.create_snapshot(json!({"n": i}), None).unwrap();
        }
        assert_eq!(store.snapshot_count(), 4);
    }

    #[test]
    fn test_delete_and_clear() {
        let store = test_store(10);
        let a = store.create_snapshot(json!({"a": 1}), None).unwrap();
        let b = store.create_snapshot(json!({"b": 1}), None).unwrap();

        assert!(store.delete_snapshot(&a.id));
        assert!(!store.delete_snapshot(&a.id));
        assert_eq!(store.latest_snapshot().map(|s| s.id), Some(b.id));

        store.clear_snapshots();
        assert!(store.get_all_snapshots().is_empty());
        assert!(store.storage().is_empty());
    }

    #[test]
    fn test_corrupt_payload_reads_empty() {
        let store = test_store(10);
        store
            .storage()
            .set(&store.storage_key(), "{definitely not json")
            .unwrap();

        assert!(store.get_all_snapshots().is_empty());
        assert!(store.try_get_all_snapshots().is_err());

        // Writing replaces the unreadable history.
        store.create_snapshot(json!({"a": 1}), None).unwrap();
        assert_eq!(store.snapshot_count(), 1);
    }

    #[test]
    fn test_auto_snapshot_requires_important_change() {
        let store = test_store(10);
        let config = FormConfig::new()
            .field("email", FieldConfig::typed(FieldType::String).important())
            .field("nickname", FieldConfig::typed(FieldType::String));

        let prev = json!({"email": "a@b.c", "nickname": "al"});
        let minor = json!({"email": "a@b.c", "nickname": "ally"});
        assert!(store.create_auto_snapshot(&config, &minor, &prev).is_none());

        let major = json!({"email": "x@y.z", "nickname": "ally"});
        let snapshot = store.create_auto_snapshot(&config, &major, &prev).unwrap();

        let metadata = snapshot.metadata.unwrap();
        assert!(metadata.is_auto());
        let changes = metadata.changes.unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["email"].to, json!("x@y.z"));
        assert_eq!(changes["nickname"].from, json!("al"));
    }

    #[test]
    fn test_import_rejects_duplicate_ids() {
        let store = test_store(10);
        let json = r#"[
            {"id": "x", "timestamp": 1, "state": {}, "version": "1.0.0"},
            {"id": "x", "timestamp": 2, "state": {}, "version": "1.0.0"}
        ]"#;

        assert!(matches!(
            store.import_snapshots(json),
            Err(SnapshotError::InvalidOperation(_))
        ));
        assert_eq!(store.snapshot_count(), 0);
    }
}
