//! Structural comparison of form states.
//!
//! Equality is decided on the canonical serialization of a value (object
//! keys sorted recursively), so two objects holding the same entries in a
//! different insertion order compare equal.

use crate::types::{FieldChange, StateChanges};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Result of comparing two states key by key.
///
/// Every key of either side lands in exactly one of the four buckets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    /// Keys only in the newer state.
    pub added: BTreeMap<String, Value>,
    /// Keys only in the older state.
    pub removed: BTreeMap<String, Value>,
    /// Keys in both whose values differ.
    pub modified: BTreeMap<String, FieldChange>,
    /// Keys in both with equal values, in the older state's key order.
    pub unchanged: Vec<String>,
}

impl SnapshotDiff {
    pub fn is_identical(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Number of keys that were added, removed or modified.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Diff of a modified key whose both sides are objects.
    pub fn nested(&self, key: &str) -> Option<SnapshotDiff> {
        let change = self.modified.get(key)?;
        match (&change.from, &change.to) {
            (Value::Object(a), Value::Object(b)) => Some(compare_maps(a, b)),
            _ => None,
        }
    }
}

/// Compare two states.
///
/// Non-object states are treated as having no keys.
pub fn compare_snapshots(a: &Value, b: &Value) -> SnapshotDiff {
    let empty = Map::new();
    let a = a.as_object().unwrap_or(&empty);
    let b = b.as_object().unwrap_or(&empty);
    compare_maps(a, b)
}

fn compare_maps(a: &Map<String, Value>, b: &Map<String, Value>) -> SnapshotDiff {
    let mut diff = SnapshotDiff::default();

    for (key, old) in a {
        match b.get(key) {
            None => {
                diff.removed.insert(key.clone(), old.clone());
            }
            Some(new) if deep_equal(old, new) => diff.unchanged.push(key.clone()),
            Some(new) => {
                diff.modified.insert(
                    key.clone(),
                    FieldChange {
                        from: old.clone(),
                        to: new.clone(),
                    },
                );
            }
        }
    }

    for (key, new) in b {
        if !a.contains_key(key) {
            diff.added.insert(key.clone(), new.clone());
        }
    }

    diff
}

/// Serialize a value with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // A plain string always serializes.
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Structural equality via canonical serialization.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    canonical_json(a) == canonical_json(b)
}

/// Per-field changes between two states.
///
/// Compares each top-level field as a whole; a missing field reads as
/// `null`. With `fields` given, only those fields are considered.
pub fn shallow_changes(prev: &Value, current: &Value, fields: Option<&[String]>) -> StateChanges {
    let empty = Map::new();
    let prev = prev.as_object().unwrap_or(&empty);
    let current = current.as_object().unwrap_or(&empty);

    let keys: BTreeSet<&String> = match fields {
        Some(fields) => fields.iter().collect(),
        None => prev.keys().chain(current.keys()).collect(),
    };

    let mut changes = StateChanges::new();
    for key in keys {
        let from = prev.get(key.as_str()).unwrap_or(&Value::Null);
        let to = current.get(key.as_str()).unwrap_or(&Value::Null);
        if from != to {
            changes.insert(
                key.clone(),
                FieldChange {
                    from: from.clone(),
                    to: to.clone(),
                },
            );
        }
    }
    changes
}
