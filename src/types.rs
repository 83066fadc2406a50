//! Core types for the snapshot engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a snapshot within a store namespace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotId({})", self.0)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SnapshotId {
    fn from(s: &str) -> Self {
        SnapshotId(s.to_string())
    }
}

impl From<String> for SnapshotId {
    fn from(s: String) -> Self {
        SnapshotId(s)
    }
}

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time. A clock before the epoch reads as zero.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        Timestamp(millis)
    }

    /// UTC RFC 3339 rendering, falling back to the raw number when out of range.
    pub fn to_rfc3339(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.0)
            .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .unwrap_or_else(|| self.0.to_string())
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Dotted-numeric schema version ("major.minor.patch").
///
/// Versions compare segment by segment as numbers, with missing segments
/// treated as zero, so `"1.0"` equals `"1.0.0"` and `"1.10.0"` sorts after
/// `"1.2.0"`. Segments that are not numbers read as zero.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Version {
    raw: String,
    parts: Vec<u64>,
}

impl Version {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let parts = raw
            .trim()
            .split('.')
            .map(|segment| segment.trim().parse::<u64>().unwrap_or(0))
            .collect();
        Self { raw, parts }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// Parts without trailing zero segments; equal versions share this form.
    fn normalized(&self) -> &[u64] {
        let len = self
            .parts
            .iter()
            .rposition(|p| *p != 0)
            .map_or(0, |i| i + 1);
        &self.parts[..len]
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.raw)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Version::new(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Version::new(s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.raw
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::new("1.0.0")
    }
}

/// One field's transition between two snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldChange<V = Value> {
    pub from: V,
    pub to: V,
}

/// Field name to change. A missing key means the field did not change.
pub type StateChanges = BTreeMap<String, FieldChange>;

/// Direction a migration step was applied in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    Up,
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => f.write_str("up"),
            MigrationDirection::Down => f.write_str("down"),
        }
    }
}

/// Audit entry appended for every applied migration step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MigrationEntry {
    pub version: Version,
    pub direction: MigrationDirection,
    pub timestamp: Timestamp,
    pub description: String,
}

/// Snapshot metadata: the documented fields plus an open extension bag.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Set on snapshots created by change detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,

    /// Field-level changes that triggered an automatic snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<StateChanges>,

    /// Migration steps applied to this snapshot, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub migrations: Vec<MigrationEntry>,

    /// Caller-defined entries.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SnapshotMetadata {
    /// Metadata for an automatic snapshot.
    pub fn auto(changes: StateChanges) -> Self {
        Self {
            auto: Some(true),
            changes: Some(changes),
            ..Default::default()
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn is_auto(&self) -> bool {
        self.auto.unwrap_or(false)
    }
}

/// A timestamped, versioned capture of a form's field values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique within the store namespace (assigned by store).
    pub id: SnapshotId,

    /// Capture time (assigned by store).
    pub timestamp: Timestamp,

    /// Field name to value. Expected to be a JSON object.
    pub state: Value,

    /// Schema version of `state`.
    pub version: Version,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SnapshotMetadata>,
}

impl Snapshot {
    pub fn new(
        id: impl Into<SnapshotId>,
        timestamp: Timestamp,
        state: Value,
        version: impl Into<Version>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            state,
            version: version.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: SnapshotMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Value of a top-level state field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.state.as_object().and_then(|obj| obj.get(name))
    }

    /// Migration audit trail, empty when no migration touched this snapshot.
    pub fn migrations(&self) -> &[MigrationEntry] {
        self.metadata
            .as_ref()
            .map(|m| m.migrations.as_slice())
            .unwrap_or(&[])
    }
}

/// Declared type of a form field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    /// Any other declared type; not checked.
    #[serde(other)]
    Other,
}

impl FieldType {
    /// Whether `value` has this type. `None` for types that are not checked.
    pub fn check(&self, value: &Value) -> Option<bool> {
        match self {
            FieldType::String => Some(value.is_string()),
            FieldType::Number => Some(value.is_number()),
            FieldType::Boolean => Some(value.is_boolean()),
            FieldType::Array => Some(value.is_array()),
            FieldType::Object => Some(value.is_object()),
            FieldType::Other => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Other => "other",
        }
    }
}

/// Name of the JSON type of a value, for messages.
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Per-field configuration supplied by the form layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub important: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldConfig {
    pub fn typed(field_type: FieldType) -> Self {
        Self {
            field_type: Some(field_type),
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn important(mut self) -> Self {
        self.important = true;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Field name to configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormConfig(pub BTreeMap<String, FieldConfig>);

impl FormConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn field(mut self, name: impl Into<String>, config: FieldConfig) -> Self {
        self.0.insert(name.into(), config);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldConfig> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldConfig)> {
        self.0.iter()
    }

    pub fn is_important(&self, name: &str) -> bool {
        self.0.get(name).map_or(false, |c| c.important)
    }

    pub fn important_fields(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, c)| c.important)
            .map(|(name, _)| name.as_str())
    }

    /// Display label for a field, defaulting to its name.
    pub fn label<'a>(&'a self, name: &'a str) -> &'a str {
        self.0
            .get(name)
            .and_then(|c| c.label.as_deref())
            .unwrap_or(name)
    }
}

/// Derived significance of a snapshot's changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    Medium,
    Low,
}

impl Importance {
    pub const ALL: [Importance; 3] = [Importance::High, Importance::Medium, Importance::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::High => "high",
            Importance::Medium => "medium",
            Importance::Low => "low",
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
