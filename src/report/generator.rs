//! Report construction: sorting, filtering, change detection, classification.

use crate::diff::shallow_changes;
use crate::types::{FormConfig, Importance, Snapshot, StateChanges, Timestamp, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Changed-field count above which a snapshot is at least medium importance.
const MEDIUM_CHANGE_THRESHOLD: usize = 3;

/// Inclusive time window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Timestamp,
    pub to: Timestamp,
}

impl DateRange {
    pub fn new(from: Timestamp, to: Timestamp) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.from <= ts && ts <= self.to
    }
}

/// Optional filters, applied in declaration order.
#[derive(Clone, Debug, Default)]
pub struct ReportFilters {
    /// Keep snapshots captured within this window.
    pub date_range: Option<DateRange>,

    /// Keep snapshots at one of these versions.
    pub versions: Option<Vec<Version>>,

    /// Only consider these fields when computing changes.
    pub fields: Option<Vec<String>>,

    /// Keep only high-importance snapshots.
    pub only_important: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ReportOptions {
    pub filters: ReportFilters,
}

/// A snapshot with its derived change set and importance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSnapshot {
    pub snapshot: Snapshot,
    /// Changes against the previous snapshot; `None` for the first one or
    /// when nothing changed.
    pub changes: Option<StateChanges>,
    pub importance: Importance,
}

impl ProcessedSnapshot {
    pub fn change_count(&self) -> usize {
        self.changes.as_ref().map_or(0, |c| c.len())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_snapshots: usize,
    pub date_range: DateRange,
    /// Unique versions, ascending.
    pub versions: Vec<Version>,
    /// Snapshots with at least one changed field.
    pub total_changes: usize,
    /// Snapshots classified as high importance.
    pub important_changes: usize,
}

/// Immutable summary of a snapshot history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotReport {
    pub summary: ReportSummary,
    pub snapshots: Vec<ProcessedSnapshot>,
    /// Display labels for fields that declare one.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl SnapshotReport {
    /// Display label for a field, defaulting to its name.
    pub fn label<'a>(&'a self, field: &'a str) -> &'a str {
        self.labels.get(field).map_or(field, String::as_str)
    }

    /// Snapshots of one importance tier, in chronological order.
    pub fn tier(&self, importance: Importance) -> impl Iterator<Item = &ProcessedSnapshot> {
        self.snapshots
            .iter()
            .filter(move |p| p.importance == importance)
    }
}

/// Classify a change set.
///
/// High if any changed field is marked important, medium if more than three
/// fields changed, low otherwise.
pub fn classify_importance(changes: Option<&StateChanges>, config: &FormConfig) -> Importance {
    let Some(changes) = changes else {
        return Importance::Low;
    };

    if changes.keys().any(|field| config.is_important(field)) {
        Importance::High
    } else if changes.len() > MEDIUM_CHANGE_THRESHOLD {
        Importance::Medium
    } else {
        Importance::Low
    }
}

/// Build a report over `snapshots`.
///
/// Never fails: empty input gives zero counts and a date range at the
/// current time.
pub fn generate_report(
    snapshots: &[Snapshot],
    config: &FormConfig,
    options: &ReportOptions,
) -> SnapshotReport {
    let filters = &options.filters;

    let mut sorted: Vec<&Snapshot> = snapshots.iter().collect();
    sorted.sort_by_key(|s| s.timestamp);

    if let Some(range) = &filters.date_range {
        sorted.retain(|s| range.contains(s.timestamp));
    }
    if let Some(versions) = &filters.versions {
        sorted.retain(|s| versions.contains(&s.version));
    }

    let fields = filters.fields.as_deref();
    let mut processed: Vec<ProcessedSnapshot> = sorted
        .iter()
        .enumerate()
        .map(|(i, snapshot)| {
            let changes = i
                .checked_sub(1)
                .map(|prev| shallow_changes(&sorted[prev].state, &snapshot.state, fields))
                .filter(|c| !c.is_empty());
            let importance = classify_importance(changes.as_ref(), config);
            ProcessedSnapshot {
                snapshot: (*snapshot).clone(),
                changes,
                importance,
            }
        })
        .collect();

    if filters.only_important {
        processed.retain(|p| p.importance == Importance::High);
    }

    let summary = summarize(&processed);
    debug!(
        total = summary.total_snapshots,
        changed = summary.total_changes,
        important = summary.important_changes,
        "report generated"
    );

    let labels = config
        .iter()
        .filter_map(|(name, field)| field.label.clone().map(|l| (name.clone(), l)))
        .collect();

    SnapshotReport {
        summary,
        snapshots: processed,
        labels,
    }
}

fn summarize(processed: &[ProcessedSnapshot]) -> ReportSummary {
    let date_range = match (processed.first(), processed.last()) {
        (Some(first), Some(last)) => {
            DateRange::new(first.snapshot.timestamp, last.snapshot.timestamp)
        }
        _ => {
            let now = Timestamp::now();
            DateRange::new(now, now)
        }
    };

    let mut versions: Vec<Version> = processed
        .iter()
        .map(|p| p.snapshot.version.clone())
        .collect();
    versions.sort();
    versions.dedup();

    ReportSummary {
        total_snapshots: processed.len(),
        date_range,
        versions,
        total_changes: processed.iter().filter(|p| p.changes.is_some()).count(),
        important_changes: processed
            .iter()
            .filter(|p| p.importance == Importance::High)
            .count(),
    }
}
