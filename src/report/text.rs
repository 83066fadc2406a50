//! Plain text renderer.

use super::format::display_value;
use super::generator::{ProcessedSnapshot, SnapshotReport};
use crate::types::Importance;

pub(super) fn render(report: &SnapshotReport) -> String {
    let summary = &report.summary;
    let mut out = String::new();

    out.push_str("SNAPSHOT REPORT\n");
    out.push_str("===============\n\n");

    let versions: Vec<&str> = summary.versions.iter().map(|v| v.as_str()).collect();
    out.push_str(&format!("Total snapshots:        {}\n", summary.total_snapshots));
    out.push_str(&format!(
        "Date range:             {} to {}\n",
        summary.date_range.from.to_rfc3339(),
        summary.date_range.to.to_rfc3339()
    ));
    out.push_str(&format!("Versions:               {}\n", versions.join(", ")));
    out.push_str(&format!("Snapshots with changes: {}\n", summary.total_changes));
    out.push_str(&format!("Important changes:      {}\n", summary.important_changes));

    if report.snapshots.is_empty() {
        out.push_str("\nNo snapshots.\n");
        return out;
    }

    for importance in Importance::ALL {
        let tier: Vec<&ProcessedSnapshot> = report.tier(importance).collect();
        if tier.is_empty() {
            continue;
        }

        let heading = format!("{} IMPORTANCE ({})", importance.as_str().to_uppercase(), tier.len());
        out.push_str(&format!("\n{}\n{}\n", heading, "-".repeat(heading.len())));

        for processed in tier {
            render_snapshot(report, processed, &mut out);
        }
    }

    out
}

fn render_snapshot(report: &SnapshotReport, processed: &ProcessedSnapshot, out: &mut String) {
    let snapshot = &processed.snapshot;
    out.push_str(&format!(
        "\n{}  v{}  ({})\n",
        snapshot.timestamp.to_rfc3339(),
        one_line(snapshot.version.as_str()),
        one_line(snapshot.id.as_str())
    ));

    match &processed.changes {
        Some(changes) => {
            for (field, change) in changes {
                out.push_str(&format!(
                    "  - {}: {} -> {}\n",
                    one_line(report.label(field)),
                    one_line(&display_value(&change.from)),
                    one_line(&display_value(&change.to))
                ));
            }
        }
        None => out.push_str("  (no changes)\n"),
    }
}

/// Keep user text from breaking the line structure.
fn one_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}
