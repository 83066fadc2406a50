//! Markdown renderer.
//!
//! High and medium tiers are always expanded; the low tier is wrapped in a
//! collapsed `<details>` block.

use super::format::display_value;
use super::generator::{ProcessedSnapshot, SnapshotReport};
use crate::types::Importance;

pub(super) fn render(report: &SnapshotReport) -> String {
    let summary = &report.summary;
    let mut out = String::new();

    out.push_str("# Snapshot Report\n\n");
    out.push_str("## Summary\n\n");
    out.push_str("| Metric | Value |\n|---|---|\n");
    out.push_str(&format!("| Total snapshots | {} |\n", summary.total_snapshots));
    out.push_str(&format!(
        "| Date range | {} to {} |\n",
        summary.date_range.from.to_rfc3339(),
        summary.date_range.to.to_rfc3339()
    ));
    let versions: Vec<String> = summary
        .versions
        .iter()
        .map(|v| escape_markdown(v.as_str()))
        .collect();
    out.push_str(&format!("| Versions | {} |\n", versions.join(", ")));
    out.push_str(&format!("| Snapshots with changes | {} |\n", summary.total_changes));
    out.push_str(&format!("| Important changes | {} |\n\n", summary.important_changes));

    if report.snapshots.is_empty() {
        out.push_str("_No snapshots._\n");
        return out;
    }

    for importance in Importance::ALL {
        let tier: Vec<&ProcessedSnapshot> = report.tier(importance).collect();
        if tier.is_empty() {
            continue;
        }

        let title = match importance {
            Importance::High => "High importance",
            Importance::Medium => "Medium importance",
            Importance::Low => "Low importance",
        };

        if importance == Importance::Low {
            out.push_str(&format!(
                "<details>\n<summary>{} ({})</summary>\n\n",
                title,
                tier.len()
            ));
        } else {
            out.push_str(&format!("## {} ({})\n\n", title, tier.len()));
        }

        for processed in tier {
            render_snapshot(report, processed, &mut out);
        }

        if importance == Importance::Low {
            out.push_str("</details>\n\n");
        }
    }

    out
}

fn render_snapshot(report: &SnapshotReport, processed: &ProcessedSnapshot, out: &mut String) {
    let snapshot = &processed.snapshot;
    out.push_str(&format!(
        "### {} · v{} · {}\n\n",
        snapshot.timestamp.to_rfc3339(),
        escape_markdown(snapshot.version.as_str()),
        escape_markdown(snapshot.id.as_str())
    ));

    let Some(changes) = &processed.changes else {
        out.push_str("_No changes._\n\n");
        return;
    };

    out.push_str("| Field | From | To |\n|---|---|---|\n");
    for (field, change) in changes {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            escape_markdown(report.label(field)),
            escape_markdown(&display_value(&change.from)),
            escape_markdown(&display_value(&change.to))
        ));
    }
    out.push('\n');
}

/// Escape text for use inside Markdown table cells and headings.
fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '`' | '*' | '_' | '[' | ']' | '#' | '|' | '~' => {
                out.push('\\');
                out.push(c);
            }
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\r' | '\n' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{generate_report, ReportOptions};
    use crate::types::{FieldConfig, FieldType, FormConfig, Snapshot, Timestamp};
    use serde_json::json;

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a|b"), "a\\|b");
        assert_eq!(escape_markdown("*bold* <b>"), "\\*bold\\* &lt;b&gt;");
        assert_eq!(escape_markdown("line\nbreak"), "line break");
    }

    #[test]
    fn test_low_tier_collapsed() {
        let config = FormConfig::new()
            .field("email", FieldConfig::typed(FieldType::String).important());
        let snapshots = vec![
            Snapshot::new("a", Timestamp(0), json!({"email": "a", "note": "x"}), "1.0.0"),
            Snapshot::new("b", Timestamp(1), json!({"email": "b", "note": "x"}), "1.0.0"),
            Snapshot::new("c", Timestamp(2), json!({"email": "b", "note": "a|b"}), "1.0.0"),
        ];
        let report = generate_report(&snapshots, &config, &ReportOptions::default());

        let out = render(&report);
        assert!(out.contains("## High importance (1)"));
        assert!(out.contains("<details>\n<summary>Low importance (2)</summary>"));
        assert!(out.contains("| note | x | a\\|b |"));
        assert!(out.contains("_No changes._"));

        let high = out.find("## High importance").unwrap();
        let details = out.find("<details>").unwrap();
        assert!(high < details);
    }
}
