//! Standalone HTML renderer with embedded styles.

use super::format::display_value;
use super::generator::{ProcessedSnapshot, SnapshotReport};
use crate::types::Importance;

const STYLE: &str = r#"
:root { --bg: #ffffff; --fg: #1f2328; --muted: #656d76; --border: #d0d7de;
        --high: #cf222e; --medium: #9a6700; --low: #1a7f37; --card: #f6f8fa; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #0d1117; --fg: #e6edf3; --muted: #8d96a0; --border: #30363d;
          --high: #ff7b72; --medium: #d29922; --low: #3fb950; --card: #161b22; }
}
body { background: var(--bg); color: var(--fg); margin: 2rem auto; max-width: 60rem;
       font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Helvetica, Arial, sans-serif; }
h1, h2 { border-bottom: 1px solid var(--border); padding-bottom: .3rem; }
dl.summary { display: grid; grid-template-columns: max-content auto; gap: .25rem 1rem; }
dl.summary dt { color: var(--muted); }
.snapshot { background: var(--card); border: 1px solid var(--border); border-radius: 6px;
            padding: .75rem 1rem; margin: .75rem 0; }
.snapshot h3 { margin: 0 0 .5rem; font-size: 1rem; }
.tier-high h2 { color: var(--high); }
.tier-medium h2 { color: var(--medium); }
.tier-low summary { color: var(--low); font-weight: 600; cursor: pointer; font-size: 1.25rem; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid var(--border); padding: .25rem .5rem; text-align: left; }
code { font-family: ui-monospace, SFMono-Regular, Menlo, monospace; }
.muted { color: var(--muted); }
"#;

pub(super) fn render(report: &SnapshotReport) -> String {
    let summary = &report.summary;
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    out.push_str("<meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str("<title>Snapshot Report</title>\n");
    out.push_str(&format!("<style>{}</style>\n", STYLE));
    out.push_str("</head>\n<body>\n<h1>Snapshot Report</h1>\n");

    let versions: Vec<String> = summary
        .versions
        .iter()
        .map(|v| escape_html(v.as_str()))
        .collect();
    out.push_str("<dl class=\"summary\">\n");
    out.push_str(&format!("<dt>Total snapshots</dt><dd>{}</dd>\n", summary.total_snapshots));
    out.push_str(&format!(
        "<dt>Date range</dt><dd>{} to {}</dd>\n",
        summary.date_range.from.to_rfc3339(),
        summary.date_range.to.to_rfc3339()
    ));
    out.push_str(&format!("<dt>Versions</dt><dd>{}</dd>\n", versions.join(", ")));
    out.push_str(&format!(
        "<dt>Snapshots with changes</dt><dd>{}</dd>\n",
        summary.total_changes
    ));
    out.push_str(&format!(
        "<dt>Important changes</dt><dd>{}</dd>\n",
        summary.important_changes
    ));
    out.push_str("</dl>\n");

    if report.snapshots.is_empty() {
        out.push_str("<p class=\"muted\">No snapshots.</p>\n");
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
                "<details class=\"tier tier-low\">\n<summary>{} ({})</summary>\n",
                title,
                tier.len()
            ));
        } else {
            out.push_str(&format!(
                "<section class=\"tier tier-{}\">\n<h2>{} ({})</h2>\n",
                importance,
                title,
                tier.len()
            ));
        }

        for processed in tier {
            render_snapshot(report, processed, &mut out);
        }

        if importance == Importance::Low {
            out.push_str("</details>\n");
        } else {
            out.push_str("</section>\n");
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn render_snapshot(report: &SnapshotReport, processed: &ProcessedSnapshot, out: &mut String) {
    let snapshot = &processed.snapshot;
    out.push_str("<article class=\"snapshot\">\n");
    out.push_str(&format!(
        "<h3>{} &middot; v{} &middot; <code>{}</code></h3>\n",
        snapshot.timestamp.to_rfc3339(),
        escape_html(snapshot.version.as_str()),
        escape_html(snapshot.id.as_str())
    ));

    match &processed.changes {
        Some(changes) => {
            out.push_str("<table>\n<thead><tr><th>Field</th><th>From</th><th>To</th></tr></thead>\n<tbody>\n");
            for (field, change) in changes {
                out.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                    escape_html(report.label(field)),
                    escape_html(&display_value(&change.from)),
                    escape_html(&display_value(&change.to))
                ));
            }
            out.push_str("</tbody>\n</table>\n");
        }
        None => out.push_str("<p class=\"muted\">No changes.</p>\n"),
    }

    out.push_str("</article>\n");
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
