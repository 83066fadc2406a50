//! Output format dispatch.

use super::generator::SnapshotReport;
use super::{html, markdown, text};
use crate::diff::canonical_json;
use crate::error::{Result, SnapshotError};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Rendering target for [`format_report`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Markdown,
    Html,
    Json,
}

impl FromStr for ReportFormat {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "html" => Ok(ReportFormat::Html),
            "json" => Ok(ReportFormat::Json),
            other => Err(SnapshotError::InvalidOperation(format!(
                "Unknown report format: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportFormat::Text => "text",
            ReportFormat::Markdown => "markdown",
            ReportFormat::Html => "html",
            ReportFormat::Json => "json",
        };
        f.write_str(name)
    }
}

/// Render a report.
pub fn format_report(report: &SnapshotReport, format: ReportFormat) -> String {
    match format {
        ReportFormat::Text => text::render(report),
        ReportFormat::Markdown => markdown::render(report),
        ReportFormat::Html => html::render(report),
        ReportFormat::Json => serde_json::to_string_pretty(report).unwrap_or_else(|e| {
            warn!(error = %e, "failed to serialize report");
            "{}".to_string()
        }),
    }
}

/// Render a report in a format given by name.
pub fn format_report_str(report: &SnapshotReport, format: &str) -> Result<String> {
    Ok(format_report(report, format.parse()?))
}

/// Human rendering of a field value, before any escaping.
pub(super) fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "(empty)".to_string(),
        Value::String(s) => s.clone(),
        other => canonical_json(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{generate_report, ReportOptions};
    use crate::types::{FormConfig, Snapshot, Timestamp};
    use serde_json::json;

    #[test]
    fn test_parse_format_names() {
        assert_eq!("MD".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert_eq!("txt".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert!("pdf".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_json_output_uses_documented_keys() {
        let snapshots = vec![Snapshot::new("a", Timestamp(5), json!({"x": 1}), "1.0.0")];
        let report = generate_report(&snapshots, &FormConfig::new(), &ReportOptions::default());

        let out = format_report_str(&report, "json").unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["summary"]["totalSnapshots"], json!(1));
        assert_eq!(parsed["summary"]["dateRange"]["from"], json!(5));
        assert_eq!(parsed["snapshots"][0]["importance"], json!("low"));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("hi")), "hi");
        assert_eq!(display_value(&Value::Null), "(empty)");
        assert_eq!(display_value(&json!({"b": 1, "a": [true]})), r#"{"a":[true],"b":1}"#);
    }
}
