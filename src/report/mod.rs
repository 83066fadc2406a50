//! Reports over a snapshot history.
//!
//! [`generate_report`] sorts and filters a list of snapshots, computes each
//! snapshot's changes against its predecessor and classifies them by
//! [`Importance`](crate::Importance). [`format_report`] renders the result
//! as plain text, Markdown, a standalone HTML page or JSON. Renderers are
//! pure and escape all snapshot-supplied text.

mod format;
mod generator;
mod html;
mod markdown;
mod text;

pub use format::{format_report, format_report_str, ReportFormat};
pub use generator::{
    classify_importance, generate_report, DateRange, ProcessedSnapshot, ReportFilters,
    ReportOptions, ReportSummary, SnapshotReport,
};
