//! # Form Snapshots
//!
//! A versioned, diffable, migratable history of a form's state, with
//! reporting over that history.
//!
//! ## Core Concepts
//!
//! - **Snapshots**: Timestamped, versioned captures of a form's field values
//! - **Store**: Per-namespace history with a retention limit
//! - **Diffs**: Key-level comparison with canonical deep equality
//! - **Migrations**: Ordered, reversible transforms between schema versions
//! - **Reports**: Importance-classified summaries rendered as text,
//!   Markdown, HTML or JSON
//!
//! ## Example
//!
//! ```ignore
//! use form_snapshots::{
//!     generate_report, format_report, MemoryStorage, ReportFormat, ReportOptions,
//!     SnapshotStore, StoreConfig,
//! };
//!
//! let store = SnapshotStore::new(MemoryStorage::new(), StoreConfig::for_namespace("signup"));
//!
//! // Capture state
//! store.create_snapshot(json!({"email": "kim@example.com"}), None);
//!
//! // Summarize the history
//! let report = generate_report(&store.get_all_snapshots(), &config, &ReportOptions::default());
//! println!("{}", format_report(&report, ReportFormat::Markdown));
//! ```

pub mod diff;
pub mod error;
pub mod migrations;
pub mod report;
pub mod storage;
pub mod store;
pub mod subscriptions;
pub mod types;
pub mod validate;

// Re-exports
pub use diff::{canonical_json, compare_snapshots, deep_equal, shallow_changes, SnapshotDiff};
pub use error::{Result, SnapshotError, StepError};
pub use migrations::{Migration, MigrationConfig, MigrationFn, MigrationManager, StepResult};
pub use report::{
    classify_importance, format_report, format_report_str, generate_report, DateRange,
    ProcessedSnapshot, ReportFilters, ReportFormat, ReportOptions, ReportSummary, SnapshotReport,
};
pub use storage::{FileStorage, KvStorage, MemoryStorage, PayloadEncoding};
pub use store::{SnapshotStore, StoreConfig};
pub use subscriptions::{
    DropReason, SnapshotEvent, SnapshotSummary, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
pub use types::*;
pub use validate::{
    validate_raw_snapshot, validate_snapshot, ValidationCode, ValidationError, ValidationResult,
};
