//! Error types for the snapshot engine.

use crate::types::{MigrationDirection, Snapshot, Version};
use thiserror::Error;

/// Error returned by a migration step function.
pub type StepError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid storage format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Storage is locked by another process")]
    Locked,

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    /// A migration step failed. The chain was aborted and no partial
    /// result is returned.
    #[error("Migration {direction} to {version} failed for snapshot {}: {source}", .snapshot.id)]
    Migration {
        version: Version,
        direction: MigrationDirection,
        snapshot: Box<Snapshot>,
        #[source]
        source: StepError,
    },

    /// Aggregate result of the migration self-check.
    #[error("Migration validation failed:\n{}", .0.join("\n"))]
    MigrationValidation(Vec<String>),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<serde_json::Error> for SnapshotError {
    fn from(e: serde_json::Error) -> Self {
        SnapshotError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for SnapshotError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        SnapshotError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for SnapshotError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        SnapshotError::Deserialization(e.to_string())
    }
}

impl From<base64::DecodeError> for SnapshotError {
    fn from(e: base64::DecodeError) -> Self {
        SnapshotError::Encoding(e.to_string())
    }
}

impl SnapshotError {
    /// True for errors caused by unreadable persisted data rather than by
    /// the storage backend itself.
    pub fn is_corrupt_payload(&self) -> bool {
        matches!(
            self,
            SnapshotError::Deserialization(_)
                | SnapshotError::Encoding(_)
                | SnapshotError::Corruption(_)
                | SnapshotError::ChecksumMismatch { .. }
                | SnapshotError::InvalidFormat(_)
        )
    }
}

/// Result type for snapshot operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;
