//! A single reversible migration step.

use crate::error::StepError;
use crate::types::Version;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Outcome of one step function.
pub type StepResult = std::result::Result<Value, StepError>;

/// A state transform between two schema versions.
pub type MigrationFn = Arc<dyn Fn(Value) -> StepResult + Send + Sync>;

/// A bidirectional transform into `version`.
///
/// `down(up(x))` must reproduce `x`; [`MigrationManager::validate_migrations`]
/// checks this in strict mode.
///
/// [`MigrationManager::validate_migrations`]: super::MigrationManager::validate_migrations
#[derive(Clone)]
pub struct Migration {
    pub version: Version,
    pub description: String,
    up: MigrationFn,
    down: MigrationFn,
}

impl Migration {
    pub fn new<U, D>(
        version: impl Into<Version>,
        description: impl Into<String>,
        up: U,
        down: D,
    ) -> Self
    where
        U: Fn(Value) -> StepResult + Send + Sync + 'static,
        D: Fn(Value) -> StepResult + Send + Sync + 'static,
    {
        Self {
            version: version.into(),
            description: description.into(),
            up: Arc::new(up),
            down: Arc::new(down),
        }
    }

    /// Transform a state from the previous version into this one.
    pub fn up(&self, state: Value) -> StepResult {
        (self.up)(state)
    }

    /// Transform a state from this version back to the previous one.
    pub fn down(&self, state: Value) -> StepResult {
        (self.down)(state)
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
