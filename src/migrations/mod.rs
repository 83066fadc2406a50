//! Schema migrations for snapshot state.
//!
//! Migrations form a linear chain ordered by [`Version`](crate::Version).
//! Upgrading applies each `up` step after the snapshot's version up to and
//! including the target; downgrading applies `down` steps in reverse.
//! Steps run one at a time, and a failing step aborts the whole chain
//! without returning a partially migrated snapshot.

mod manager;
mod migration;

pub use manager::{MigrationConfig, MigrationManager};
pub use migration::{Migration, MigrationFn, StepResult};
