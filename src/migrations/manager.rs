//! Migration manager: ordered chain traversal and self-checks.

use super::migration::Migration;
use crate::diff::{canonical_json, deep_equal};
use crate::error::{Result, SnapshotError};
use crate::types::{MigrationDirection, MigrationEntry, Snapshot, Timestamp, Version};
use serde_json::{json, Value};
use tracing::debug;

/// Migration manager configuration.
#[derive(Clone, Debug, Default)]
pub struct MigrationConfig {
    /// Enables [`MigrationManager::validate_migrations`].
    pub strict: bool,

    /// Sample states checked for reversibility in addition to `{}`.
    pub probe_states: Vec<Value>,
}

/// Holds the registered migrations, sorted ascending by version.
#[derive(Debug, Default)]
pub struct MigrationManager {
    migrations: Vec<Migration>,
    config: MigrationConfig,
}

impl MigrationManager {
    pub fn new(config: MigrationConfig) -> Self {
        Self {
            migrations: Vec::new(),
            config,
        }
    }

    /// Register a migration, keeping the chain sorted by version.
    pub fn add_migration(&mut self, migration: Migration) {
        self.migrations.push(migration);
        self.migrations.sort_by(|a, b| a.version.cmp(&b.version));
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn migration_count(&self) -> usize {
        self.migrations.len()
    }

    /// Registered versions, ascending.
    pub fn versions(&self) -> Vec<Version> {
        self.migrations.iter().map(|m| m.version.clone()).collect()
    }

    pub fn latest_version(&self) -> Option<&Version> {
        self.migrations.last().map(|m| &m.version)
    }

    /// Migrate a snapshot's state to `target`.
    ///
    /// A snapshot already at `target` comes back unchanged. Each applied
    /// step is recorded in `metadata.migrations`. On failure the error
    /// carries the failing version and the input snapshot.
    pub fn migrate_to_version(&self, snapshot: &Snapshot, target: &Version) -> Result<Snapshot> {
        let current = &snapshot.version;
        if current == target {
            return Ok(snapshot.clone());
        }

        let direction = if target > current {
            MigrationDirection::Up
        } else {
            MigrationDirection::Down
        };

        let steps: Vec<&Migration> = match direction {
            MigrationDirection::Up => self
                .migrations
                .iter()
                .filter(|m| &m.version > current && &m.version <= target)
                .collect(),
            MigrationDirection::Down => self
                .migrations
                .iter()
                .rev()
                .filter(|m| &m.version <= current && &m.version > target)
                .collect(),
        };

        let mut migrated = snapshot.clone();
        let mut state = std::mem::take(&mut migrated.state);

        for (i, migration) in steps.iter().enumerate() {
            debug!(
                snapshot_id = %snapshot.id,
                version = %migration.version,
                %direction,
                "applying migration"
            );

            let result = match direction {
                MigrationDirection::Up => migration.up(state),
                MigrationDirection::Down => migration.down(state),
            };

            state = result.map_err(|source| SnapshotError::Migration {
                version: migration.version.clone(),
                direction,
                snapshot: Box::new(snapshot.clone()),
                source,
            })?;

            // The last step lands on the target in both directions. Before
            // that, an upgrade sits at the step it applied and a downgrade at
            // the next step it will undo.
            migrated.version = match (steps.get(i + 1), direction) {
                (None, _) => target.clone(),
                (Some(_), MigrationDirection::Up) => migration.version.clone(),
                (Some(next), MigrationDirection::Down) => next.version.clone(),
            };

            migrated
                .metadata
                .get_or_insert_with(Default::default)
                .migrations
                .push(MigrationEntry {
                    version: migration.version.clone(),
                    direction,
                    timestamp: Timestamp::now(),
                    description: migration.description.clone(),
                });
        }

        migrated.state = state;
        Ok(migrated)
    }

    /// Migrate to the highest registered version.
    ///
    /// Without registered migrations the snapshot comes back unchanged.
    pub fn migrate_to_latest(&self, snapshot: &Snapshot) -> Result<Snapshot> {
        match self.latest_version() {
            Some(latest) => self.migrate_to_version(snapshot, latest),
            None => Ok(snapshot.clone()),
        }
    }

    /// Migrate a batch, stopping at the first failure.
    pub fn migrate_all(&self, snapshots: &[Snapshot], target: &Version) -> Result<Vec<Snapshot>> {
        snapshots
            .iter()
            .map(|s| self.migrate_to_version(s, target))
            .collect()
    }

    /// Check the chain for ordering and reversibility.
    ///
    /// Only runs in strict mode. Every violation is collected and reported
    /// in one [`SnapshotError::MigrationValidation`].
    pub fn validate_migrations(&self) -> Result<()> {
        if !self.config.strict {
            return Ok(());
        }

        let mut errors = Vec::new();

        for pair in self.migrations.windows(2) {
            if pair[0].version >= pair[1].version {
                errors.push(format!(
                    "Migration versions must be strictly increasing: {} is followed by {}",
                    pair[0].version, pair[1].version
                ));
            }
        }

        let mut probes = vec![json!({})];
        probes.extend(self.config.probe_states.iter().cloned());

        for migration in &self.migrations {
            for probe in &probes {
                if let Err(message) = check_reversible(migration, probe) {
                    errors.push(message);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SnapshotError::MigrationValidation(errors))
        }
    }
}

fn check_reversible(migration: &Migration, probe: &Value) -> std::result::Result<(), String> {
    let version = &migration.version;
    let shown = canonical_json(probe);

    let upgraded = migration
        .up(probe.clone())
        .map_err(|e| format!("Migration {} up failed on {}: {}", version, shown, e))?;
    let restored = migration
        .down(upgraded)
        .map_err(|e| format!("Migration {} down failed on {}: {}", version, shown, e))?;

    if deep_equal(&restored, probe) {
        Ok(())
    } else {
        Err(format!(
            "Migration {} is not reversible: {} became {}",
            version,
            shown,
            canonical_json(&restored)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::StepResult;
    use serde_json::Map;

    fn rename(state: Value, from: &str, to: &str) -> StepResult {
        let mut obj = match state {
            Value::Object(obj) => obj,
            _ => Map::new(),
        };
        if let Some(v) = obj.remove(from) {
            obj.insert(to.to_string(), v);
        }
        Ok(Value::Object(obj))
    }

    fn chain() -> MigrationManager {
        let mut manager = MigrationManager::new(MigrationConfig {
            strict: true,
            ..Default::default()
        });
        // Registered out of order on purpose.
        manager.add_migration(Migration::new(
            "1.10.0",
            "rename mail to email",
            |s| rename(s, "mail", "email"),
            |s| rename(s, "email", "mail"),
        ));
        manager.add_migration(Migration::new(
            "1.2.0",
            "rename user to mail",
            |s| rename(s, "user", "mail"),
            |s| rename(s, "mail", "user"),
        ));
        manager
    }

    fn snapshot_at(version: &str, state: Value) -> Snapshot {
        Snapshot::new("s1", Timestamp(1), state, version)
    }

    #[test]
    fn test_chain_sorted_numerically() {
        let versions: Vec<String> = chain().versions().into_iter().map(String::from).collect();
        assert_eq!(versions, vec!["1.2.0", "1.10.0"]);
    }

    #[test]
    fn test_upgrade_and_downgrade() {
        let manager = chain();
        let original = snapshot_at("1.0.0", json!({"user": "kim@example.com"}));

        let up = manager.migrate_to_latest(&original).unwrap();
        assert_eq!(up.state, json!({"email": "kim@example.com"}));
        assert_eq!(up.version, Version::from("1.10.0"));
        assert_eq!(up.migrations().len(), 2);
        assert!(up
            .migrations()
            .iter()
            .all(|m| m.direction == MigrationDirection::Up));

        let down = manager
            .migrate_to_version(&up, &Version::from("1.0.0"))
            .unwrap();
        assert_eq!(down.state, original.state);
        assert_eq!(down.version, Version::from("1.0.0"));
        let entries: Vec<&str> = down.migrations()[2..]
            .iter()
            .map(|m| m.version.as_str())
            .collect();
        assert_eq!(entries, vec!["1.10.0", "1.2.0"]);
    }

    #[test]
    fn test_partial_downgrade_version() {
        let manager = chain();
        let latest = snapshot_at("1.10.0", json!({"email": "x"}));

        let down = manager
            .migrate_to_version(&latest, &Version::from("1.5.0"))
            .unwrap();
        assert_eq!(down.state, json!({"mail": "x"}));
        assert_eq!(down.version, Version::from("1.5.0"));
    }

    #[test]
    fn test_partial_upgrade_version() {
        let manager = chain();
        let original = snapshot_at("1.0.0", json!({"user": "x"}));

        let up = manager
            .migrate_to_version(&original, &Version::from("1.5.0"))
            .unwrap();
        assert_eq!(up.state, json!({"mail": "x"}));
        assert_eq!(up.version, Version::from("1.5.0"));
        assert_eq!(up.migrations().len(), 1);
        assert_eq!(up.migrations()[0].version, Version::from("1.2.0"));
    }

    #[test]
    fn test_no_step_in_range_is_identity() {
        let manager = chain();
        let snapshot = snapshot_at("1.3.0", json!({"mail": "x"}));
        let migrated = manager
            .migrate_to_version(&snapshot, &Version::from("1.5.0"))
            .unwrap();
        assert_eq!(migrated, snapshot);
    }

    #[test]
    fn test_same_version_is_identity() {
        let manager = chain();
        let snapshot = snapshot_at("1.2", json!({"mail": "x"}));
        let migrated = manager
            .migrate_to_version(&snapshot, &Version::from("1.2.0"))
            .unwrap();
        assert_eq!(migrated, snapshot);
    }

    #[test]
    fn test_failure_aborts_chain() {
        let mut manager = chain();
        manager.add_migration(Migration::new(
            "2.0.0",
            "always fails",
            |_| Err("boom".into()),
            Ok,
        ));

        let snapshot = snapshot_at("1.0.0", json!({"user": "x"}));
        let err = manager.migrate_to_latest(&snapshot).unwrap_err();
        match err {
            SnapshotError::Migration {
                version,
                direction,
                snapshot: failed,
                source,
            } => {
                assert_eq!(version, Version::from("2.0.0"));
                assert_eq!(direction, MigrationDirection::Up);
                assert_eq!(*failed, snapshot);
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("Expected Migration error, got {:?}", other),
        }
    }

    #[test]
    fn test_no_migrations_latest_is_identity() {
        let manager = MigrationManager::default();
        let snapshot = snapshot_at("3.0.0", json!({"a": 1}));
        assert_eq!(manager.migrate_to_latest(&snapshot).unwrap(), snapshot);
    }

    #[test]
    fn test_validate_passes_for_reversible_chain() {
        chain().validate_migrations().unwrap();
    }

    #[test]
    fn test_validate_collects_all_violations() {
        let mut manager = chain();
        manager.add_migration(Migration::new(
            "1.2.0",
            "duplicate version",
            Ok,
            Ok,
        ));
        manager.add_migration(Migration::new(
            "3.0.0",
            "lossy",
            |_| Ok(json!({"flag": true})),
            Ok,
        ));

        match manager.validate_migrations() {
            Err(SnapshotError::MigrationValidation(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].contains("strictly increasing"));
                assert!(errors[1].contains("3.0.0 is not reversible"));
            }
            other => panic!("Expected MigrationValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_skipped_when_not_strict() {
        let mut manager = MigrationManager::default();
        manager.add_migration(Migration::new("1.0.0", "lossy", |_| Ok(json!(1)), Ok));
        manager.validate_migrations().unwrap();
    }
}
