//! Startup migration and recovery.
//!
//! [`MigrationSupport`] drives the whole startup pass over one store:
//!
//! 1. If the schema is outdated, back up the store file, migrate the schema,
//!    convert legacy plan exercises and re-validate. Any failure after the
//!    backup exists restores it and reloads the store.
//! 2. Validate every record.
//! 3. If validation fails, sweep invalid records.
//!
//! The pass never fails; its outcome is returned as a [`StartupReport`].

pub mod backup;
pub mod detector;
pub mod legacy;

pub use backup::BackupManager;
pub use detector::{needs_migration, schema_status, SchemaStatus};
pub use legacy::migrate_plan_exercise_data;

use crate::error::{LiftlogError, Result};
use crate::integrity::{self, ValidationOptions};
use crate::storage::traits::RecordStore;
use crate::storage::CURRENT_SCHEMA_VERSION;

/// Result of the migration step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    NotNeeded,
    Migrated {
        /// Legacy plan exercises converted
        transformed: usize,
    },
    Failed {
        error: String,
        /// Whether the pre-migration backup was put back
        restored: bool,
    },
}

/// What the startup pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    pub migration: MigrationOutcome,

    /// Validation error that triggered a sweep, if any
    pub integrity_error: Option<String>,

    /// Whether the sweep deleted anything
    pub corruption_cleaned: bool,
}

impl StartupReport {
    pub fn is_clean(&self) -> bool {
        !matches!(self.migration, MigrationOutcome::Failed { .. }) && self.integrity_error.is_none()
    }
}

struct FailedMigration {
    error: LiftlogError,
    restored: bool,
}

/// Migration and integrity engine bound to one store.
pub struct MigrationSupport<'a, S: RecordStore + ?Sized> {
    store: &'a mut S,
    backups: BackupManager,
    options: ValidationOptions,
}

impl<'a, S: RecordStore + ?Sized> MigrationSupport<'a, S> {
    /// Engine whose backup lives next to the store file.
    pub fn new(store: &'a mut S, options: ValidationOptions) -> Self {
        let backups = BackupManager::for_store(store.location());
        Self {
            store,
            backups,
            options,
        }
    }

    pub fn with_backup_manager(mut self, backups: BackupManager) -> Self {
        self.backups = backups;
        self
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn needs_migration(&self) -> bool {
        detector::needs_migration(&*self.store)
    }

    /// Run the migration step alone.
    ///
    /// # Errors
    ///
    /// Returns `LiftlogError::MigrationFailed` wrapping the first failure. If
    /// the failure happened after the backup was taken, the store file has
    /// already been restored and the in-memory state reloaded.
    pub fn migrate_if_needed(&mut self) -> Result<MigrationOutcome> {
        self.run_migration().map_err(|failed| failed.error)
    }

    fn run_migration(&mut self) -> std::result::Result<MigrationOutcome, FailedMigration> {
        if !self.needs_migration() {
            return Ok(MigrationOutcome::NotNeeded);
        }

        tracing::info!(store = %self.backups.store_path().display(), "starting store migration");

        if let Err(err) = self.backups.create_backup() {
            tracing::error!(error = %err, "backup failed; migration aborted");
            return Err(FailedMigration {
                error: LiftlogError::migration(err),
                restored: false,
            });
        }

        match self.migration_chain() {
            Ok(transformed) => {
                if let Err(err) = self.backups.discard_backup() {
                    tracing::warn!(error = %err, "could not remove migration backup");
                }
                tracing::info!(transformed, "store migration complete");
                Ok(MigrationOutcome::Migrated { transformed })
            }
            Err(err) => {
                tracing::error!(error = %err, "migration failed; restoring backup");
                let restored = self.roll_back();
                Err(FailedMigration {
                    error: LiftlogError::migration(err),
                    restored,
                })
            }
        }
    }

    fn migration_chain(&mut self) -> Result<usize> {
        self.store.migrate_schema(CURRENT_SCHEMA_VERSION)?;
        self.store.save()?;
        let transformed = legacy::migrate_plan_exercise_data(&mut *self.store)?;
        integrity::validate_data_integrity(&*self.store, &self.options)?;
        Ok(transformed)
    }

    /// Put the backup back and reload. Returns whether the file was restored.
    fn roll_back(&mut self) -> bool {
        let restored = match self.backups.restore_from_backup() {
            Ok(restored) => restored,
            Err(err) => {
                tracing::error!(error = %err, "restore from backup failed");
                false
            }
        };

        if let Err(err) = self.store.discard_changes() {
            tracing::error!(error = %err, "could not reload store after restore");
        }

        // A failed restore keeps the backup for the next start.
        if restored {
            if let Err(err) = self.backups.discard_backup() {
                tracing::warn!(error = %err, "could not remove migration backup");
            }
        }
        restored
    }

    /// Read-only check of every record.
    pub fn validate_data_integrity(&self) -> Result<()> {
        integrity::validate_data_integrity(&*self.store, &self.options)
    }

    /// Validate and sweep on failure. Returns whether corruption was handled.
    pub fn detect_and_handle_corruption(&mut self) -> Result<bool> {
        integrity::detect_and_handle_corruption(&mut *self.store, &self.options)
    }

    /// Full startup pass. Never fails.
    pub fn initialize_migration_support(&mut self) -> StartupReport {
        let migration = match self.run_migration() {
            Ok(outcome) => outcome,
            Err(failed) => MigrationOutcome::Failed {
                error: failed.error.to_string(),
                restored: failed.restored,
            },
        };

        let mut report = StartupReport {
            migration,
            integrity_error: None,
            corruption_cleaned: false,
        };

        if let Err(err) = self.validate_data_integrity() {
            tracing::warn!(error = %err, "store failed integrity check");
            report.integrity_error = Some(err.to_string());

            match self.detect_and_handle_corruption() {
                Ok(true) => {
                    tracing::info!("invalid records removed");
                    report.corruption_cleaned = true;
                }
                Ok(false) => tracing::info!("no invalid records found on rescan"),
                Err(err) => tracing::error!(error = %err, "corruption recovery failed"),
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;
    use uuid::Uuid;

    use crate::storage::types::{ExerciseMetadata, RecordKind};
    use crate::storage::SqliteRecordStore;

    #[test]
    fn test_current_store_needs_nothing() {
        let dir = tempdir().unwrap();
        let mut store = SqliteRecordStore::create(&dir.path().join("liftlog.store")).unwrap();

        let report = MigrationSupport::new(&mut store, ValidationOptions::default())
            .initialize_migration_support();
        assert_eq!(report.migration, MigrationOutcome::NotNeeded);
        assert!(report.is_clean());
        assert!(!report.corruption_cleaned);
    }

    #[test]
    fn test_invalid_record_triggers_sweep() {
        let dir = tempdir().unwrap();
        let mut store = SqliteRecordStore::create(&dir.path().join("liftlog.store")).unwrap();
        store
            .insert_exercise_metadata(&ExerciseMetadata {
                exercise_id: Uuid::new_v4(),
                name: "Lunge".to_string(),
                last_used: Utc::now() + Duration::days(10),
                usage_count: 1,
                personal_notes: None,
                custom_weight: 0.0,
            })
            .unwrap();
        store.save().unwrap();

        let report = MigrationSupport::new(&mut store, ValidationOptions::default())
            .initialize_migration_support();
        assert!(report
            .integrity_error
            .as_deref()
            .unwrap()
            .contains("last_used is in the future"));
        assert!(report.corruption_cleaned);
        assert_eq!(store.count(RecordKind::ExerciseMetadata).unwrap(), 0);
    }
}
