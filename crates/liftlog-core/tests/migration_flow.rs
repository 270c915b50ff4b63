mod common;

use common::{write_v1_store, LegacyRow, Scratch};

use liftlog_core::migration::{BackupManager, MigrationOutcome, MigrationSupport};
use liftlog_core::storage::types::{ExerciseSet, PlanExerciseFilter, SetLayout, SetType};
use liftlog_core::{
    LiftlogError, RecordStore, SqliteRecordStore, ValidationOptions, CURRENT_SCHEMA_VERSION,
};

fn startup(path: &std::path::Path) -> (SqliteRecordStore, liftlog_core::StartupReport) {
    let mut store = SqliteRecordStore::open(path).expect("open should succeed");
    let report = MigrationSupport::new(&mut store, ValidationOptions::default())
        .initialize_migration_support();
    (store, report)
}

#[test]
fn test_legacy_exercise_round_trip() {
    let scratch = Scratch::new();
    let row = LegacyRow::new("Bench press", 3, 8, 20.0);
    let id = row.id;
    write_v1_store(&scratch.path, &[row]);

    let (store, report) = startup(&scratch.path);

    assert_eq!(report.migration, MigrationOutcome::Migrated { transformed: 1 });
    assert!(report.is_clean());
    assert_eq!(store.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    assert!(!scratch.backup_path().exists());

    let exercises = store
        .list_plan_exercises(&PlanExerciseFilter::new())
        .expect("list should succeed");
    assert_eq!(exercises.len(), 1);
    assert_eq!(exercises[0].id, id);

    let sets: Vec<ExerciseSet> = match &exercises[0].layout {
        Some(SetLayout::Structured { sets_data }) => {
            serde_json::from_str(sets_data).expect("sets_data should decode")
        }
        other => panic!("expected structured layout, got {other:?}"),
    };
    assert_eq!(sets.len(), 3);
    for (index, set) in sets.iter().enumerate() {
        assert_eq!(set.set_number, index as i64 + 1);
        assert_eq!(set.reps, 8);
        assert_eq!(set.weight, 20.0);
        assert_eq!(set.set_type, SetType::Normal);
    }

    liftlog_core::integrity::validate_data_integrity(&store, &ValidationOptions::default())
        .expect("migrated store should validate");
}

#[test]
fn test_second_startup_changes_nothing() {
    let scratch = Scratch::new();
    write_v1_store(
        &scratch.path,
        &[
            LegacyRow::new("Squat", 5, 5, 100.0),
            LegacyRow::new("Row", 3, 10, 40.0),
        ],
    );

    let (_, first) = startup(&scratch.path);
    assert_eq!(first.migration, MigrationOutcome::Migrated { transformed: 2 });
    let after_first = scratch.bytes();

    let (_, second) = startup(&scratch.path);
    assert_eq!(second.migration, MigrationOutcome::NotNeeded);
    assert!(second.is_clean());
    assert_eq!(scratch.bytes(), after_first);
}

#[test]
fn test_failed_conversion_restores_original_bytes() {
    let scratch = Scratch::new();
    write_v1_store(
        &scratch.path,
        &[
            LegacyRow::new("Deadlift", 3, 5, 140.0),
            LegacyRow::new("Broken", 3, 0, 10.0),
        ],
    );
    let original = scratch.bytes();

    let mut store = SqliteRecordStore::open(&scratch.path).unwrap();
    let err = MigrationSupport::new(&mut store, ValidationOptions::default())
        .migrate_if_needed()
        .unwrap_err();

    match err {
        LiftlogError::MigrationFailed(inner) => {
            assert!(matches!(*inner, LiftlogError::ValidationFailed(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(scratch.bytes(), original);
    assert_eq!(store.schema_version().unwrap(), 1);
    assert!(!store.has_changes());
    assert!(!scratch.backup_path().exists());
}

#[test]
fn test_failed_migration_recovers_on_next_start() {
    let scratch = Scratch::new();
    write_v1_store(
        &scratch.path,
        &[
            LegacyRow::new("Deadlift", 3, 5, 140.0),
            LegacyRow::new("Broken", 3, 0, 10.0),
        ],
    );

    let (store, first) = startup(&scratch.path);
    assert!(matches!(
        first.migration,
        MigrationOutcome::Failed { restored: true, .. }
    ));
    assert!(first.integrity_error.is_some());
    assert!(first.corruption_cleaned);
    assert_eq!(store.schema_version().unwrap(), 1);
    drop(store);

    let (store, second) = startup(&scratch.path);
    assert_eq!(second.migration, MigrationOutcome::Migrated { transformed: 1 });
    assert!(second.is_clean());
    assert_eq!(
        store
            .count_plan_exercises(&PlanExerciseFilter::legacy_only())
            .unwrap(),
        0
    );
}

#[test]
fn test_oversized_legacy_sets_roll_back_instead_of_crashing() {
    let scratch = Scratch::new();
    write_v1_store(
        &scratch.path,
        &[
            LegacyRow::new("Bench", i64::MAX, 8, 20.0),
            LegacyRow::new("Row", 3, 10, 40.0),
        ],
    );

    let (store, first) = startup(&scratch.path);
    match &first.migration {
        MigrationOutcome::Failed { error, restored } => {
            assert!(*restored);
            assert!(error.contains("sets must not exceed"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!scratch.backup_path().exists());
    assert_eq!(store.schema_version().unwrap(), 1);
    assert!(first.corruption_cleaned);
    let remaining: Vec<String> = store
        .list_plan_exercises(&PlanExerciseFilter::new())
        .unwrap()
        .into_iter()
        .map(|exercise| exercise.name)
        .collect();
    assert_eq!(remaining, vec!["Row"]);
    drop(store);

    let (_, second) = startup(&scratch.path);
    assert_eq!(second.migration, MigrationOutcome::Migrated { transformed: 1 });
    assert!(second.is_clean());
}

#[test]
fn test_backup_failure_aborts_before_mutation() {
    let scratch = Scratch::new();
    write_v1_store(&scratch.path, &[LegacyRow::new("Curl", 3, 12, 12.5)]);
    let original = scratch.bytes();

    let unwritable = scratch.dir.path().join("missing-dir").join("liftlog.store.backup");
    let backups = BackupManager::with_backup_path(&scratch.path, unwritable.clone());

    let mut store = SqliteRecordStore::open(&scratch.path).unwrap();
    let err = MigrationSupport::new(&mut store, ValidationOptions::default())
        .with_backup_manager(backups)
        .migrate_if_needed()
        .unwrap_err();

    match err {
        LiftlogError::MigrationFailed(inner) => {
            assert!(matches!(*inner, LiftlogError::BackupFailed(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(scratch.bytes(), original);
    assert_eq!(store.schema_version().unwrap(), 1);
    assert!(!unwritable.exists());
}

#[test]
fn test_restore_without_backup_leaves_store() {
    let scratch = Scratch::new();
    write_v1_store(&scratch.path, &[]);
    let original = scratch.bytes();

    let backups = BackupManager::for_store(&scratch.path);
    assert!(!backups.restore_from_backup().unwrap());
    assert_eq!(scratch.bytes(), original);
}
