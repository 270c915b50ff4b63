//! Table layout and forward migrations for the SQLite record store.
//!
//! A fresh store is created at v1 and then walked through every step in
//! [`MIGRATIONS`], so new and upgraded stores end up with identical tables.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::error::{LiftlogError, Result};
use crate::storage::types::RecordKind;

/// Schema version the running code reads and writes.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

const SCHEMA_V1: &str = r#"
    CREATE TABLE meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE equipment (
        equipment_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        is_selected INTEGER NOT NULL DEFAULT 0,
        date_added TEXT NOT NULL
    );

    CREATE TABLE workout_plans (
        plan_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        created_date TEXT NOT NULL,
        last_used_date TEXT,
        exercise_count INTEGER NOT NULL DEFAULT 0,
        plan_data TEXT NOT NULL
    );

    -- Flat set description; superseded by sets_data in v2
    CREATE TABLE plan_exercises (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        rest_time INTEGER NOT NULL DEFAULT 0,
        order_index INTEGER NOT NULL DEFAULT 0,
        sets INTEGER NOT NULL DEFAULT 0,
        reps INTEGER NOT NULL DEFAULT 0,
        weight REAL NOT NULL DEFAULT 0
    );

    CREATE TABLE exercise_metadata (
        exercise_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        last_used TEXT NOT NULL,
        usage_count INTEGER NOT NULL DEFAULT 0,
        personal_notes TEXT,
        custom_weight REAL NOT NULL DEFAULT 0
    );
"#;

/// Forward steps, keyed by the version they produce.
const MIGRATIONS: &[(u32, &str)] = &[(
    2,
    "ALTER TABLE plan_exercises ADD COLUMN sets_data TEXT;",
)];

/// Table holding the extent of `kind`.
pub(crate) fn table_name(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Equipment => "equipment",
        RecordKind::WorkoutPlan => "workout_plans",
        RecordKind::PlanExercise => "plan_exercises",
        RecordKind::ExerciseMetadata => "exercise_metadata",
    }
}

/// Primary key column of `kind`'s table.
pub(crate) fn key_column(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Equipment => "equipment_id",
        RecordKind::WorkoutPlan => "plan_id",
        RecordKind::PlanExercise => "id",
        RecordKind::ExerciseMetadata => "exercise_id",
    }
}

/// Create every table at the current version and seed metadata.
pub(crate) fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_V1)?;

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;
    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('created_at', ?)",
        [&now],
    )?;
    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('last_modified', ?)",
        [&now],
    )?;

    apply_migrations(conn, 1, CURRENT_SCHEMA_VERSION)
}

/// Read the recorded schema version.
pub(crate) fn read_version(conn: &Connection) -> Result<u32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| LiftlogError::Schema(format!("Metadata unreadable: {}", e)))?;
    let value =
        value.ok_or_else(|| LiftlogError::Schema("schema_version missing".to_string()))?;
    value
        .trim()
        .parse()
        .map_err(|_| LiftlogError::Schema(format!("Invalid schema_version '{}'", value)))
}

/// Run every step in `(from, to]` and record `to` as the new version.
///
/// Callers wrap this in a transaction.
pub(crate) fn apply_migrations(conn: &Connection, from: u32, to: u32) -> Result<()> {
    for version in (from + 1)..=to {
        let (_, sql) = MIGRATIONS
            .iter()
            .find(|(target, _)| *target == version)
            .ok_or_else(|| {
                LiftlogError::Schema(format!("No migration path to schema v{}", version))
            })?;
        conn.execute_batch(sql)
            .map_err(|e| LiftlogError::Schema(format!("Migration to v{} failed: {}", version, e)))?;
    }

    let updated = conn.execute(
        "UPDATE meta SET value = ? WHERE key = 'schema_version'",
        [to.to_string()],
    )?;
    if updated == 0 {
        return Err(LiftlogError::Schema("schema_version missing".to_string()));
    }
    Ok(())
}

/// Whether `table` has a column named `column`.
pub(crate) fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
