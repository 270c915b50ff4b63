//! SQLite record store backend.
//!
//! The database is held in memory while the store is open. Mutations stay
//! pending until `save`, which serializes the whole database and replaces the
//! store file atomically. `discard_changes` reloads the file, so the on-disk
//! bytes are always the last successfully saved state.

mod row;
mod schema;

pub use schema::CURRENT_SCHEMA_VERSION;

use std::fs;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::serialize::OwnedData;
use rusqlite::{Connection, DatabaseName, Row};

use crate::error::{LiftlogError, Result};
use crate::storage::traits::RecordStore;
use crate::storage::types::{
    Equipment, ExerciseMetadata, LayoutFilter, LegacySets, PlanExercise, PlanExerciseFilter,
    RecordKey, RecordKind, RecordScan, SetLayout, UnreadableRecord, WorkoutPlan,
};

use row::{EquipmentRow, ExerciseMetadataRow, PlanExerciseRow, WorkoutPlanRow};

/// SQLite-backed record store persisted as a single file.
pub struct SqliteRecordStore {
    path: PathBuf,
    conn: Mutex<Connection>,
    dirty: bool,
}

fn poisoned() -> LiftlogError {
    LiftlogError::Storage("SQLite connection poisoned".to_string())
}

/// Read every row of `sql`. SQLite-level failures abort the scan; a row that
/// reads but does not parse is recorded under its raw key.
fn scan_rows<R, T>(
    conn: &Connection,
    sql: &str,
    from_row: fn(&Row<'_>) -> rusqlite::Result<R>,
    key_of: fn(&R) -> RecordKey,
) -> Result<RecordScan<T>>
where
    T: TryFrom<R, Error = LiftlogError>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], from_row)?;
    let mut scan = RecordScan::default();
    for row in rows {
        let row = row?;
        let key = key_of(&row);
        match T::try_from(row) {
            Ok(record) => scan.records.push(record),
            Err(err) => {
                let reason = match err {
                    LiftlogError::Storage(message) => message,
                    other => other.to_string(),
                };
                tracing::debug!(record = %key, reason = %reason, "row does not parse");
                scan.unreadable.push(UnreadableRecord { key, reason });
            }
        }
    }
    Ok(scan)
}

/// Legacy numerics and structured payload to write for `layout`.
fn layout_columns(layout: &Option<SetLayout>) -> (LegacySets, Option<&str>) {
    let cleared = LegacySets {
        sets: 0,
        reps: 0,
        weight: 0.0,
    };
    match layout {
        Some(SetLayout::Legacy(legacy)) => (*legacy, None),
        Some(SetLayout::Structured { sets_data }) => (cleared, Some(sets_data.as_str())),
        None => (cleared, None),
    }
}

impl SqliteRecordStore {
    /// Create a new store file at the current schema version.
    ///
    /// # Errors
    ///
    /// Returns `LiftlogError::Storage` if the file already exists.
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(LiftlogError::Storage(
                "Store file already exists".to_string(),
            ));
        }

        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Self::persist(&conn, path)?;
        tracing::info!(path = %path.display(), "created record store");

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
            dirty: false,
        })
    }

    /// Open an existing store file.
    ///
    /// # Errors
    ///
    /// Returns `LiftlogError::StoreNotFound` if the file does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Self::load(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
            dirty: false,
        })
    }

    /// Open the store file, creating it first if it does not exist yet.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Lock the database connection, returning an error if the mutex is poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| poisoned())
    }

    fn load(path: &Path) -> Result<Connection> {
        if !path.exists() {
            return Err(LiftlogError::StoreNotFound);
        }

        let bytes = fs::read(path)?;
        let mut conn = Connection::open_in_memory()?;
        let owned_data = Self::owned_data_from_bytes(&bytes)?;
        conn.deserialize(DatabaseName::Main, owned_data, false)?;
        Ok(conn)
    }

    fn persist(conn: &Connection, path: &Path) -> Result<()> {
        let data = conn.serialize(DatabaseName::Main)?;
        crate::fs::write_atomic(path, &data)
            .map_err(|e| LiftlogError::Storage(format!("Store write failed: {}", e)))
    }

    fn owned_data_from_bytes(bytes: &[u8]) -> Result<OwnedData> {
        if bytes.is_empty() {
            return Err(LiftlogError::Storage("Store file is empty".to_string()));
        }

        let size: i32 = bytes
            .len()
            .try_into()
            .map_err(|_| LiftlogError::Storage("Store file too large".to_string()))?;

        // SAFETY: sqlite3_malloc returns a valid pointer or null; null is
        // checked below. `size` has been validated to fit in i32.
        let raw = unsafe { rusqlite::ffi::sqlite3_malloc(size) as *mut u8 };
        let ptr = NonNull::new(raw)
            .ok_or_else(|| LiftlogError::Storage("SQLite allocation failed".to_string()))?;

        // SAFETY:
        // - `ptr` was allocated above with exactly `bytes.len()` bytes
        // - the source slice is valid for `bytes.len()` reads and cannot
        //   overlap freshly allocated memory
        // - `OwnedData` takes ownership of the sqlite3_malloc'd buffer and
        //   SQLite frees it
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len());
            Ok(OwnedData::from_raw_nonnull(ptr, bytes.len()))
        }
    }

    /// SELECT expression for `sets_data`; v1 stores have no such column.
    fn sets_data_expr(conn: &Connection) -> Result<&'static str> {
        if schema::table_has_column(conn, "plan_exercises", "sets_data")? {
            Ok("sets_data")
        } else {
            Ok("NULL")
        }
    }

    fn plan_exercise_condition(sets_data_expr: &str, filter: &PlanExerciseFilter) -> String {
        match filter.layout {
            Some(LayoutFilter::Legacy) => format!(
                " WHERE {} IS NULL AND (sets != 0 OR reps != 0 OR weight != 0)",
                sets_data_expr
            ),
            Some(LayoutFilter::Structured) => format!(" WHERE {} IS NOT NULL", sets_data_expr),
            None => String::new(),
        }
    }
}

impl RecordStore for SqliteRecordStore {
    fn location(&self) -> &Path {
        &self.path
    }

    fn schema_version(&self) -> Result<u32> {
        let conn = self.lock_conn()?;
        schema::read_version(&conn)
    }

    fn migrate_schema(&mut self, target: u32) -> Result<()> {
        let current = self.schema_version()?;
        if target == current {
            return Ok(());
        }
        if target < current {
            return Err(LiftlogError::Schema(format!(
                "Cannot downgrade schema v{} to v{}",
                current, target
            )));
        }

        let conn = self.conn.get_mut().map_err(|_| poisoned())?;
        let tx = conn.transaction()?;
        schema::apply_migrations(&tx, current, target)?;
        tx.commit()?;
        self.dirty = true;

        tracing::info!(from = current, to = target, "applied schema migration");
        Ok(())
    }

    fn scan_equipment(&self) -> Result<RecordScan<Equipment>> {
        let conn = self.lock_conn()?;
        scan_rows(
            &conn,
            &format!(
                "SELECT {} FROM equipment ORDER BY rowid",
                EquipmentRow::COLUMNS
            ),
            EquipmentRow::from_row,
            EquipmentRow::key,
        )
    }

    fn scan_plans(&self) -> Result<RecordScan<WorkoutPlan>> {
        let conn = self.lock_conn()?;
        scan_rows(
            &conn,
            &format!(
                "SELECT {} FROM workout_plans ORDER BY rowid",
                WorkoutPlanRow::COLUMNS
            ),
            WorkoutPlanRow::from_row,
            WorkoutPlanRow::key,
        )
    }

    fn scan_plan_exercises(
        &self,
        filter: &PlanExerciseFilter,
    ) -> Result<RecordScan<PlanExercise>> {
        let conn = self.lock_conn()?;
        let sets_data = Self::sets_data_expr(&conn)?;

        let mut query = format!(
            "SELECT {}, {} AS sets_data FROM plan_exercises",
            PlanExerciseRow::BASE_COLUMNS,
            sets_data
        );
        query.push_str(&Self::plan_exercise_condition(sets_data, filter));
        query.push_str(" ORDER BY order_index, rowid");
        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }

        scan_rows(
            &conn,
            &query,
            PlanExerciseRow::from_row,
            PlanExerciseRow::key,
        )
    }

    fn scan_exercise_metadata(&self) -> Result<RecordScan<ExerciseMetadata>> {
        let conn = self.lock_conn()?;
        scan_rows(
            &conn,
            &format!(
                "SELECT {} FROM exercise_metadata ORDER BY rowid",
                ExerciseMetadataRow::COLUMNS
            ),
            ExerciseMetadataRow::from_row,
            ExerciseMetadataRow::key,
        )
    }

    fn count(&self, kind: RecordKind) -> Result<u64> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", schema::table_name(kind)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_plan_exercises(&self, filter: &PlanExerciseFilter) -> Result<u64> {
        let conn = self.lock_conn()?;
        let sets_data = Self::sets_data_expr(&conn)?;
        let query = format!(
            "SELECT COUNT(*) FROM plan_exercises{}",
            Self::plan_exercise_condition(sets_data, filter)
        );
        let count: i64 = conn.query_row(&query, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn insert_equipment(&mut self, equipment: &Equipment) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO equipment (equipment_id, name, category, is_selected, date_added)
            VALUES (?, ?, ?, ?, ?)
            "#,
            (
                &equipment.equipment_id,
                &equipment.name,
                &equipment.category,
                equipment.is_selected,
                equipment.date_added.to_rfc3339(),
            ),
        )?;
        drop(conn);
        self.dirty = true;
        Ok(())
    }

    fn insert_plan(&mut self, plan: &WorkoutPlan) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO workout_plans (
                plan_id,
                name,
                created_date,
                last_used_date,
                exercise_count,
                plan_data
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            (
                plan.plan_id.to_string(),
                &plan.name,
                plan.created_date.to_rfc3339(),
                plan.last_used_date.map(|date| date.to_rfc3339()),
                plan.exercise_count,
                &plan.plan_data,
            ),
        )?;
        drop(conn);
        self.dirty = true;
        Ok(())
    }

    fn insert_plan_exercise(&mut self, exercise: &PlanExercise) -> Result<()> {
        let conn = self.lock_conn()?;
        let (legacy, sets_data) = layout_columns(&exercise.layout);

        if Self::sets_data_expr(&conn)? == "sets_data" {
            conn.execute(
                r#"
                INSERT INTO plan_exercises (
                    id, name, rest_time, order_index, sets, reps, weight, sets_data
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                (
                    exercise.id.to_string(),
                    &exercise.name,
                    exercise.rest_time,
                    exercise.order_index,
                    legacy.sets,
                    legacy.reps,
                    legacy.weight,
                    sets_data,
                ),
            )?;
        } else {
            if sets_data.is_some() {
                return Err(LiftlogError::Schema(
                    "Store schema predates structured sets".to_string(),
                ));
            }
            conn.execute(
                r#"
                INSERT INTO plan_exercises (id, name, rest_time, order_index, sets, reps, weight)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
                (
                    exercise.id.to_string(),
                    &exercise.name,
                    exercise.rest_time,
                    exercise.order_index,
                    legacy.sets,
                    legacy.reps,
                    legacy.weight,
                ),
            )?;
        }
        drop(conn);
        self.dirty = true;
        Ok(())
    }

    fn insert_exercise_metadata(&mut self, metadata: &ExerciseMetadata) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO exercise_metadata (
                exercise_id,
                name,
                last_used,
                usage_count,
                personal_notes,
                custom_weight
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            (
                metadata.exercise_id.to_string(),
                &metadata.name,
                metadata.last_used.to_rfc3339(),
                metadata.usage_count,
                &metadata.personal_notes,
                metadata.custom_weight,
            ),
        )?;
        drop(conn);
        self.dirty = true;
        Ok(())
    }

    fn update_plan_exercise(&mut self, exercise: &PlanExercise) -> Result<()> {
        let conn = self.lock_conn()?;
        let (legacy, sets_data) = layout_columns(&exercise.layout);

        if Self::sets_data_expr(&conn)? != "sets_data" {
            return Err(LiftlogError::Schema(
                "Store schema predates structured sets".to_string(),
            ));
        }

        let updated = conn.execute(
            r#"
            UPDATE plan_exercises
            SET name = ?, rest_time = ?, order_index = ?, sets = ?, reps = ?, weight = ?,
                sets_data = ?
            WHERE id = ?
            "#,
            (
                &exercise.name,
                exercise.rest_time,
                exercise.order_index,
                legacy.sets,
                legacy.reps,
                legacy.weight,
                sets_data,
                exercise.id.to_string(),
            ),
        )?;
        if updated == 0 {
            return Err(LiftlogError::Storage(format!(
                "Plan exercise {} not found",
                exercise.id
            )));
        }
        drop(conn);
        self.dirty = true;
        Ok(())
    }

    fn delete(&mut self, key: &RecordKey) -> Result<bool> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?",
                schema::table_name(key.kind),
                schema::key_column(key.kind)
            ),
            [&key.id],
        )?;
        drop(conn);
        if removed > 0 {
            self.dirty = true;
        }
        Ok(removed > 0)
    }

    fn delete_all(&mut self, kind: RecordKind) -> Result<u64> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(&format!("DELETE FROM {}", schema::table_name(kind)), [])?;
        drop(conn);
        if removed > 0 {
            self.dirty = true;
        }
        Ok(removed as u64)
    }

    fn has_changes(&self) -> bool {
        self.dirty
    }

    fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let conn = self.lock_conn()?;
        if let Err(err) = conn.execute(
            "UPDATE meta SET value = ? WHERE key = 'last_modified'",
            [Utc::now().to_rfc3339()],
        ) {
            tracing::warn!(error = %err, "could not stamp last_modified");
        }
        Self::persist(&conn, &self.path)?;
        drop(conn);

        self.dirty = false;
        tracing::debug!(path = %self.path.display(), "saved record store");
        Ok(())
    }

    fn discard_changes(&mut self) -> Result<()> {
        let conn = Self::load(&self.path)?;
        self.conn = Mutex::new(conn);
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), "reloaded record store from disk");
        Ok(())
    }
}
