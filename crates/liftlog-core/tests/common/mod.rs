#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use rusqlite::Connection;
use tempfile::TempDir;
use uuid::Uuid;

use liftlog_core::storage::types::{Equipment, ExerciseMetadata};
use liftlog_core::SqliteRecordStore;

pub struct Scratch {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl Scratch {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir should be available");
        let path = dir.path().join("liftlog.store");
        Self { dir, path }
    }

    pub fn backup_path(&self) -> PathBuf {
        self.dir.path().join("liftlog.store.backup")
    }

    pub fn bytes(&self) -> Vec<u8> {
        std::fs::read(&self.path).expect("store file should be readable")
    }
}

/// A legacy plan exercise row as schema v1 stored it.
pub struct LegacyRow {
    pub id: Uuid,
    pub name: &'static str,
    pub sets: i64,
    pub reps: i64,
    pub weight: f64,
}

impl LegacyRow {
    pub fn new(name: &'static str, sets: i64, reps: i64, weight: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            sets,
            reps,
            weight,
        }
    }
}

/// Write a schema v1 store at `path` holding `rows`.
pub fn write_v1_store(path: &Path, rows: &[LegacyRow]) {
    drop(SqliteRecordStore::create(path).expect("create should succeed"));

    let conn = Connection::open(path).expect("raw open should succeed");
    conn.execute_batch(
        r#"
        DROP TABLE plan_exercises;
        CREATE TABLE plan_exercises (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            rest_time INTEGER NOT NULL DEFAULT 0,
            order_index INTEGER NOT NULL DEFAULT 0,
            sets INTEGER NOT NULL DEFAULT 0,
            reps INTEGER NOT NULL DEFAULT 0,
            weight REAL NOT NULL DEFAULT 0
        );
        UPDATE meta SET value = '1' WHERE key = 'schema_version';
        "#,
    )
    .expect("v1 rewrite should succeed");

    for (order_index, row) in rows.iter().enumerate() {
        conn.execute(
            "INSERT INTO plan_exercises (id, name, rest_time, order_index, sets, reps, weight)
             VALUES (?, ?, 90, ?, ?, ?, ?)",
            (
                row.id.to_string(),
                row.name,
                order_index as i64,
                row.sets,
                row.reps,
                row.weight,
            ),
        )
        .expect("legacy insert should succeed");
    }
}

/// Run raw SQL against a closed store file.
pub fn tamper(path: &Path, sql: &str) {
    let conn = Connection::open(path).expect("raw open should succeed");
    conn.execute_batch(sql).expect("tamper should succeed");
}

pub fn equipment(id: &str) -> Equipment {
    Equipment {
        equipment_id: id.to_string(),
        name: format!("{} (owned)", id),
        category: "free_weights".to_string(),
        is_selected: true,
        date_added: Utc::now() - Duration::days(14),
    }
}

pub fn metadata(name: &str, usage_count: i64) -> ExerciseMetadata {
    ExerciseMetadata {
        exercise_id: Uuid::new_v4(),
        name: name.to_string(),
        last_used: Utc::now() - Duration::days(1),
        usage_count,
        personal_notes: None,
        custom_weight: 10.0,
    }
}
