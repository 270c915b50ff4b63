//! Raw row types for store queries, before parsing into domain types.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use crate::error::{LiftlogError, Result};
use crate::storage::types::{
    Equipment, ExerciseMetadata, LegacySets, PlanExercise, RecordKey, RecordKind, SetLayout,
    WorkoutPlan,
};

fn parse_uuid(value: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| LiftlogError::Storage(format!("Invalid {} UUID '{}': {}", field, value, e)))
}

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| LiftlogError::Storage(format!("Invalid {} timestamp: {}", field, e)))?
        .with_timezone(&Utc))
}

#[derive(Debug)]
pub struct EquipmentRow {
    pub equipment_id: String,
    pub name: String,
    pub category: String,
    pub is_selected: bool,
    pub date_added: String,
}

impl EquipmentRow {
    /// Key built from the raw id column, readable even if parsing fails.
    pub fn key(&self) -> RecordKey {
        RecordKey::new(RecordKind::Equipment, self.equipment_id.clone())
    }

    pub const COLUMNS: &'static str = "equipment_id, name, category, is_selected, date_added";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            equipment_id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            is_selected: row.get(3)?,
            date_added: row.get(4)?,
        })
    }
}

impl TryFrom<EquipmentRow> for Equipment {
    type Error = LiftlogError;

    fn try_from(row: EquipmentRow) -> Result<Self> {
        let date_added = parse_timestamp(&row.date_added, "date_added")?;
        Ok(Equipment {
            equipment_id: row.equipment_id,
            name: row.name,
            category: row.category,
            is_selected: row.is_selected,
            date_added,
        })
    }
}

#[derive(Debug)]
pub struct WorkoutPlanRow {
    pub plan_id: String,
    pub name: String,
    pub created_date: String,
    pub last_used_date: Option<String>,
    pub exercise_count: i64,
    pub plan_data: String,
}

impl WorkoutPlanRow {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(RecordKind::WorkoutPlan, self.plan_id.clone())
    }

    pub const COLUMNS: &'static str =
        "plan_id, name, created_date, last_used_date, exercise_count, plan_data";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            plan_id: row.get(0)?,
            name: row.get(1)?,
            created_date: row.get(2)?,
            last_used_date: row.get(3)?,
            exercise_count: row.get(4)?,
            plan_data: row.get(5)?,
        })
    }
}

impl TryFrom<WorkoutPlanRow> for WorkoutPlan {
    type Error = LiftlogError;

    fn try_from(row: WorkoutPlanRow) -> Result<Self> {
        let plan_id = parse_uuid(&row.plan_id, "plan_id")?;
        let created_date = parse_timestamp(&row.created_date, "created_date")?;
        let last_used_date = row
            .last_used_date
            .as_deref()
            .map(|value| parse_timestamp(value, "last_used_date"))
            .transpose()?;

        Ok(WorkoutPlan {
            plan_id,
            name: row.name,
            created_date,
            last_used_date,
            exercise_count: row.exercise_count,
            plan_data: row.plan_data,
        })
    }
}

/// Plan exercise row. `sets_data` is selected as NULL on v1 stores.
#[derive(Debug)]
pub struct PlanExerciseRow {
    pub id: String,
    pub name: String,
    pub rest_time: i64,
    pub order_index: i64,
    pub sets: i64,
    pub reps: i64,
    pub weight: f64,
    pub sets_data: Option<String>,
}

impl PlanExerciseRow {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(RecordKind::PlanExercise, self.id.clone())
    }

    pub const BASE_COLUMNS: &'static str = "id, name, rest_time, order_index, sets, reps, weight";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            rest_time: row.get(2)?,
            order_index: row.get(3)?,
            sets: row.get(4)?,
            reps: row.get(5)?,
            weight: row.get(6)?,
            sets_data: row.get(7)?,
        })
    }

    fn layout(&self) -> Option<SetLayout> {
        if let Some(ref sets_data) = self.sets_data {
            return Some(SetLayout::Structured {
                sets_data: sets_data.clone(),
            });
        }
        if self.sets != 0 || self.reps != 0 || self.weight != 0.0 {
            return Some(SetLayout::Legacy(LegacySets {
                sets: self.sets,
                reps: self.reps,
                weight: self.weight,
            }));
        }
        None
    }
}

impl TryFrom<PlanExerciseRow> for PlanExercise {
    type Error = LiftlogError;

    fn try_from(row: PlanExerciseRow) -> Result<Self> {
        let id = parse_uuid(&row.id, "plan exercise")?;
        let layout = row.layout();
        Ok(PlanExercise {
            id,
            name: row.name,
            rest_time: row.rest_time,
            order_index: row.order_index,
            layout,
        })
    }
}

#[derive(Debug)]
pub struct ExerciseMetadataRow {
    pub exercise_id: String,
    pub name: String,
    pub last_used: String,
    pub usage_count: i64,
    pub personal_notes: Option<String>,
    pub custom_weight: f64,
}

impl ExerciseMetadataRow {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(RecordKind::ExerciseMetadata, self.exercise_id.clone())
    }

    pub const COLUMNS: &'static str =
        "exercise_id, name, last_used, usage_count, personal_notes, custom_weight";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            exercise_id: row.get(0)?,
            name: row.get(1)?,
            last_used: row.get(2)?,
            usage_count: row.get(3)?,
            personal_notes: row.get(4)?,
            custom_weight: row.get(5)?,
        })
    }
}

impl TryFrom<ExerciseMetadataRow> for ExerciseMetadata {
    type Error = LiftlogError;

    fn try_from(row: ExerciseMetadataRow) -> Result<Self> {
        let exercise_id = parse_uuid(&row.exercise_id, "exercise_id")?;
        let last_used = parse_timestamp(&row.last_used, "last_used")?;
        Ok(ExerciseMetadata {
            exercise_id,
            name: row.name,
            last_used,
            usage_count: row.usage_count,
            personal_notes: row.personal_notes,
            custom_weight: row.custom_weight,
        })
    }
}
