//! Core data types for the record store.
//!
//! Numeric fields are signed and unchecked so out-of-range values on disk
//! load intact. Invariants live in [`crate::integrity::rules`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LiftlogError, Result};

/// The four persisted record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Equipment,
    WorkoutPlan,
    PlanExercise,
    ExerciseMetadata,
}

impl RecordKind {
    /// All kinds, in the order the integrity passes visit them.
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Equipment,
        RecordKind::WorkoutPlan,
        RecordKind::PlanExercise,
        RecordKind::ExerciseMetadata,
    ];

    /// Entity name used in diagnostics.
    pub fn entity_name(self) -> &'static str {
        match self {
            RecordKind::Equipment => "Equipment",
            RecordKind::WorkoutPlan => "WorkoutPlan",
            RecordKind::PlanExercise => "PlanExercise",
            RecordKind::ExerciseMetadata => "ExerciseMetadata",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_name())
    }
}

/// Stable key of a persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub kind: RecordKind,
    pub id: String,
}

impl RecordKey {
    pub fn new(kind: RecordKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// A piece of equipment the user owns or has selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub equipment_id: String,
    pub name: String,
    pub category: String,
    pub is_selected: bool,
    pub date_added: DateTime<Utc>,
}

impl Equipment {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(RecordKind::Equipment, self.equipment_id.clone())
    }
}

/// A saved workout plan. `plan_data` is the serialized exercise list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPlan {
    pub plan_id: Uuid,
    pub name: String,
    pub created_date: DateTime<Utc>,
    pub last_used_date: Option<DateTime<Utc>>,
    pub exercise_count: i64,
    pub plan_data: String,
}

impl WorkoutPlan {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(RecordKind::WorkoutPlan, self.plan_id.to_string())
    }

    /// Build a plan whose payload and count are derived from `exercises`.
    pub fn from_exercises(
        plan_id: Uuid,
        name: impl Into<String>,
        created_date: DateTime<Utc>,
        exercises: &[PlannedExercise],
    ) -> serde_json::Result<Self> {
        Ok(Self {
            plan_id,
            name: name.into(),
            created_date,
            last_used_date: None,
            exercise_count: exercises.len() as i64,
            plan_data: serde_json::to_string(exercises)?,
        })
    }
}

/// One exercise inside a plan's serialized payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedExercise {
    pub name: String,
    pub rest_time: i64,
    #[serde(default)]
    pub sets: Vec<ExerciseSet>,
}

/// Intensity category of a single set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetType {
    WarmUp,
    Normal,
    CoolDown,
}

/// A single set, embedded in a PlanExercise's `sets_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSet {
    pub set_number: i64,
    pub reps: i64,
    pub weight: f64,
    pub set_type: SetType,
}

/// Pre-upgrade flat set description.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegacySets {
    pub sets: i64,
    pub reps: i64,
    pub weight: f64,
}

/// How a PlanExercise stores its sets.
#[derive(Debug, Clone, PartialEq)]
pub enum SetLayout {
    /// Flat `sets`/`reps`/`weight` trio written by schema v1.
    Legacy(LegacySets),
    /// Serialized list of [`ExerciseSet`].
    Structured { sets_data: String },
}

impl SetLayout {
    /// Encode `sets` into the structured layout.
    pub fn structured(sets: &[ExerciseSet]) -> serde_json::Result<Self> {
        Ok(SetLayout::Structured {
            sets_data: serde_json::to_string(sets)?,
        })
    }
}

/// An exercise entry belonging to a plan editor session.
///
/// `layout` is `None` when neither shape is present on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanExercise {
    pub id: Uuid,
    pub name: String,
    pub rest_time: i64,
    pub order_index: i64,
    pub layout: Option<SetLayout>,
}

impl PlanExercise {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(RecordKind::PlanExercise, self.id.to_string())
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self.layout, Some(SetLayout::Legacy(_)))
    }
}

/// Usage statistics and personal notes for one exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseMetadata {
    pub exercise_id: Uuid,
    pub name: String,
    pub last_used: DateTime<Utc>,
    pub usage_count: i64,
    pub personal_notes: Option<String>,
    pub custom_weight: f64,
}

impl ExerciseMetadata {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(RecordKind::ExerciseMetadata, self.exercise_id.to_string())
    }
}

/// A stored row whose key is readable but whose fields do not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableRecord {
    pub key: RecordKey,
    pub reason: String,
}

impl fmt::Display for UnreadableRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.reason)
    }
}

/// Every row of one kind, parsed where possible.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordScan<T> {
    pub records: Vec<T>,
    pub unreadable: Vec<UnreadableRecord>,
}

impl<T> Default for RecordScan<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            unreadable: Vec::new(),
        }
    }
}

impl<T> RecordScan<T> {
    /// The parsed records, failing on the first unreadable row.
    ///
    /// # Errors
    ///
    /// Returns `LiftlogError::Storage` naming the first unreadable row.
    pub fn into_records(self) -> Result<Vec<T>> {
        match self.unreadable.into_iter().next() {
            Some(unreadable) => Err(LiftlogError::Storage(unreadable.to_string())),
            None => Ok(self.records),
        }
    }
}

/// Which PlanExercise layout a query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutFilter {
    Legacy,
    Structured,
}

/// Filter for querying plan exercises.
#[derive(Debug, Clone, Default)]
pub struct PlanExerciseFilter {
    /// Restrict to one layout
    pub layout: Option<LayoutFilter>,

    /// Maximum number of results
    pub limit: Option<usize>,
}

impl PlanExerciseFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn legacy_only() -> Self {
        Self::new().layout(LayoutFilter::Legacy)
    }

    pub fn layout(mut self, layout: LayoutFilter) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
