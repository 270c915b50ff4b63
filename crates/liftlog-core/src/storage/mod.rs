//! Record store abstractions and the SQLite implementation.

pub mod sqlite;
pub mod traits;
pub mod types;

pub use sqlite::{SqliteRecordStore, CURRENT_SCHEMA_VERSION};
pub use traits::RecordStore;
pub use types::{
    Equipment, ExerciseMetadata, ExerciseSet, LayoutFilter, LegacySets, PlanExercise,
    PlanExerciseFilter, PlannedExercise, RecordKey, RecordKind, RecordScan, SetLayout, SetType,
    UnreadableRecord, WorkoutPlan,
};
