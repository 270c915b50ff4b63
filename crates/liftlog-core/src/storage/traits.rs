//! Record store trait definition.
//!
//! The `RecordStore` trait is the boundary between the migration/integrity
//! engine and whatever persists the records. The engine only reads, rewrites
//! in place, or deletes through this interface.

use std::path::Path;

use super::types::{
    Equipment, ExerciseMetadata, PlanExercise, PlanExerciseFilter, RecordKey, RecordKind,
    RecordScan, WorkoutPlan,
};
use crate::error::Result;

/// Persistent store for the four record kinds.
///
/// All implementations must ensure:
/// - Mutations are pending until [`RecordStore::save`] succeeds
/// - `save` replaces the store file atomically
/// - [`RecordStore::discard_changes`] returns the store to its last saved state
pub trait RecordStore: Send {
    /// Path of the primary store file.
    fn location(&self) -> &Path;

    /// Schema version recorded in the store's metadata.
    ///
    /// # Errors
    ///
    /// Returns `LiftlogError::Schema` if the metadata is missing or unparsable.
    fn schema_version(&self) -> Result<u32>;

    /// Upgrade the store's schema to `target`, recording the new version.
    ///
    /// The change is pending until `save`.
    fn migrate_schema(&mut self, target: u32) -> Result<()>;

    // --- Scan ---
    //
    // A row whose key can be read but whose fields cannot be parsed lands in
    // `RecordScan::unreadable`. An error means the extent itself is unreadable.

    fn scan_equipment(&self) -> Result<RecordScan<Equipment>>;

    fn scan_plans(&self) -> Result<RecordScan<WorkoutPlan>>;

    fn scan_plan_exercises(
        &self,
        filter: &PlanExerciseFilter,
    ) -> Result<RecordScan<PlanExercise>>;

    fn scan_exercise_metadata(&self) -> Result<RecordScan<ExerciseMetadata>>;

    // --- Fetch by predicate (any unreadable row is an error) ---

    fn list_equipment(&self) -> Result<Vec<Equipment>> {
        self.scan_equipment()?.into_records()
    }

    fn list_plans(&self) -> Result<Vec<WorkoutPlan>> {
        self.scan_plans()?.into_records()
    }

    fn list_plan_exercises(&self, filter: &PlanExerciseFilter) -> Result<Vec<PlanExercise>> {
        self.scan_plan_exercises(filter)?.into_records()
    }

    fn list_exercise_metadata(&self) -> Result<Vec<ExerciseMetadata>> {
        self.scan_exercise_metadata()?.into_records()
    }

    // --- Count by predicate ---

    /// Count all records of `kind`.
    fn count(&self, kind: RecordKind) -> Result<u64>;

    /// Count plan exercises matching `filter` (`limit` is ignored).
    fn count_plan_exercises(&self, filter: &PlanExerciseFilter) -> Result<u64>;

    // --- Mutations (pending until save) ---

    fn insert_equipment(&mut self, equipment: &Equipment) -> Result<()>;

    fn insert_plan(&mut self, plan: &WorkoutPlan) -> Result<()>;

    fn insert_plan_exercise(&mut self, exercise: &PlanExercise) -> Result<()>;

    fn insert_exercise_metadata(&mut self, metadata: &ExerciseMetadata) -> Result<()>;

    /// Rewrite an existing plan exercise in place.
    ///
    /// # Errors
    ///
    /// Returns `LiftlogError::Storage` if no record has that id.
    fn update_plan_exercise(&mut self, exercise: &PlanExercise) -> Result<()>;

    /// Delete one record. Returns `false` if it did not exist.
    fn delete(&mut self, key: &RecordKey) -> Result<bool>;

    /// Delete the whole extent of `kind` without reading it.
    ///
    /// Returns the number of rows removed.
    fn delete_all(&mut self, kind: RecordKind) -> Result<u64>;

    // --- Persistence ---

    /// Whether there are unsaved mutations.
    fn has_changes(&self) -> bool;

    /// Atomically persist pending mutations. A no-op when nothing is pending.
    fn save(&mut self) -> Result<()>;

    /// Drop pending mutations by reloading the last saved state from disk.
    fn discard_changes(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trait_usable_as_bound() {
        fn _accepts_store<S: RecordStore>(_store: &mut S) {}
    }
}
