//! Rewrites legacy PlanExercise records into the structured set layout.

use crate::error::{LiftlogError, Result};
use crate::integrity::rules::check_legacy_sets;
use crate::storage::traits::RecordStore;
use crate::storage::types::{
    ExerciseSet, LegacySets, PlanExercise, PlanExerciseFilter, SetLayout, SetType,
};

/// Expand a flat `sets`/`reps`/`weight` trio into numbered sets.
///
/// `legacy` must already pass [`check_legacy_sets`], which bounds `sets`.
pub fn expand_legacy_sets(legacy: &LegacySets) -> Vec<ExerciseSet> {
    (1..=legacy.sets.max(0))
        .map(|set_number| ExerciseSet {
            set_number,
            reps: legacy.reps,
            weight: legacy.weight,
            set_type: SetType::Normal,
        })
        .collect()
}

fn rewrite(exercise: &PlanExercise, legacy: LegacySets) -> Result<PlanExercise> {
    if let Some(rule) = check_legacy_sets(&legacy).into_iter().next() {
        return Err(LiftlogError::ValidationFailed(format!(
            "{}: {}",
            exercise.key(),
            rule
        )));
    }

    Ok(PlanExercise {
        layout: Some(SetLayout::structured(&expand_legacy_sets(&legacy))?),
        ..exercise.clone()
    })
}

/// Convert every legacy PlanExercise and save once.
///
/// All records are checked before any is rewritten, so an invalid record
/// leaves the store untouched. Returns the number of records converted.
///
/// # Errors
///
/// Returns `LiftlogError::ValidationFailed` naming the first legacy record
/// whose numerics cannot be converted.
pub fn migrate_plan_exercise_data<S>(store: &mut S) -> Result<usize>
where
    S: RecordStore + ?Sized,
{
    let legacy = store.list_plan_exercises(&PlanExerciseFilter::legacy_only())?;
    if legacy.is_empty() {
        tracing::debug!("no legacy plan exercises to convert");
        return Ok(0);
    }

    let mut rewritten = Vec::with_capacity(legacy.len());
    for exercise in &legacy {
        if let Some(SetLayout::Legacy(sets)) = &exercise.layout {
            rewritten.push(rewrite(exercise, *sets)?);
        }
    }

    let applied = rewritten
        .iter()
        .try_for_each(|exercise| store.update_plan_exercise(exercise))
        .and_then(|()| store.save());
    if let Err(err) = applied {
        if let Err(discard_err) = store.discard_changes() {
            tracing::error!(error = %discard_err, "could not discard partial conversion");
        }
        return Err(err);
    }

    tracing::info!(count = rewritten.len(), "converted legacy plan exercises");
    Ok(rewritten.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use uuid::Uuid;

    use crate::storage::types::RecordKind;
    use crate::storage::SqliteRecordStore;

    fn legacy_exercise(sets: i64, reps: i64, weight: f64) -> PlanExercise {
        PlanExercise {
            id: Uuid::new_v4(),
            name: "Overhead press".to_string(),
            rest_time: 120,
            order_index: 0,
            layout: Some(SetLayout::Legacy(LegacySets { sets, reps, weight })),
        }
    }

    #[test]
    fn test_expand_numbers_sets_from_one() {
        let sets = expand_legacy_sets(&LegacySets {
            sets: 3,
            reps: 8,
            weight: 20.0,
        });
        let numbers: Vec<i64> = sets.iter().map(|set| set.set_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(sets
            .iter()
            .all(|set| set.reps == 8 && set.weight == 20.0 && set.set_type == SetType::Normal));
    }

    #[test]
    fn test_oversized_legacy_sets_rejected_before_expansion() {
        let dir = tempdir().unwrap();
        let mut store = SqliteRecordStore::create(&dir.path().join("liftlog.store")).unwrap();
        let huge = legacy_exercise(i64::MAX, 8, 20.0);
        store.insert_plan_exercise(&huge).unwrap();
        store.save().unwrap();

        let err = migrate_plan_exercise_data(&mut store).unwrap_err();
        assert!(matches!(err, LiftlogError::ValidationFailed(_)));
        assert!(err.to_string().contains("sets must not exceed"));
        assert_eq!(
            store
                .count_plan_exercises(&PlanExerciseFilter::legacy_only())
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_migrate_converts_and_saves() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("liftlog.store");
        let mut store = SqliteRecordStore::create(&path).unwrap();
        let exercise = legacy_exercise(4, 5, 60.0);
        store.insert_plan_exercise(&exercise).unwrap();
        store.save().unwrap();

        assert_eq!(migrate_plan_exercise_data(&mut store).unwrap(), 1);
        assert!(!store.has_changes());

        let reopened = SqliteRecordStore::open(&path).unwrap();
        let stored = reopened
            .list_plan_exercises(&PlanExerciseFilter::new())
            .unwrap();
        match &stored[0].layout {
            Some(SetLayout::Structured { sets_data }) => {
                let sets: Vec<ExerciseSet> = serde_json::from_str(sets_data).unwrap();
                assert_eq!(sets.len(), 4);
            }
            other => panic!("unexpected layout: {other:?}"),
        }
        assert_eq!(stored[0].name, exercise.name);
    }

    #[test]
    fn test_migrate_without_legacy_records_is_noop() {
        let dir = tempdir().unwrap();
        let mut store = SqliteRecordStore::create(&dir.path().join("liftlog.store")).unwrap();
        assert_eq!(migrate_plan_exercise_data(&mut store).unwrap(), 0);
        assert!(!store.has_changes());
    }

    #[test]
    fn test_invalid_legacy_record_fails_whole_conversion() {
        let dir = tempdir().unwrap();
        let mut store = SqliteRecordStore::create(&dir.path().join("liftlog.store")).unwrap();
        let good = legacy_exercise(3, 10, 0.0);
        let bad = legacy_exercise(3, 0, 15.0);
        store.insert_plan_exercise(&good).unwrap();
        store.insert_plan_exercise(&bad).unwrap();
        store.save().unwrap();

        let err = migrate_plan_exercise_data(&mut store).unwrap_err();
        assert!(matches!(err, LiftlogError::ValidationFailed(_)));
        assert!(err.to_string().contains(&bad.id.to_string()));

        assert!(!store.has_changes());
        assert_eq!(
            store
                .count_plan_exercises(&PlanExerciseFilter::legacy_only())
                .unwrap(),
            store.count(RecordKind::PlanExercise).unwrap()
        );
    }
}
