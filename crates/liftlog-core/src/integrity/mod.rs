//! Integrity checking and recovery for persisted records.
//!
//! [`validate_data_integrity`] is read-only and stops at the first problem.
//! [`sweep::sweep_corrupted_records`] deletes what the validator would reject.

pub mod rules;
pub mod sweep;

pub use rules::{Rule, ValidationOptions, Violation};
pub use sweep::{detect_and_handle_corruption, sweep_corrupted_records, SweepReport};

use chrono::{DateTime, Utc};

use crate::error::{LiftlogError, Result};
use crate::storage::traits::RecordStore;
use crate::storage::types::{PlanExerciseFilter, RecordKind, RecordScan};

/// Unparsable rows first, then the violations of each parsed record.
fn checked<T>(scan: RecordScan<T>, check: impl Fn(&T) -> Vec<Violation>) -> Vec<Violation> {
    let mut violations: Vec<Violation> = scan
        .unreadable
        .into_iter()
        .map(|row| Violation::new(row.key, Rule::Unparsable { reason: row.reason }))
        .collect();
    violations.extend(scan.records.iter().flat_map(|record| check(record)));
    violations
}

/// Every violation of every record of `kind`.
///
/// A row that cannot be parsed is reported as [`Rule::Unparsable`] under its
/// raw key, so it can be deleted on its own.
///
/// # Errors
///
/// Returns `LiftlogError::DataCorruption` naming `kind` if the extent cannot
/// be enumerated.
pub fn violations_for_kind<S>(
    store: &S,
    kind: RecordKind,
    now: DateTime<Utc>,
    options: &ValidationOptions,
) -> Result<Vec<Violation>>
where
    S: RecordStore + ?Sized,
{
    let corrupt = |err: LiftlogError| LiftlogError::DataCorruption(format!("{}: {}", kind, err));

    let violations = match kind {
        RecordKind::Equipment => checked(store.scan_equipment().map_err(corrupt)?, |equipment| {
            rules::check_equipment(equipment, now)
        }),
        RecordKind::WorkoutPlan => checked(store.scan_plans().map_err(corrupt)?, |plan| {
            rules::check_plan(plan, now, options)
        }),
        RecordKind::PlanExercise => checked(
            store
                .scan_plan_exercises(&PlanExerciseFilter::new())
                .map_err(corrupt)?,
            rules::check_plan_exercise,
        ),
        RecordKind::ExerciseMetadata => {
            checked(store.scan_exercise_metadata().map_err(corrupt)?, |metadata| {
                rules::check_exercise_metadata(metadata, now)
            })
        }
    };
    Ok(violations)
}

/// Check every record of every kind without modifying anything.
///
/// Kinds are visited in [`RecordKind::ALL`] order.
///
/// # Errors
///
/// - `LiftlogError::DataCorruption` if a kind cannot be enumerated
/// - `LiftlogError::ValidationFailed` describing the first violation found
pub fn validate_data_integrity<S>(store: &S, options: &ValidationOptions) -> Result<()>
where
    S: RecordStore + ?Sized,
{
    let now = Utc::now();
    for kind in RecordKind::ALL {
        let violations = violations_for_kind(store, kind, now, options)?;
        if let Some(first) = violations.first() {
            return Err(LiftlogError::ValidationFailed(first.to_string()));
        }
        tracing::debug!(kind = %kind, "integrity pass clean");
    }
    Ok(())
}
