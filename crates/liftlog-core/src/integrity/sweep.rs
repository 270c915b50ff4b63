//! Best-effort removal of invalid records.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;

use crate::error::Result;
use crate::integrity::rules::ValidationOptions;
use crate::integrity::{validate_data_integrity, violations_for_kind};
use crate::storage::traits::RecordStore;
use crate::storage::types::RecordKind;

/// What a sweep removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records deleted per kind
    pub deleted: BTreeMap<RecordKind, u64>,

    /// Kinds that could not be enumerated and were emptied wholesale
    pub purged: Vec<RecordKind>,

    /// Kinds that could neither be enumerated nor emptied
    pub unrecoverable: Vec<RecordKind>,
}

impl SweepReport {
    pub fn total_deleted(&self) -> u64 {
        self.deleted.values().sum()
    }

    /// Whether the sweep deleted anything. Unrecoverable kinds do not count.
    pub fn removed_any(&self) -> bool {
        self.total_deleted() > 0 || !self.purged.is_empty()
    }
}

/// Delete every record that violates an invariant, then save once.
///
/// A kind that cannot be enumerated is emptied with one batch delete. Other
/// kinds are unaffected by a failure in one kind.
///
/// # Errors
///
/// Returns an error if a per-record delete or the final save fails. Pending
/// deletions are discarded in that case.
pub fn sweep_corrupted_records<S>(store: &mut S, options: &ValidationOptions) -> Result<SweepReport>
where
    S: RecordStore + ?Sized,
{
    match sweep_inner(store, options) {
        Ok(report) => Ok(report),
        Err(err) => {
            if let Err(discard_err) = store.discard_changes() {
                tracing::error!(error = %discard_err, "could not discard partial sweep");
            }
            Err(err)
        }
    }
}

fn sweep_inner<S>(store: &mut S, options: &ValidationOptions) -> Result<SweepReport>
where
    S: RecordStore + ?Sized,
{
    let now = Utc::now();
    let mut report = SweepReport::default();

    for kind in RecordKind::ALL {
        match violations_for_kind(&*store, kind, now, options) {
            Ok(violations) => {
                let mut seen = HashSet::new();
                let mut removed = 0;
                for violation in &violations {
                    if !seen.insert(violation.key.clone()) {
                        continue;
                    }
                    tracing::warn!(
                        record = %violation.key,
                        rule = %violation.rule,
                        "deleting invalid record"
                    );
                    if store.delete(&violation.key)? {
                        removed += 1;
                    }
                }
                if removed > 0 {
                    report.deleted.insert(kind, removed);
                }
            }
            Err(err) => {
                tracing::error!(kind = %kind, error = %err, "kind unreadable; deleting all records");
                match store.delete_all(kind) {
                    Ok(removed) => {
                        report.purged.push(kind);
                        report.deleted.insert(kind, removed);
                    }
                    Err(delete_err) => {
                        tracing::error!(
                            kind = %kind,
                            error = %delete_err,
                            "could not delete unreadable records"
                        );
                        report.unrecoverable.push(kind);
                    }
                }
            }
        }
    }

    store.save()?;

    if report.removed_any() || !report.unrecoverable.is_empty() {
        tracing::info!(
            deleted = report.total_deleted(),
            purged = report.purged.len(),
            unrecoverable = report.unrecoverable.len(),
            "corruption sweep finished"
        );
    }
    Ok(report)
}

/// Validate, and sweep if validation fails.
///
/// Returns `true` only if the sweep deleted at least one record or emptied
/// an unreadable kind.
pub fn detect_and_handle_corruption<S>(store: &mut S, options: &ValidationOptions) -> Result<bool>
where
    S: RecordStore + ?Sized,
{
    match validate_data_integrity(&*store, options) {
        Ok(()) => Ok(false),
        Err(err) => {
            tracing::warn!(error = %err, "integrity check failed; sweeping invalid records");
            let report = sweep_corrupted_records(store, options)?;
            Ok(report.removed_any())
        }
    }
}
