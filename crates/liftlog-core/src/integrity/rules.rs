//! Per-record invariants.
//!
//! Every `check_*` function is pure apart from diagnostics and returns all
//! violations of one record in rule order. The validator reports the first;
//! the sweep deletes any record with at least one.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::storage::types::{
    Equipment, ExerciseMetadata, ExerciseSet, LegacySets, PlanExercise, PlannedExercise,
    RecordKey, SetLayout, WorkoutPlan,
};

/// Upper bound on the flat `sets` count of a legacy record.
pub const MAX_LEGACY_SETS: i64 = 100;

/// Knobs for rules whose strictness is a product decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Treat a plan whose `exercise_count` disagrees with its payload as invalid.
    pub strict_exercise_count: bool,
}

/// A single broken invariant.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Empty(&'static str),
    FutureDate(&'static str),
    Negative(&'static str),
    NotPositive(&'static str),
    TooLarge {
        field: &'static str,
        max: i64,
    },
    Undecodable {
        field: &'static str,
        reason: String,
    },
    /// The stored row could not be parsed into its record type.
    Unparsable {
        reason: String,
    },
    NoSets,
    MissingSetLayout,
    InvalidEntry {
        field: &'static str,
        position: usize,
        rule: Box<Rule>,
    },
    ExerciseCountMismatch {
        recorded: i64,
        actual: usize,
    },
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Empty(field) => write!(f, "{} must not be empty", field),
            Rule::FutureDate(field) => write!(f, "{} is in the future", field),
            Rule::Negative(field) => write!(f, "{} must not be negative", field),
            Rule::NotPositive(field) => write!(f, "{} must be greater than zero", field),
            Rule::TooLarge { field, max } => write!(f, "{} must not exceed {}", field, max),
            Rule::Undecodable { field, reason } => {
                write!(f, "{} cannot be decoded: {}", field, reason)
            }
            Rule::Unparsable { reason } => write!(f, "cannot be read: {}", reason),
            Rule::NoSets => write!(f, "sets_data must hold at least one set"),
            Rule::MissingSetLayout => {
                write!(f, "neither legacy sets nor sets_data are present")
            }
            Rule::InvalidEntry {
                field,
                position,
                rule,
            } => write!(f, "{}[{}]: {}", field, position, rule),
            Rule::ExerciseCountMismatch { recorded, actual } => write!(
                f,
                "exercise_count is {} but plan_data holds {} exercises",
                recorded, actual
            ),
        }
    }
}

/// A broken invariant on a specific record.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub key: RecordKey,
    pub rule: Rule,
}

impl Violation {
    pub fn new(key: RecordKey, rule: Rule) -> Self {
        Self { key, rule }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.rule)
    }
}

fn valid_weight(weight: f64) -> bool {
    weight.is_finite() && weight >= 0.0
}

fn check_not_future(
    rules: &mut Vec<Rule>,
    field: &'static str,
    value: DateTime<Utc>,
    now: DateTime<Utc>,
) {
    if value > now {
        rules.push(Rule::FutureDate(field));
    }
}

fn check_name(rules: &mut Vec<Rule>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        rules.push(Rule::Empty(field));
    }
}

fn attach(key: RecordKey, rules: Vec<Rule>) -> Vec<Violation> {
    rules
        .into_iter()
        .map(|rule| Violation::new(key.clone(), rule))
        .collect()
}

/// Invariants of one embedded set.
pub fn check_set(set: &ExerciseSet) -> Vec<Rule> {
    let mut rules = Vec::new();
    if set.set_number <= 0 {
        rules.push(Rule::NotPositive("set_number"));
    }
    if set.reps <= 0 {
        rules.push(Rule::NotPositive("reps"));
    }
    if !valid_weight(set.weight) {
        rules.push(Rule::Negative("weight"));
    }
    rules
}

/// Invariants of the flat pre-upgrade layout.
pub fn check_legacy_sets(legacy: &LegacySets) -> Vec<Rule> {
    let mut rules = Vec::new();
    if legacy.sets <= 0 {
        rules.push(Rule::NotPositive("sets"));
    } else if legacy.sets > MAX_LEGACY_SETS {
        rules.push(Rule::TooLarge {
            field: "sets",
            max: MAX_LEGACY_SETS,
        });
    }
    if legacy.reps <= 0 {
        rules.push(Rule::NotPositive("reps"));
    }
    if !valid_weight(legacy.weight) {
        rules.push(Rule::Negative("weight"));
    }
    rules
}

fn check_set_list(rules: &mut Vec<Rule>, field: &'static str, sets: &[ExerciseSet]) {
    for (position, set) in sets.iter().enumerate() {
        rules.extend(check_set(set).into_iter().map(|rule| Rule::InvalidEntry {
            field,
            position,
            rule: Box::new(rule),
        }));
    }
}

fn check_planned_exercise(exercise: &PlannedExercise) -> Vec<Rule> {
    let mut rules = Vec::new();
    check_name(&mut rules, "name", &exercise.name);
    if exercise.rest_time < 0 {
        rules.push(Rule::Negative("rest_time"));
    }
    check_set_list(&mut rules, "sets", &exercise.sets);
    rules
}

pub fn check_equipment(equipment: &Equipment, now: DateTime<Utc>) -> Vec<Violation> {
    let mut rules = Vec::new();
    check_name(&mut rules, "equipment_id", &equipment.equipment_id);
    check_name(&mut rules, "name", &equipment.name);
    check_not_future(&mut rules, "date_added", equipment.date_added, now);
    attach(equipment.key(), rules)
}

pub fn check_plan(
    plan: &WorkoutPlan,
    now: DateTime<Utc>,
    options: &ValidationOptions,
) -> Vec<Violation> {
    let mut rules = Vec::new();
    check_name(&mut rules, "name", &plan.name);
    check_not_future(&mut rules, "created_date", plan.created_date, now);
    if let Some(last_used) = plan.last_used_date {
        check_not_future(&mut rules, "last_used_date", last_used, now);
    }
    if plan.exercise_count < 0 {
        rules.push(Rule::Negative("exercise_count"));
    }

    match serde_json::from_str::<Vec<PlannedExercise>>(&plan.plan_data) {
        Ok(exercises) => {
            for (position, exercise) in exercises.iter().enumerate() {
                rules.extend(check_planned_exercise(exercise).into_iter().map(|rule| {
                    Rule::InvalidEntry {
                        field: "plan_data",
                        position,
                        rule: Box::new(rule),
                    }
                }));
            }

            if plan.exercise_count >= 0 && plan.exercise_count as usize != exercises.len() {
                if options.strict_exercise_count {
                    rules.push(Rule::ExerciseCountMismatch {
                        recorded: plan.exercise_count,
                        actual: exercises.len(),
                    });
                } else {
                    tracing::warn!(
                        plan = %plan.plan_id,
                        recorded = plan.exercise_count,
                        actual = exercises.len(),
                        "plan exercise_count is stale"
                    );
                }
            }
        }
        Err(err) => rules.push(Rule::Undecodable {
            field: "plan_data",
            reason: err.to_string(),
        }),
    }

    attach(plan.key(), rules)
}

/// Payload rules run before the fields common to both layouts.
pub fn check_plan_exercise(exercise: &PlanExercise) -> Vec<Violation> {
    let mut rules = Vec::new();

    match &exercise.layout {
        Some(SetLayout::Structured { sets_data }) => {
            match serde_json::from_str::<Vec<ExerciseSet>>(sets_data) {
                Ok(sets) if sets.is_empty() => rules.push(Rule::NoSets),
                Ok(sets) => check_set_list(&mut rules, "sets_data", &sets),
                Err(err) => rules.push(Rule::Undecodable {
                    field: "sets_data",
                    reason: err.to_string(),
                }),
            }
        }
        Some(SetLayout::Legacy(legacy)) => rules.extend(check_legacy_sets(legacy)),
        None => rules.push(Rule::MissingSetLayout),
    }

    check_name(&mut rules, "name", &exercise.name);
    if exercise.rest_time < 0 {
        rules.push(Rule::Negative("rest_time"));
    }
    if exercise.order_index < 0 {
        rules.push(Rule::Negative("order_index"));
    }

    attach(exercise.key(), rules)
}

pub fn check_exercise_metadata(metadata: &ExerciseMetadata, now: DateTime<Utc>) -> Vec<Violation> {
    let mut rules = Vec::new();
    check_name(&mut rules, "name", &metadata.name);
    check_not_future(&mut rules, "last_used", metadata.last_used, now);
    if metadata.usage_count < 0 {
        rules.push(Rule::Negative("usage_count"));
    }
    if !valid_weight(metadata.custom_weight) {
        rules.push(Rule::Negative("custom_weight"));
    }
    attach(metadata.key(), rules)
}
