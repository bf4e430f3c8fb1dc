//! Assignment (solution) model.
//!
//! A solved roster is a set of (person, date, on_base) records, one per
//! person and day of the window. Violations describe hard rules that a
//! candidate roster breaks; a valid roster has none.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::PersonId;

/// One person's duty state on one date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    /// Assigned person.
    pub person_id: PersonId,
    /// Calendar date.
    pub date: NaiveDate,
    /// `true` = on-base, `false` = at-home.
    pub on_base: bool,
}

impl Assignment {
    /// Creates a new assignment.
    pub fn new(person_id: impl Into<String>, date: NaiveDate, on_base: bool) -> Self {
        Self {
            person_id: person_id.into(),
            date,
            on_base,
        }
    }
}

/// Per-date view of a solved roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRoster {
    /// Calendar date.
    pub date: NaiveDate,
    /// Persons on-base, in roster order.
    pub on_base: Vec<PersonId>,
    /// Persons at home, in roster order.
    pub at_home: Vec<PersonId>,
}

impl DayRoster {
    /// Groups assignments by date, preserving their relative order.
    ///
    /// Dates appear in ascending order.
    pub fn group(assignments: &[Assignment]) -> Vec<DayRoster> {
        let mut days: Vec<DayRoster> = Vec::new();
        let mut sorted: Vec<&Assignment> = assignments.iter().collect();
        sorted.sort_by_key(|a| a.date);

        for a in sorted {
            let needs_new = days.last().map_or(true, |d| d.date != a.date);
            if needs_new {
                days.push(DayRoster {
                    date: a.date,
                    on_base: Vec::new(),
                    at_home: Vec::new(),
                });
            }
            if let Some(day) = days.last_mut() {
                if a.on_base {
                    day.on_base.push(a.person_id.clone());
                } else {
                    day.at_home.push(a.person_id.clone());
                }
            }
        }
        days
    }
}

/// A broken hard rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Type of violation.
    pub violation_type: ViolationType,
    /// Related person, if the rule is per person.
    pub person_id: Option<PersonId>,
    /// Related date, if the rule is per day.
    pub date: Option<NaiveDate>,
    /// Human-readable description.
    pub message: String,
}

/// Classification of hard-rule violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// On-base on an unavailable date.
    Unavailable,
    /// Fewer persons on-base than the day's floor.
    StaffingShortfall,
    /// On-base total outside the person's workload range.
    WorkloadOutOfRange,
    /// More home days than the configured total cap.
    HomeCapExceeded,
    /// On-base streak longer than the cap.
    ConsecutiveBaseExceeded,
    /// At-home streak longer than the cap.
    ConsecutiveHomeExceeded,
    /// On-base block shorter than the minimum.
    BlockTooShort,
    /// More weekend on-base days than the per-person cap.
    WeekendCapExceeded,
    /// Weekend-only person on-base on a weekday, or over their cap.
    WeekendOnlyBreach,
    /// Exceptional person's home days outside their range, or too many
    /// exceptional persons home together.
    ExceptionalBreach,
    /// A (person, day) pair has no value.
    MissingAssignment,
    /// A row for a person or date outside the run, or a second row for a pair.
    UnexpectedAssignment,
}

impl Violation {
    /// Creates a violation.
    pub fn new(violation_type: ViolationType, message: impl Into<String>) -> Self {
        Self {
            violation_type,
            person_id: None,
            date: None,
            message: message.into(),
        }
    }

    /// Attaches the related person.
    pub fn for_person(mut self, person_id: impl Into<String>) -> Self {
        self.person_id = Some(person_id.into());
        self
    }

    /// Attaches the related date.
    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}
