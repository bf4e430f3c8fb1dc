//! Event override definitions.
//!
//! Events (trainings, holidays, operational surges) can override selected
//! parameters for a date range and a subset of persons. Only events whose
//! override flag is set take part in resolution.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{DateWindow, PersonId};

/// Parameters an event may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKey {
    /// Daily floor (day scoped).
    MinRequiredPerDay,
    /// On-base target (person scoped).
    BaseDaysTarget,
    /// Total home-day cap (person scoped).
    MaxTotalHomeDays,
    /// Consecutive on-base cap (person scoped).
    MaxConsecutiveBaseDays,
    /// Consecutive at-home cap (person scoped).
    MaxConsecutiveHomeDays,
    /// Minimum on-base block (person scoped).
    MinBaseBlockDays,
}

impl ParameterKey {
    /// Every key.
    pub const ALL: [ParameterKey; 6] = [
        Self::MinRequiredPerDay,
        Self::BaseDaysTarget,
        Self::MaxTotalHomeDays,
        Self::MaxConsecutiveBaseDays,
        Self::MaxConsecutiveHomeDays,
        Self::MinBaseBlockDays,
    ];

    /// Whether the key is resolved per day rather than per person.
    pub fn is_day_scoped(self) -> bool {
        matches!(self, Self::MinRequiredPerDay)
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MinRequiredPerDay => "min_required_per_day",
            Self::BaseDaysTarget => "base_days_target",
            Self::MaxTotalHomeDays => "max_total_home_days",
            Self::MaxConsecutiveBaseDays => "max_consecutive_base_days",
            Self::MaxConsecutiveHomeDays => "max_consecutive_home_days",
            Self::MinBaseBlockDays => "min_base_block_days",
        };
        f.write_str(name)
    }
}

/// Fields an event overrides; `None` leaves the value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterOverrides {
    /// Daily floor during the event.
    pub min_required_per_day: Option<u32>,
    /// On-base target for targeted persons.
    pub base_days_target: Option<u32>,
    /// Total home-day cap for targeted persons.
    pub max_total_home_days: Option<u32>,
    /// Consecutive on-base cap for targeted persons.
    pub max_consecutive_base_days: Option<u32>,
    /// Consecutive at-home cap for targeted persons.
    pub max_consecutive_home_days: Option<u32>,
    /// Minimum on-base block for targeted persons.
    pub min_base_block_days: Option<u32>,
}

impl ParameterOverrides {
    /// Value set for a key, if any.
    pub fn get(&self, key: ParameterKey) -> Option<u32> {
        match key {
            ParameterKey::MinRequiredPerDay => self.min_required_per_day,
            ParameterKey::BaseDaysTarget => self.base_days_target,
            ParameterKey::MaxTotalHomeDays => self.max_total_home_days,
            ParameterKey::MaxConsecutiveBaseDays => self.max_consecutive_base_days,
            ParameterKey::MaxConsecutiveHomeDays => self.max_consecutive_home_days,
            ParameterKey::MinBaseBlockDays => self.min_base_block_days,
        }
    }

    /// Sets the value for a key.
    pub fn set(&mut self, key: ParameterKey, value: u32) {
        let slot = match key {
            ParameterKey::MinRequiredPerDay => &mut self.min_required_per_day,
            ParameterKey::BaseDaysTarget => &mut self.base_days_target,
            ParameterKey::MaxTotalHomeDays => &mut self.max_total_home_days,
            ParameterKey::MaxConsecutiveBaseDays => &mut self.max_consecutive_base_days,
            ParameterKey::MaxConsecutiveHomeDays => &mut self.max_consecutive_home_days,
            ParameterKey::MinBaseBlockDays => &mut self.min_base_block_days,
        };
        *slot = Some(value);
    }
}

/// An event that may override parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOverride {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Higher priority wins conflicts.
    #[serde(default)]
    pub priority: i32,
    /// Only flagged events override anything.
    #[serde(default)]
    pub override_active: bool,
    /// First affected day (inclusive).
    pub start: NaiveDate,
    /// Last affected day (inclusive).
    pub end: NaiveDate,
    /// Targeted persons; empty targets everyone.
    #[serde(default)]
    pub persons: Vec<PersonId>,
    /// Overridden values.
    #[serde(default)]
    pub overrides: ParameterOverrides,
}

impl EventOverride {
    /// Creates an active event over `[start, end]` targeting everyone.
    pub fn new(id: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            priority: 0,
            override_active: true,
            start,
            end,
            persons: Vec::new(),
            overrides: ParameterOverrides::default(),
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Restricts the event to the given persons.
    pub fn for_persons(mut self, persons: Vec<PersonId>) -> Self {
        self.persons = persons;
        self
    }

    /// Sets an overridden value.
    pub fn with_value(mut self, key: ParameterKey, value: u32) -> Self {
        self.overrides.set(key, value);
        self
    }

    /// Clears the override flag.
    pub fn inactive(mut self) -> Self {
        self.override_active = false;
        self
    }

    /// Days of the event inside `window`, if any.
    pub fn span_within(&self, window: &DateWindow) -> Option<DateWindow> {
        if self.start > self.end {
            return None;
        }
        DateWindow {
            start: self.start,
            end: self.end,
        }
        .intersection(window)
    }

    /// Whether the event targets a person.
    pub fn targets(&self, person_id: &str) -> bool {
        self.persons.is_empty() || self.persons.iter().any(|p| p == person_id)
    }
}

/// Cell a resolved value applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterScope {
    /// A person, for the whole window.
    Person(PersonId),
    /// A day, for the whole roster.
    Day(NaiveDate),
}

impl fmt::Display for ParameterScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Person(id) => write!(f, "person {id}"),
            Self::Day(date) => write!(f, "day {date}"),
        }
    }
}

/// Audit record: which event set a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedParameter {
    /// Overridden key.
    pub key: ParameterKey,
    /// Affected cell.
    pub scope: ParameterScope,
    /// Effective value.
    pub value: u32,
    /// Winning event.
    pub event_id: String,
}

/// A losing event value, kept as a penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftOverride {
    /// Overridden key.
    pub key: ParameterKey,
    /// Affected cell.
    pub scope: ParameterScope,
    /// The losing event's value.
    pub value: u32,
    /// The losing event.
    pub event_id: String,
    /// The event whose value won.
    pub winner_event_id: String,
}
