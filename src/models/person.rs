//! Personnel and unavailability models.
//!
//! A [`Person`] is anyone who can be placed on-base. Persons come in three
//! kinds that change which rules apply to them:
//!
//! | Kind | Workload rule | Weekdays |
//! |------|---------------|----------|
//! | Standard | individual base-day target | eligible |
//! | Exceptional | dynamic home-day target, spread across the roster | eligible |
//! | WeekendOnly | capped on-base total | never on-base |

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stable person identifier.
pub type PersonId = String;

/// Role variant of a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonKind {
    /// Regular personnel with a base-day target.
    Standard,
    /// Personnel with special circumstances (extra home days, spread out).
    Exceptional,
    /// Personnel who may only serve on weekend days.
    WeekendOnly,
}

impl Default for PersonKind {
    fn default() -> Self {
        Self::Standard
    }
}

impl PersonKind {
    /// Maps the two legacy capability flags onto a single kind.
    ///
    /// When both flags are set, the weekend-only restriction wins.
    pub fn from_flags(exceptional: bool, weekend_only: bool) -> Self {
        match (exceptional, weekend_only) {
            (_, true) => Self::WeekendOnly,
            (true, false) => Self::Exceptional,
            (false, false) => Self::Standard,
        }
    }
}

impl fmt::Display for PersonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Exceptional => write!(f, "exceptional"),
            Self::WeekendOnly => write!(f, "weekend_only"),
        }
    }
}

/// A member of the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    /// Unique identifier.
    pub id: PersonId,
    /// Display name.
    pub name: String,
    /// Role variant.
    #[serde(default)]
    pub kind: PersonKind,
    /// Inactive persons are left out of the target roster.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Person {
    /// Creates an active person of the given kind.
    pub fn new(id: impl Into<String>, kind: PersonKind) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            active: true,
        }
    }

    /// Creates a standard person.
    pub fn standard(id: impl Into<String>) -> Self {
        Self::new(id, PersonKind::Standard)
    }

    /// Creates an exceptional person.
    pub fn exceptional(id: impl Into<String>) -> Self {
        Self::new(id, PersonKind::Exceptional)
    }

    /// Creates a weekend-only person.
    pub fn weekend_only(id: impl Into<String>) -> Self {
        Self::new(id, PersonKind::WeekendOnly)
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Marks the person inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Why a person cannot serve on a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailabilityCategory {
    /// Personal request.
    Personal,
    /// Medical leave.
    Medical,
    /// Off-site training.
    Training,
    /// Holiday leave.
    Holiday,
    /// Anything else.
    Other,
}

impl Default for UnavailabilityCategory {
    fn default() -> Self {
        Self::Personal
    }
}

/// A hard exclusion: the person must be at home on this date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unavailability {
    /// The excluded person.
    pub person_id: PersonId,
    /// The excluded date.
    pub date: NaiveDate,
    /// Reason category.
    #[serde(default)]
    pub category: UnavailabilityCategory,
    /// Optional free-text note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Unavailability {
    /// Creates a personal unavailability record.
    pub fn new(person_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            person_id: person_id.into(),
            date,
            category: UnavailabilityCategory::Personal,
            note: None,
        }
    }

    /// Sets the category.
    pub fn with_category(mut self, category: UnavailabilityCategory) -> Self {
        self.category = category;
        self
    }

    /// Sets a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Roster state captured when a run is created.
///
/// Runs own their snapshot, so later roster edits never affect a run
/// in progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterSnapshot {
    /// All persons, active or not.
    pub persons: Vec<Person>,
    /// All unavailability records, in any window.
    #[serde(default)]
    pub unavailability: Vec<Unavailability>,
}

impl RosterSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a person.
    pub fn with_person(mut self, person: Person) -> Self {
        self.persons.push(person);
        self
    }

    /// Adds an unavailability record.
    pub fn with_unavailability(mut self, record: Unavailability) -> Self {
        self.unavailability.push(record);
        self
    }

    /// Marks a person unavailable on each of the given dates.
    pub fn with_unavailable_dates(
        mut self,
        person_id: &str,
        dates: impl IntoIterator<Item = NaiveDate>,
    ) -> Self {
        for date in dates {
            self.unavailability.push(Unavailability::new(person_id, date));
        }
        self
    }

    /// Active persons, in roster order. These form the target roster.
    pub fn active_persons(&self) -> impl Iterator<Item = &Person> {
        self.persons.iter().filter(|p| p.active)
    }

    /// Looks up a person by ID.
    pub fn person(&self, id: &str) -> Option<&Person> {
        self.persons.iter().find(|p| p.id == id)
    }

    /// Distinct unavailable dates of a person.
    pub fn unavailable_dates(&self, person_id: &str) -> BTreeSet<NaiveDate> {
        self.unavailability
            .iter()
            .filter(|u| u.person_id == person_id)
            .map(|u| u.date)
            .collect()
    }
}
