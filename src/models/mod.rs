//! Roster domain models.
//!
//! Provides the core data types for describing a duty-roster problem
//! and its solution.
//!
//! # Domain Mappings
//!
//! | u-roster | Military unit | Hospital ward | Field crew |
//! |----------|---------------|---------------|------------|
//! | Person | Soldier | Nurse | Technician |
//! | On-base | On base | On shift | On site |
//! | Unavailability | Leave request | Vacation | Training day |
//! | Assignment | Duty roster row | Rota entry | Crew plan row |

mod assignment;
mod person;
mod run;
mod window;

pub use assignment::{Assignment, DayRoster, Violation, ViolationType};
pub use person::{
    Person, PersonId, PersonKind, RosterSnapshot, Unavailability, UnavailabilityCategory,
};
pub use run::{RunDiagnostics, RunStatus};
pub use window::DateWindow;
