//! Duty-roster engine.
//!
//! Decides, for every active person and every day of a date window, whether
//! the person is on base or at home. Assignments satisfy hard rules (daily
//! staffing floors, unavailability, workload ranges, consecutive-day caps,
//! minimum on-base blocks, role rules) and minimise a weighted fairness
//! objective, within a wall-clock budget.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Person`, `RosterSnapshot`, `DateWindow`,
//!   `Assignment`, `Violation`, `RunStatus`
//! - **`params`**: Parameter sets, event overrides and their resolution
//! - **`validation`**: Request integrity and counting-based feasibility checks
//! - **`solver`**: Boolean cardinality model and a branch-and-bound solver
//!   warm-started by local search
//! - **`cp`**: Roster model construction (variables, constraint groups,
//!   roles, objective)
//! - **`scheduler`**: Run pipeline, fairness metrics, async run management
//! - **`logging`**: `tracing` subscriber helpers
//!
//! # Example
//! ```no_run
//! use u_roster::models::{DateWindow, Person, RosterSnapshot};
//! use u_roster::params::ParameterSet;
//! use u_roster::scheduler::{RosterEngine, RunRequest};
//! use chrono::NaiveDate;
//!
//! let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
//! let roster = RosterSnapshot::new()
//!     .with_person(Person::standard("kim"))
//!     .with_person(Person::standard("lee"))
//!     .with_person(Person::exceptional("park"))
//!     .with_unavailable_dates("lee", [start]);
//! let params = ParameterSet::default()
//!     .with_min_required(1)
//!     .with_base_days_target(8);
//! let window = DateWindow::from_start(start, 14).unwrap();
//!
//! let report = RosterEngine::new()
//!     .run(&RunRequest::new(roster, window, params))
//!     .unwrap();
//! println!("{} ({:?})", report.status, report.metrics);
//! ```
//!
//! # References
//!
//! - Ernst et al. (2004), "Staff scheduling and rostering: A review of
//!   applications, methods and models", EJOR 153(1)
//! - Burke et al. (2004), "The State of the Art of Nurse Rostering",
//!   J. Scheduling 7(6)

pub mod cp;
pub mod error;
pub mod logging;
pub mod models;
pub mod params;
pub mod scheduler;
pub mod solver;
pub mod validation;

pub use error::{ConfigurationError, EngineError};
