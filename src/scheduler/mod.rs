//! Run pipeline, metrics and asynchronous run management.
//!
//! # Pipeline
//!
//! ```text
//! RunRequest → prepare (resolve, validate, feasibility, analysis)
//!            → execute (build, solve, extract, validate, metrics) → RunReport
//! ```
//!
//! [`RosterEngine`] runs the pipeline on the calling thread;
//! [`RunManager`] runs it on Tokio's blocking pool with status polling and
//! cancellation.
//!
//! # KPI
//!
//! [`FairnessMetrics`] reports workload distribution: mean and variance
//! of on-base days, spread, daily coverage and per-person streaks.
//!
//! # References
//!
//! - Burke et al. (2004), "The State of the Art of Nurse Rostering"
//! - Ernst et al. (2004), "Staff scheduling and rostering: A review of
//!   applications, methods and models"

mod analysis;
mod engine;
mod extract;
mod jobs;
mod kpi;

pub use analysis::{Difficulty, ProblemAnalysis};
pub use engine::{PreparedRun, RosterEngine, RunReport, RunRequest};
pub use extract::{ResultExtractor, Validator};
pub use jobs::{RunManager, RunSnapshot, RunSummary};
pub use kpi::{FairnessMetrics, PersonMetrics};
