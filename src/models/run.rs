//! Run lifecycle model.
//!
//! # State Machine
//!
//! ```text
//! Pending → Resolving → Building → Solving → {Success, Failure, NoSolution}
//!    └──────────┴───────────┴──────────┴────→ Cancelled
//! ```
//!
//! Terminal states are write-once: once reached, no further transition
//! is accepted.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::params::{ConstraintGroupKind, ObjectiveWeights};
use crate::scheduler::ProblemAnalysis;
use crate::solver::SolverStatus;

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, not yet started.
    #[default]
    Pending,
    /// Resolving and validating parameters.
    Resolving,
    /// Checking input and assembling the model.
    Building,
    /// Solver is running.
    Solving,
    /// A validated assignment was produced.
    Success,
    /// The run failed (e.g. post-solve validation rejected the result).
    Failure,
    /// The model is infeasible or the budget expired without a solution.
    NoSolution,
    /// The run was cancelled.
    Cancelled,
}

impl RunStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failure | Self::NoSolution | Self::Cancelled
        )
    }

    /// Check if the run is still being processed
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Resolving | Self::Building | Self::Solving)
    }

    /// Whether cancellation takes effect without solver cooperation.
    pub fn cancels_immediately(&self) -> bool {
        matches!(self, Self::Pending | Self::Resolving | Self::Building)
    }

    /// Whether the state machine permits `self → next`.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        use RunStatus::*;
        match (self, next) {
            (s, _) if s.is_terminal() => false,
            (_, Cancelled) => true,
            (Pending, Resolving) => true,
            (Resolving, Building) | (Resolving, Failure) => true,
            (Building, Solving) | (Building, Failure) => true,
            (Solving, Success) | (Solving, Failure) | (Solving, NoSolution) => true,
            _ => false,
        }
    }

    /// Performs a checked transition.
    pub fn transition(self, next: RunStatus) -> Result<RunStatus, EngineError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(EngineError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Resolving => write!(f, "resolving"),
            Self::Building => write!(f, "building"),
            Self::Solving => write!(f, "solving"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::NoSolution => write!(f, "no_solution"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "resolving" => Ok(Self::Resolving),
            "building" => Ok(Self::Building),
            "solving" => Ok(Self::Solving),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "no_solution" => Ok(Self::NoSolution),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid run status: {s}")),
        }
    }
}

/// Facts recorded about a run, whatever its outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// Wall time from start of modelling to terminal status (ms).
    pub processing_time_ms: u64,
    /// Raw solver outcome, when the solver ran.
    pub solver_status: Option<SolverStatus>,
    /// The assignment is feasible but optimality was not proven.
    pub suboptimal: bool,
    /// Objective value of the returned assignment.
    pub objective_value: Option<i64>,
    /// Best proven lower bound on the objective.
    pub best_bound: Option<i64>,
    /// Search nodes explored.
    pub nodes: u64,
    /// Conflicts encountered.
    pub conflicts: u64,
    /// Seed actually used by the solver.
    pub seed: Option<u64>,
    /// Decision variables.
    pub variable_count: usize,
    /// Hard constraints.
    pub constraint_count: usize,
    /// Objective terms.
    pub penalty_term_count: usize,
    /// Constraints contributed per enabled group.
    pub group_sizes: Vec<(ConstraintGroupKind, usize)>,
    /// Likely culprits when the model is infeasible.
    pub infeasibility_hints: Vec<ConstraintGroupKind>,
    /// Pre-solve difficulty analysis.
    pub analysis: Option<ProblemAnalysis>,
    /// Objective weights the model was built with.
    pub objective_weights: Option<ObjectiveWeights>,
}
