//! Engine error taxonomy.
//!
//! Errors fall into two families:
//!
//! - **Synchronous**: raised before any model is built
//!   ([`EngineError::Configuration`], [`EngineError::InvalidRequest`],
//!   [`EngineError::InfeasibleInput`]). Callers receive them directly.
//! - **Run outcomes**: raised while solving or validating
//!   ([`EngineError::InfeasibleModel`], [`EngineError::NoSolution`],
//!   [`EngineError::EngineInvariant`], [`EngineError::Cancelled`]).
//!   These are recorded on the run report alongside its terminal status.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{RunStatus, Violation};
use crate::params::ConstraintGroupKind;

/// Resolved parameters are mutually inconsistent.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("inconsistent parameters: {}", .issues.join("; "))]
pub struct ConfigurationError {
    /// Every detected issue, in detection order.
    pub issues: Vec<String>,
}

impl ConfigurationError {
    /// Creates an error from a list of issues.
    pub fn new(issues: Vec<String>) -> Self {
        Self { issues }
    }
}

/// Errors produced by the roster engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Parameter resolution produced an inconsistent set.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Roster or window failed integrity checks.
    #[error("invalid run request: {}", .0.join("; "))]
    InvalidRequest(Vec<String>),

    /// Input is trivially unsatisfiable; no solver was invoked.
    #[error("infeasible input: {}", .reasons.join("; "))]
    InfeasibleInput {
        /// Human-readable causes.
        reasons: Vec<String>,
    },

    /// The solver proved that no assignment satisfies the hard constraints.
    #[error("model is infeasible (likely causes: {})", format_hints(.hints))]
    InfeasibleModel {
        /// Constraint groups most involved in search conflicts, most likely first.
        hints: Vec<ConstraintGroupKind>,
    },

    /// The time budget expired before any feasible assignment was found.
    #[error("no solution found within {budget_ms} ms")]
    NoSolution {
        /// The configured budget.
        budget_ms: u64,
    },

    /// The solver returned an assignment that breaks a hard constraint.
    #[error("engine invariant violated: {} violation(s)", .violations.len())]
    EngineInvariant {
        /// Detected violations.
        violations: Vec<Violation>,
    },

    /// The run was cancelled.
    #[error("run was cancelled")]
    Cancelled,

    /// No run is registered under this id.
    #[error("run {0} not found")]
    RunNotFound(Uuid),

    /// A status transition is not permitted by the run state machine.
    #[error("invalid run transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: RunStatus,
        /// Requested status.
        to: RunStatus,
    },
}

fn format_hints(hints: &[ConstraintGroupKind]) -> String {
    if hints.is_empty() {
        return "unknown".to_string();
    }
    hints
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl EngineError {
    /// Whether this error is raised before any model is built.
    pub fn is_synchronous(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::InvalidRequest(_) | Self::InfeasibleInput { .. }
        )
    }
}
