//! Pseudo-boolean optimization backend.
//!
//! Solves [`BoolModel`]s (boolean variables, cardinality constraints,
//! penalty-term objective) under a wall-clock budget with cooperative
//! cancellation.
//!
//! # Outcomes
//!
//! | Status | Meaning |
//! |--------|---------|
//! | Optimal | search completed; best solution is proven optimal |
//! | Feasible | budget expired; best solution found so far |
//! | Infeasible | search completed without any solution |
//! | Unknown | budget expired before any solution |
//! | Cancelled | cancellation was requested |
//!
//! # Modules
//!
//! - **`model`**: Variables, literals, constraints and penalty terms
//! - **`search`**: Depth-first branch-and-bound with cardinality propagation
//! - **`local`**: Breakout local search that supplies the first incumbent
//!
//! # Reference
//! - Roussel & Manquinho (2009), "Pseudo-Boolean and Cardinality Constraints",
//!   Handbook of Satisfiability, Ch. 22
//! - Land & Doig (1960), "An Automatic Method of Solving Discrete Programming Problems"

mod local;
mod model;
mod search;

pub use model::{Bound, BoolModel, Cardinality, Lit, PenaltyTerm, Shape, VarId};
pub use search::BranchAndBoundSolver;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Solver budget and reproducibility settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Wall-clock budget.
    pub time_limit: Duration,
    /// Seed for the branching order; drawn at random when unset.
    pub random_seed: Option<u64>,
    /// Deterministic cap on explored nodes.
    pub node_limit: Option<u64>,
    /// Look for a first incumbent with local search before tree search.
    pub local_search: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(60),
            random_seed: None,
            node_limit: None,
            local_search: true,
        }
    }
}

impl SolverConfig {
    /// Sets the wall-clock budget.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    /// Fixes the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Caps explored nodes.
    pub fn with_node_limit(mut self, nodes: u64) -> Self {
        self.node_limit = Some(nodes);
        self
    }

    /// Switches the local-search warm start on or off.
    pub fn with_local_search(mut self, enabled: bool) -> Self {
        self.local_search = enabled;
        self
    }
}

/// Outcome classification of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    /// Proven optimal.
    Optimal,
    /// Feasible, optimality not proven.
    Feasible,
    /// Proven infeasible.
    Infeasible,
    /// Budget expired without a solution.
    Unknown,
    /// Cancelled by the caller.
    Cancelled,
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimal => write!(f, "optimal"),
            Self::Feasible => write!(f, "feasible"),
            Self::Infeasible => write!(f, "infeasible"),
            Self::Unknown => write!(f, "unknown"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of a solve.
#[derive(Debug, Clone)]
pub struct CpSolution {
    /// Outcome.
    pub status: SolverStatus,
    /// Best assignment, when one was found and the solve was not cancelled.
    pub values: Option<Vec<bool>>,
    /// Objective value of `values`.
    pub objective: Option<i64>,
    /// Proven lower bound on the optimum.
    pub best_bound: i64,
    /// Search nodes explored.
    pub nodes: u64,
    /// Conflicts hit during propagation.
    pub conflicts: u64,
    /// Improving solutions found.
    pub solutions_found: u64,
    /// Conflicts per constraint tag.
    pub conflicts_by_tag: BTreeMap<u16, u64>,
    /// Wall time spent.
    pub elapsed: Duration,
    /// Seed actually used.
    pub seed: u64,
}

impl CpSolution {
    /// Whether a usable assignment is available.
    pub fn is_solution_found(&self) -> bool {
        matches!(self.status, SolverStatus::Optimal | SolverStatus::Feasible)
            && self.values.is_some()
    }

    /// Tags ordered by conflict count, most frequent first.
    pub fn conflict_ranking(&self) -> Vec<(u16, u64)> {
        let mut ranked: Vec<(u16, u64)> = self
            .conflicts_by_tag
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(t, n)| (*t, *n))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A solver for [`BoolModel`]s.
pub trait CpSolver: Send + Sync {
    /// Solves the model within the configured budget.
    fn solve(
        &self,
        model: &BoolModel,
        config: &SolverConfig,
        cancel: &CancellationToken,
    ) -> CpSolution;
}
