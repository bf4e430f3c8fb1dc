//! Resolved run configuration.
//!
//! A [`ParameterSet`] is the single effective configuration of one run:
//! global defaults merged with event overrides by the
//! [`ParameterResolver`]. Once resolved it is never mutated.
//!
//! # Layers
//!
//! | Layer | Scope | Source |
//! |-------|-------|--------|
//! | Base fields | whole run | defaults (JSON or builder) |
//! | `person_overrides` | one person | winning event per key |
//! | `day_overrides` | one day | winning event for the daily floor |
//! | `soft_overrides` | cell | losing events, penalised only |
//!
//! # Modules
//!
//! - **`event`**: Event override definitions and audit records
//! - **`resolver`**: First-wins resolution by event priority

mod event;
mod resolver;

pub use event::{
    EventOverride, ParameterKey, ParameterOverrides, ParameterScope, ResolvedParameter,
    SoftOverride,
};
pub use resolver::ParameterResolver;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::models::{DateWindow, PersonId};
use crate::solver::SolverConfig;

/// Hard-constraint groups that the assembler can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintGroupKind {
    /// Unavailable days are at-home.
    Unavailability,
    /// Per-day on-base floor.
    DailyStaffing,
    /// Per-person on-base total and total-home cap.
    WorkloadTarget,
    /// Caps on consecutive on-base and at-home days.
    ConsecutiveRuns,
    /// Minimum on-base block length.
    MinimumBlock,
    /// Per-person cap on weekend on-base days.
    WeekendCap,
    /// Weekend-only personnel rules.
    WeekendOnly,
    /// Exceptional personnel rules.
    Exceptional,
}

impl ConstraintGroupKind {
    /// Every group, in assembly order.
    pub const ALL: [ConstraintGroupKind; 8] = [
        Self::Unavailability,
        Self::DailyStaffing,
        Self::WorkloadTarget,
        Self::ConsecutiveRuns,
        Self::MinimumBlock,
        Self::WeekendCap,
        Self::WeekendOnly,
        Self::Exceptional,
    ];

    /// Compact tag attached to solver constraints.
    pub fn tag(self) -> u16 {
        self as u16
    }

    /// Inverse of [`tag`](Self::tag).
    pub fn from_tag(tag: u16) -> Option<Self> {
        Self::ALL.get(usize::from(tag)).copied()
    }
}

impl fmt::Display for ConstraintGroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unavailability => "unavailability",
            Self::DailyStaffing => "daily_staffing",
            Self::WorkloadTarget => "workload_target",
            Self::ConsecutiveRuns => "consecutive_runs",
            Self::MinimumBlock => "minimum_block",
            Self::WeekendCap => "weekend_cap",
            Self::WeekendOnly => "weekend_only",
            Self::Exceptional => "exceptional",
        };
        f.write_str(name)
    }
}

/// Objective terms that the composer can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKind {
    /// Deviation of home days from each person's target.
    HomeBalance,
    /// Spread of weekend on-base days across eligible persons.
    WeekendFairness,
    /// Exceptional persons at home on the same day.
    ExceptionalSpread,
    /// One-day blocks and overly long on-base runs.
    Smoothness,
    /// Intent of lower-priority event overrides.
    EventOverride,
}

impl PenaltyKind {
    /// Compact tag attached to solver terms.
    pub fn tag(self) -> u16 {
        self as u16
    }
}

/// Shape of the home-balance deviation penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviationShape {
    /// |realized − target|
    #[default]
    Absolute,
    /// (realized − target)²
    Squared,
}

/// Weights of the objective terms. Zero disables a term.
///
/// Unless `pinned`, the engine scales the balance and smoothness weights
/// with the run's difficulty before modelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveWeights {
    /// Home-day deviation weight.
    pub home_balance: u32,
    /// Weekend fairness weight.
    pub weekend_fairness: u32,
    /// Exceptional overlap weight.
    pub exceptional_spread: u32,
    /// Block smoothness weight.
    pub smoothness: u32,
    /// Losing event override weight.
    pub event_override: u32,
    /// Shape of the home-balance deviation.
    pub deviation: DeviationShape,
    /// Use the weights exactly as given, whatever the difficulty.
    pub pinned: bool,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            home_balance: 10,
            weekend_fairness: 2,
            exceptional_spread: 5,
            smoothness: 0,
            event_override: 20,
            deviation: DeviationShape::Absolute,
            pinned: false,
        }
    }
}

impl ObjectiveWeights {
    /// Marks the weights as final.
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }
}

/// Policy for exceptional personnel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExceptionalPolicy {
    /// Extra home days as a fraction of the window length.
    pub safety_margin_fraction: f64,
    /// Upper bound on the home target as a fraction of the window length.
    pub max_home_fraction: f64,
    /// When `false`, same-day overlap becomes a hard rule instead of a penalty.
    pub adaptive: bool,
}

impl Default for ExceptionalPolicy {
    fn default() -> Self {
        Self {
            safety_margin_fraction: 0.2,
            max_home_fraction: 0.5,
            adaptive: true,
        }
    }
}

/// Solver budget and reproducibility settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Wall-clock budget (ms).
    pub time_budget_ms: u64,
    /// Fixed seed for reproducible runs.
    pub random_seed: Option<u64>,
    /// Deterministic cap on explored search nodes.
    pub node_limit: Option<u64>,
    /// Warm-start the search with local search.
    pub local_search: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_budget_ms: 60_000,
            random_seed: None,
            node_limit: None,
            local_search: true,
        }
    }
}

/// Per-person values set by winning event overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonOverrides {
    /// On-base target.
    pub base_days_target: Option<u32>,
    /// Total home-day cap.
    pub max_total_home_days: Option<u32>,
    /// Consecutive on-base cap.
    pub max_consecutive_base_days: Option<u32>,
    /// Consecutive at-home cap.
    pub max_consecutive_home_days: Option<u32>,
    /// Minimum on-base block.
    pub min_base_block_days: Option<u32>,
}

/// The effective configuration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    /// Minimum persons on-base per day.
    pub min_required_per_day: u32,
    /// Weekend floor when weekend coverage is required (defaults to the daily floor).
    pub weekend_min_required: Option<u32>,
    /// When `false`, weekend days carry no floor.
    pub require_weekend_coverage: bool,
    /// Days of the week treated as weekend.
    pub weekend_days: Vec<Weekday>,
    /// Default per-person on-base target.
    pub base_days_target: u32,
    /// Per-person home target; when set, base + home must equal the window length.
    pub home_days_target: Option<u32>,
    /// Default total home-day cap (unbounded when unset).
    pub max_total_home_days: Option<u32>,
    /// Cap on weekend on-base days per person (unbounded when unset).
    pub max_weekend_base_days_per_person: Option<u32>,
    /// On-base cap for weekend-only persons (defaults to the weekend-day count).
    pub weekend_only_max_base_days: Option<u32>,
    /// Default consecutive on-base cap.
    pub max_consecutive_base_days: u32,
    /// Default consecutive at-home cap.
    pub max_consecutive_home_days: u32,
    /// Default minimum on-base block.
    pub min_base_block_days: u32,
    /// Disables minimum block enforcement.
    pub allow_single_day_blocks: bool,
    /// Workload tolerance as a fraction of the target.
    pub workload_tolerance_fraction: f64,
    /// Exceptional personnel policy.
    pub exceptional: ExceptionalPolicy,
    /// Objective weights.
    pub objective: ObjectiveWeights,
    /// Constraint groups switched off for this run.
    pub disabled_groups: BTreeSet<ConstraintGroupKind>,
    /// Objective terms switched off for this run.
    pub disabled_penalties: BTreeSet<PenaltyKind>,
    /// Solver budget.
    pub solver: SolverSettings,
    /// Winning per-person event values.
    pub person_overrides: BTreeMap<PersonId, PersonOverrides>,
    /// Winning per-day floors.
    pub day_overrides: BTreeMap<NaiveDate, u32>,
    /// Audit trail of event-resolved values.
    pub provenance: Vec<ResolvedParameter>,
    /// Losing event values, expressed as penalties.
    pub soft_overrides: Vec<SoftOverride>,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            min_required_per_day: 5,
            weekend_min_required: None,
            require_weekend_coverage: true,
            weekend_days: vec![Weekday::Fri, Weekday::Sat],
            base_days_target: 30,
            home_days_target: None,
            max_total_home_days: None,
            max_weekend_base_days_per_person: None,
            weekend_only_max_base_days: None,
            max_consecutive_base_days: 7,
            max_consecutive_home_days: 10,
            min_base_block_days: 3,
            allow_single_day_blocks: false,
            workload_tolerance_fraction: 0.2,
            exceptional: ExceptionalPolicy::default(),
            objective: ObjectiveWeights::default(),
            disabled_groups: BTreeSet::new(),
            disabled_penalties: BTreeSet::new(),
            solver: SolverSettings::default(),
            person_overrides: BTreeMap::new(),
            day_overrides: BTreeMap::new(),
            provenance: Vec::new(),
            soft_overrides: Vec::new(),
        }
    }
}

impl ParameterSet {
    /// Parses a parameter set; omitted fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json)
            .map_err(|e| ConfigurationError::new(vec![format!("invalid parameter JSON: {e}")]))
    }

    /// Serializes the parameter set.
    pub fn to_json(&self) -> Result<String, ConfigurationError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ConfigurationError::new(vec![format!("cannot serialize parameters: {e}")]))
    }

    // ================================
    // Builder
    // ================================

    /// Sets the daily floor.
    pub fn with_min_required(mut self, n: u32) -> Self {
        self.min_required_per_day = n;
        self
    }

    /// Sets a distinct weekend floor.
    pub fn with_weekend_min_required(mut self, n: u32) -> Self {
        self.weekend_min_required = Some(n);
        self
    }

    /// Sets whether weekend days carry a floor.
    pub fn with_weekend_coverage(mut self, required: bool) -> Self {
        self.require_weekend_coverage = required;
        self
    }

    /// Sets the weekend definition.
    pub fn with_weekend_days(mut self, days: Vec<Weekday>) -> Self {
        self.weekend_days = days;
        self
    }

    /// Sets the default on-base target.
    pub fn with_base_days_target(mut self, n: u32) -> Self {
        self.base_days_target = n;
        self
    }

    /// Sets the default home target (exact-sum semantics).
    pub fn with_home_days_target(mut self, n: u32) -> Self {
        self.home_days_target = Some(n);
        self
    }

    /// Sets the consecutive-run caps.
    pub fn with_consecutive_caps(mut self, max_base: u32, max_home: u32) -> Self {
        self.max_consecutive_base_days = max_base;
        self.max_consecutive_home_days = max_home;
        self
    }

    /// Sets the minimum block size.
    pub fn with_min_block(mut self, days: u32) -> Self {
        self.min_base_block_days = days;
        self
    }

    /// Allows or forbids single-day blocks.
    pub fn with_single_day_blocks(mut self, allowed: bool) -> Self {
        self.allow_single_day_blocks = allowed;
        self
    }

    /// Sets the total home-day cap.
    pub fn with_max_total_home_days(mut self, n: u32) -> Self {
        self.max_total_home_days = Some(n);
        self
    }

    /// Sets the per-person weekend on-base cap.
    pub fn with_max_weekend_base_days(mut self, n: u32) -> Self {
        self.max_weekend_base_days_per_person = Some(n);
        self
    }

    /// Sets the workload tolerance fraction.
    pub fn with_tolerance(mut self, fraction: f64) -> Self {
        self.workload_tolerance_fraction = fraction;
        self
    }

    /// Sets the exceptional policy.
    pub fn with_exceptional(mut self, policy: ExceptionalPolicy) -> Self {
        self.exceptional = policy;
        self
    }

    /// Sets the objective weights.
    pub fn with_weights(mut self, weights: ObjectiveWeights) -> Self {
        self.objective = weights;
        self
    }

    /// Switches a constraint group off.
    pub fn without_group(mut self, kind: ConstraintGroupKind) -> Self {
        self.disabled_groups.insert(kind);
        self
    }

    /// Switches an objective term off.
    pub fn without_penalty(mut self, kind: PenaltyKind) -> Self {
        self.disabled_penalties.insert(kind);
        self
    }

    /// Sets the solver time budget.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.solver.time_budget_ms = budget.as_millis().min(u128::from(u64::MAX)) as u64;
        self
    }

    /// Fixes the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.solver.random_seed = Some(seed);
        self
    }

    /// Caps explored search nodes.
    pub fn with_node_limit(mut self, nodes: u64) -> Self {
        self.solver.node_limit = Some(nodes);
        self
    }

    // ================================
    // Effective values
    // ================================

    /// Floor for a day.
    pub fn floor_on(&self, date: NaiveDate, is_weekend: bool) -> u32 {
        if let Some(&n) = self.day_overrides.get(&date) {
            return n;
        }
        if is_weekend {
            if self.require_weekend_coverage {
                self.weekend_min_required
                    .unwrap_or(self.min_required_per_day)
            } else {
                0
            }
        } else {
            self.min_required_per_day
        }
    }

    fn person(&self, person_id: &str) -> Option<&PersonOverrides> {
        self.person_overrides.get(person_id)
    }

    /// On-base target of a person.
    pub fn base_target_for(&self, person_id: &str) -> u32 {
        self.person(person_id)
            .and_then(|o| o.base_days_target)
            .unwrap_or(self.base_days_target)
    }

    /// Total home-day cap of a person.
    pub fn max_total_home_for(&self, person_id: &str) -> Option<u32> {
        self.person(person_id)
            .and_then(|o| o.max_total_home_days)
            .or(self.max_total_home_days)
    }

    /// Consecutive on-base cap of a person.
    pub fn max_consecutive_base_for(&self, person_id: &str) -> u32 {
        self.person(person_id)
            .and_then(|o| o.max_consecutive_base_days)
            .unwrap_or(self.max_consecutive_base_days)
    }

    /// Consecutive at-home cap of a person.
    pub fn max_consecutive_home_for(&self, person_id: &str) -> u32 {
        self.person(person_id)
            .and_then(|o| o.max_consecutive_home_days)
            .unwrap_or(self.max_consecutive_home_days)
    }

    /// Minimum on-base block of a person.
    pub fn min_block_for(&self, person_id: &str) -> u32 {
        self.person(person_id)
            .and_then(|o| o.min_base_block_days)
            .unwrap_or(self.min_base_block_days)
    }

    /// Whether minimum blocks are enforced for a person.
    pub fn blocks_enforced_for(&self, person_id: &str) -> bool {
        !self.allow_single_day_blocks && self.min_block_for(person_id) >= 2
    }

    /// Whether a constraint group is switched on.
    pub fn group_enabled(&self, kind: ConstraintGroupKind) -> bool {
        !self.disabled_groups.contains(&kind)
    }

    /// Whether an objective term is switched on.
    pub fn penalty_enabled(&self, kind: PenaltyKind) -> bool {
        !self.disabled_penalties.contains(&kind)
    }

    /// Solver configuration for this run.
    pub fn solver_config(&self) -> SolverConfig {
        let mut config = SolverConfig::default()
            .with_time_limit(Duration::from_millis(self.solver.time_budget_ms))
            .with_local_search(self.solver.local_search);
        if let Some(seed) = self.solver.random_seed {
            config = config.with_seed(seed);
        }
        if let Some(nodes) = self.solver.node_limit {
            config = config.with_node_limit(nodes);
        }
        config
    }

    // ================================
    // Consistency
    // ================================

    /// Checks that the effective values are mutually consistent for a run.
    ///
    /// Returns every issue found, not just the first.
    pub fn validate(
        &self,
        window: &DateWindow,
        persons: &[PersonId],
    ) -> Result<(), ConfigurationError> {
        let mut issues = Vec::new();
        let days = window.len() as u64;

        check_fraction(
            &mut issues,
            "workload_tolerance_fraction",
            self.workload_tolerance_fraction,
        );
        check_fraction(
            &mut issues,
            "exceptional.safety_margin_fraction",
            self.exceptional.safety_margin_fraction,
        );
        check_fraction(
            &mut issues,
            "exceptional.max_home_fraction",
            self.exceptional.max_home_fraction,
        );

        if self.solver.time_budget_ms == 0 {
            issues.push("solver time budget must be positive".to_string());
        }
        if self.weekend_days.is_empty() && self.weekend_min_required.is_some() {
            issues.push("weekend floor set but no weekend days defined".to_string());
        }

        if let Some(home) = self.home_days_target {
            let sum = u64::from(self.base_days_target) + u64::from(home);
            if sum != days {
                issues.push(format!(
                    "base target {} + home target {home} = {sum}, window has {days} days",
                    self.base_days_target
                ));
            }
        }

        for person in persons {
            let base = self.base_target_for(person);
            if u64::from(base) > days {
                issues.push(format!(
                    "{person}: base target {base} exceeds the {days}-day window"
                ));
            }
            let max_base = self.max_consecutive_base_for(person);
            let max_home = self.max_consecutive_home_for(person);
            let block = self.min_block_for(person);
            if max_base == 0 {
                issues.push(format!("{person}: consecutive on-base cap must be positive"));
            }
            if max_home == 0 {
                issues.push(format!("{person}: consecutive at-home cap must be positive"));
            }
            if block == 0 {
                issues.push(format!("{person}: minimum block must be positive"));
            }
            if self.blocks_enforced_for(person) && block > max_base {
                issues.push(format!(
                    "{person}: minimum block {block} exceeds consecutive on-base cap {max_base}"
                ));
            }
        }

        for date in self.day_overrides.keys() {
            if !window.contains(*date) {
                issues.push(format!("floor override for {date} lies outside the window"));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::new(issues))
        }
    }
}

fn check_fraction(issues: &mut Vec<String>, name: &str, value: f64) {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        issues.push(format!("{name} must lie in [0, 1], got {value}"));
    }
}
