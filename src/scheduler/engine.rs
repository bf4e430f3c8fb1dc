//! Synchronous run pipeline.
//!
//! A run goes through two halves:
//!
//! 1. [`RosterEngine::prepare`] (synchronous, cheap): parameter
//!    resolution, request validation, parameter consistency, pre-solve
//!    feasibility and difficulty analysis. Errors here are returned to the
//!    caller directly.
//! 2. [`RosterEngine::execute`] (blocking, budgeted): model construction,
//!    solving, extraction and independent validation. Every outcome is a
//!    [`RunReport`] with a terminal status.
//!
//! # Status Mapping
//!
//! | Solver outcome | Run status | Error |
//! |----------------|------------|-------|
//! | Optimal / Feasible, validated | Success | none |
//! | Optimal / Feasible, violations | Failure | `EngineInvariant` |
//! | Infeasible | NoSolution | `InfeasibleModel` |
//! | Unknown | NoSolution | `NoSolution` |
//! | Cancelled | Cancelled | `Cancelled` |

use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{FairnessMetrics, ProblemAnalysis, ResultExtractor, Validator};
use crate::cp::{ModelContext, RosterCpBuilder};
use crate::error::EngineError;
use crate::models::{
    Assignment, DateWindow, DayRoster, RosterSnapshot, RunDiagnostics, RunStatus,
};
use crate::params::{EventOverride, ParameterResolver, ParameterSet};
use crate::solver::{BranchAndBoundSolver, CancellationToken, CpSolver, SolverStatus};
use crate::validation::{check_feasibility, validate_request};

/// Everything a run needs, captured at submission.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Roster snapshot owned by the run.
    pub roster: RosterSnapshot,
    /// Run window.
    pub window: DateWindow,
    /// Global defaults, or an already resolved parameter set.
    pub params: ParameterSet,
    /// Event overrides resolved against `params` at preparation.
    pub events: Vec<EventOverride>,
}

impl RunRequest {
    /// Creates a request without event overrides.
    pub fn new(roster: RosterSnapshot, window: DateWindow, params: ParameterSet) -> Self {
        Self {
            roster,
            window,
            params,
            events: Vec::new(),
        }
    }

    /// Adds event overrides.
    pub fn with_events(mut self, events: impl IntoIterator<Item = EventOverride>) -> Self {
        self.events.extend(events);
        self
    }
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Terminal status.
    pub status: RunStatus,
    /// One row per (person, day), only when `status` is Success.
    pub assignments: Vec<Assignment>,
    /// Fairness metrics, only when `status` is Success.
    pub metrics: Option<FairnessMetrics>,
    /// Run facts, whatever the outcome.
    pub diagnostics: RunDiagnostics,
    /// Cause of a non-success outcome.
    pub error: Option<EngineError>,
}

impl RunReport {
    fn failed(run_id: Uuid, status: RunStatus, diagnostics: RunDiagnostics, error: EngineError) -> Self {
        Self {
            run_id,
            status,
            assignments: Vec::new(),
            metrics: None,
            diagnostics,
            error: Some(error),
        }
    }

    /// Whether the run produced a validated roster.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Per-date on-base and at-home lists.
    pub fn calendar(&self) -> Vec<DayRoster> {
        DayRoster::group(&self.assignments)
    }

    /// Rows of one person, in date order.
    pub fn assignments_for(&self, person_id: &str) -> Vec<&Assignment> {
        self.assignments
            .iter()
            .filter(|a| a.person_id == person_id)
            .collect()
    }
}

/// A validated run, ready to be modelled and solved.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    /// Run identifier.
    pub run_id: Uuid,
    /// Run context (target roster, window, resolved parameters, plan).
    pub context: ModelContext,
    /// Pre-solve analysis.
    pub analysis: ProblemAnalysis,
}

/// Roster engine.
///
/// # Example
/// ```no_run
/// use u_roster::models::{DateWindow, Person, RosterSnapshot};
/// use u_roster::params::ParameterSet;
/// use u_roster::scheduler::{RosterEngine, RunRequest};
/// use chrono::NaiveDate;
///
/// let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
/// let roster = RosterSnapshot::new()
///     .with_person(Person::standard("A"))
///     .with_person(Person::standard("B"));
/// let params = ParameterSet::default()
///     .with_min_required(1)
///     .with_base_days_target(4);
/// let request = RunRequest::new(roster, DateWindow::from_start(start, 7).unwrap(), params);
///
/// let report = RosterEngine::new().run(&request).unwrap();
/// for day in report.calendar() {
///     println!("{}: {:?}", day.date, day.on_base);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RosterEngine<S: CpSolver = BranchAndBoundSolver> {
    solver: S,
}

impl RosterEngine<BranchAndBoundSolver> {
    /// Creates an engine with the built-in branch-and-bound solver.
    pub fn new() -> Self {
        Self {
            solver: BranchAndBoundSolver::new(),
        }
    }
}

impl<S: CpSolver> RosterEngine<S> {
    /// Creates an engine over a custom solver backend.
    pub fn with_solver(solver: S) -> Self {
        Self { solver }
    }

    /// Resolves, validates and analyses a request.
    pub fn prepare(&self, request: &RunRequest) -> Result<PreparedRun, EngineError> {
        validate_request(&request.roster, &request.window).map_err(|errors| {
            EngineError::InvalidRequest(errors.iter().map(|e| e.message.clone()).collect())
        })?;

        let person_ids: Vec<_> = request
            .roster
            .active_persons()
            .map(|p| p.id.clone())
            .collect();
        let params = if request.events.is_empty() {
            request.params.validate(&request.window, &person_ids)?;
            request.params.clone()
        } else {
            ParameterResolver::new(request.params.clone())
                .with_events(request.events.iter().cloned())
                .resolve(&request.window, &person_ids)?
        };

        let mut context = ModelContext::new(&request.roster, request.window, params);
        check_feasibility(&context)
            .map_err(|reasons| EngineError::InfeasibleInput { reasons })?;

        let analysis = ProblemAnalysis::analyze(&context);
        let weights = analysis.difficulty.adapt_weights(&context.params.objective);
        if weights != context.params.objective {
            debug!(
                difficulty = %analysis.difficulty,
                home_balance = weights.home_balance,
                smoothness = weights.smoothness,
                "objective weights adapted"
            );
            context.params.objective = weights;
        }
        debug!(
            persons = analysis.persons,
            days = analysis.total_days,
            required = analysis.required_person_days,
            available = analysis.available_person_days,
            difficulty = %analysis.difficulty,
            relaxed = analysis.relaxed_targets,
            "run prepared"
        );

        Ok(PreparedRun {
            run_id: Uuid::new_v4(),
            context,
            analysis,
        })
    }

    /// Builds, solves and validates a prepared run.
    ///
    /// `on_phase` is told when the run enters Building and Solving.
    pub fn execute(
        &self,
        prepared: PreparedRun,
        cancel: &CancellationToken,
        mut on_phase: impl FnMut(RunStatus),
    ) -> RunReport {
        let started = Instant::now();
        let PreparedRun {
            run_id,
            context: ctx,
            analysis,
        } = prepared;
        let mut diagnostics = RunDiagnostics {
            analysis: Some(analysis),
            objective_weights: Some(ctx.params.objective.clone()),
            ..Default::default()
        };
        let elapsed_ms = |started: Instant| started.elapsed().as_millis() as u64;

        info!(%run_id, persons = ctx.persons(), days = ctx.days(), "run started");

        if cancel.is_cancelled() {
            return cancelled(run_id, diagnostics);
        }
        on_phase(RunStatus::Building);
        let builder = RosterCpBuilder::new(&ctx);
        let built = builder.build();
        diagnostics.variable_count = built.model.var_count();
        diagnostics.constraint_count = built.model.constraint_count();
        diagnostics.penalty_term_count = built.model.term_count();
        diagnostics.group_sizes = built.group_sizes.clone();

        if cancel.is_cancelled() {
            diagnostics.processing_time_ms = elapsed_ms(started);
            return cancelled(run_id, diagnostics);
        }
        on_phase(RunStatus::Solving);
        let config = ctx.params.solver_config();
        let solution = self.solver.solve(&built.model, &config, cancel);

        diagnostics.solver_status = Some(solution.status);
        diagnostics.nodes = solution.nodes;
        diagnostics.conflicts = solution.conflicts;
        diagnostics.seed = Some(solution.seed);
        diagnostics.best_bound = Some(solution.best_bound);
        diagnostics.objective_value = solution.objective;

        let report = match solution.status {
            SolverStatus::Optimal | SolverStatus::Feasible => {
                diagnostics.suboptimal = solution.status == SolverStatus::Feasible;
                match builder.decode(&built, &solution) {
                    Some(duty) => {
                        let assignments = ResultExtractor::extract(&ctx, &duty);
                        let violations = Validator::new(&ctx).validate(&assignments);
                        if violations.is_empty() {
                            let metrics = FairnessMetrics::calculate(&ctx, &duty);
                            diagnostics.processing_time_ms = elapsed_ms(started);
                            RunReport {
                                run_id,
                                status: RunStatus::Success,
                                assignments,
                                metrics: Some(metrics),
                                diagnostics,
                                error: None,
                            }
                        } else {
                            warn!(%run_id, count = violations.len(), "solver result failed validation");
                            diagnostics.processing_time_ms = elapsed_ms(started);
                            RunReport::failed(
                                run_id,
                                RunStatus::Failure,
                                diagnostics,
                                EngineError::EngineInvariant { violations },
                            )
                        }
                    }
                    None => {
                        diagnostics.processing_time_ms = elapsed_ms(started);
                        RunReport::failed(
                            run_id,
                            RunStatus::Failure,
                            diagnostics,
                            EngineError::EngineInvariant {
                                violations: Vec::new(),
                            },
                        )
                    }
                }
            }
            SolverStatus::Infeasible => {
                let hints = RosterCpBuilder::infeasibility_hints(&solution);
                warn!(%run_id, ?hints, "model is infeasible");
                diagnostics.infeasibility_hints = hints.clone();
                diagnostics.processing_time_ms = elapsed_ms(started);
                RunReport::failed(
                    run_id,
                    RunStatus::NoSolution,
                    diagnostics,
                    EngineError::InfeasibleModel { hints },
                )
            }
            SolverStatus::Unknown => {
                let budget_ms = ctx.params.solver.time_budget_ms;
                warn!(%run_id, budget_ms, "no solution within budget");
                diagnostics.processing_time_ms = elapsed_ms(started);
                RunReport::failed(
                    run_id,
                    RunStatus::NoSolution,
                    diagnostics,
                    EngineError::NoSolution { budget_ms },
                )
            }
            SolverStatus::Cancelled => {
                diagnostics.processing_time_ms = elapsed_ms(started);
                cancelled(run_id, diagnostics)
            }
        };

        info!(
            %run_id,
            status = %report.status,
            objective = ?report.diagnostics.objective_value,
            elapsed_ms = report.diagnostics.processing_time_ms,
            "run finished"
        );
        report
    }

    /// Prepares and executes a request on the calling thread.
    ///
    /// Synchronous errors are returned as `Err`; solver outcomes are
    /// reported through the returned [`RunReport`].
    pub fn run(&self, request: &RunRequest) -> Result<RunReport, EngineError> {
        let prepared = self.prepare(request)?;
        Ok(self.execute(prepared, &CancellationToken::new(), |_| {}))
    }
}

pub(crate) fn cancelled(run_id: Uuid, diagnostics: RunDiagnostics) -> RunReport {
    info!(%run_id, "run cancelled");
    RunReport::failed(run_id, RunStatus::Cancelled, diagnostics, EngineError::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Person, Unavailability};
    use crate::params::{ExceptionalPolicy, ObjectiveWeights, ParameterKey};
    use crate::scheduler::Difficulty;
    use crate::solver::{BoolModel, CpSolution, SolverConfig};
    use chrono::{Datelike, NaiveDate, Weekday};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn window(days: u32) -> DateWindow {
        DateWindow::from_start(date(3), days).unwrap()
    }

    fn roster(n: usize) -> RosterSnapshot {
        (0..n).fold(RosterSnapshot::new(), |r, i| {
            r.with_person(Person::standard(format!("P{i}")))
        })
    }

    fn base_params() -> ParameterSet {
        ParameterSet::default()
            .with_time_budget(Duration::from_secs(2))
            .with_seed(7)
    }

    fn scenario_a() -> RunRequest {
        let params = base_params()
            .with_min_required(3)
            .with_base_days_target(4)
            .with_consecutive_caps(3, 7)
            .with_min_block(1);
        RunRequest::new(roster(5), window(7), params)
    }

    #[test]
    fn test_scenario_a_small_roster() {
        crate::logging::init_test();
        let report = RosterEngine::new().run(&scenario_a()).unwrap();
        assert_eq!(report.status, RunStatus::Success, "{:?}", report.error);
        assert_eq!(report.assignments.len(), 35);

        let metrics = report.metrics.as_ref().unwrap();
        assert!(metrics.min_daily_on_base >= 3);
        for person in &metrics.persons {
            assert!((3..=5).contains(&person.base_days), "{person:?}");
            assert!(person.max_consecutive_base <= 3, "{person:?}");
        }

        let calendar = report.calendar();
        assert_eq!(calendar.len(), 7);
        assert!(calendar.iter().all(|d| d.on_base.len() >= 3));
    }

    #[test]
    fn test_scenario_b_unavailable_all_window() {
        let roster = RosterSnapshot::new()
            .with_person(Person::standard("A"))
            .with_unavailable_dates("A", (3..=9).map(date));
        let params = base_params()
            .with_min_required(1)
            .with_base_days_target(5);
        let request = RunRequest::new(roster, window(7), params);

        let err = RosterEngine::new().run(&request).unwrap_err();
        assert!(matches!(err, EngineError::InfeasibleInput { .. }));
        assert!(err.is_synchronous());
    }

    #[test]
    fn test_scenario_c_exceptional_home_days() {
        let roster = RosterSnapshot::new()
            .with_person(Person::exceptional("X"))
            .with_person(Person::standard("A"))
            .with_person(Person::standard("B"))
            .with_person(Person::standard("C"))
            .with_unavailable_dates("X", [date(5), date(12), date(19)]);
        let params = base_params()
            .with_min_required(2)
            .with_base_days_target(10)
            .with_consecutive_caps(5, 5)
            .with_single_day_blocks(true)
            .with_tolerance(0.1)
            .with_exceptional(ExceptionalPolicy::default())
            .with_time_budget(Duration::from_secs(5));
        let request = RunRequest::new(roster, window(20), params);

        let report = RosterEngine::new().run(&request).unwrap();
        assert_eq!(report.status, RunStatus::Success, "{:?}", report.error);
        let x = report.metrics.as_ref().unwrap().person("X").unwrap();
        assert!((6..=8).contains(&x.home_days), "{x:?}");
    }

    #[test]
    fn test_unavailability_respected() {
        let roster = roster(4)
            .with_unavailability(Unavailability::new("P0", date(4)))
            .with_unavailability(Unavailability::new("P2", date(6)));
        let params = base_params()
            .with_min_required(2)
            .with_base_days_target(4)
            .with_consecutive_caps(4, 4)
            .with_min_block(2);
        let report = RosterEngine::new()
            .run(&RunRequest::new(roster, window(7), params))
            .unwrap();
        assert!(report.is_success(), "{:?}", report.error);
        assert!(report
            .assignments
            .iter()
            .filter(|a| (a.person_id == "P0" && a.date == date(4))
                || (a.person_id == "P2" && a.date == date(6)))
            .all(|a| !a.on_base));
    }

    #[test]
    fn test_same_seed_same_objective() {
        let mut request = scenario_a();
        request.params = request.params.with_node_limit(50_000);
        let engine = RosterEngine::new();
        let first = engine.run(&request).unwrap();
        let second = engine.run(&request).unwrap();
        assert_eq!(first.diagnostics.seed, Some(7));
        assert_eq!(
            first.diagnostics.objective_value,
            second.diagnostics.objective_value
        );
        assert_eq!(first.assignments, second.assignments);
    }

    #[test]
    fn test_raising_floor_never_lowers_coverage() {
        let engine = RosterEngine::new();
        let mut totals = Vec::new();
        for floor in 1..=3 {
            let params = base_params()
                .with_min_required(floor)
                .with_base_days_target(4)
                .with_consecutive_caps(3, 7)
                .with_min_block(1);
            let report = engine
                .run(&RunRequest::new(roster(5), window(7), params))
                .unwrap();
            assert!(report.is_success(), "floor {floor}: {:?}", report.error);
            totals.push(report.metrics.unwrap().total_base_days);
        }
        assert!(totals.windows(2).all(|w| w[0] <= w[1]), "{totals:?}");
        assert!(totals[2] >= 21);
    }

    #[test]
    fn test_one_day_window() {
        let params = base_params()
            .with_min_required(2)
            .with_base_days_target(1);
        let request = RunRequest::new(roster(3), window(1), params);
        let report = RosterEngine::new().run(&request).unwrap();
        assert!(report.is_success(), "{:?}", report.error);
        assert_eq!(report.assignments.len(), 3);
        assert!(report
            .diagnostics
            .group_sizes
            .iter()
            .all(|(k, _)| *k != crate::params::ConstraintGroupKind::ConsecutiveRuns));
    }

    #[test]
    fn test_configuration_error_is_synchronous() {
        let params = base_params().with_base_days_target(30);
        let request = RunRequest::new(roster(2), window(7), params);
        let err = RosterEngine::new().run(&request).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_invalid_request() {
        let roster = RosterSnapshot::new()
            .with_person(Person::standard("A"))
            .with_person(Person::standard("A"));
        let request = RunRequest::new(roster, window(7), base_params());
        let err = RosterEngine::new().run(&request).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
    }

    #[test]
    fn test_events_resolved_before_modelling() {
        let event = EventOverride::new("drill", date(4), date(4))
            .with_priority(10)
            .with_value(ParameterKey::MinRequiredPerDay, 3);
        let params = base_params()
            .with_min_required(1)
            .with_base_days_target(3)
            .with_consecutive_caps(3, 7)
            .with_min_block(1);
        let request = RunRequest::new(roster(4), window(7), params).with_events([event]);

        let engine = RosterEngine::new();
        let prepared = engine.prepare(&request).unwrap();
        assert_eq!(prepared.context.floors[1], 3);
        assert_eq!(prepared.context.params.provenance.len(), 1);

        let report = engine.execute(prepared, &CancellationToken::new(), |_| {});
        assert!(report.is_success(), "{:?}", report.error);
        assert!(report.calendar()[1].on_base.len() >= 3);
    }

    #[test]
    fn test_phases_reported_in_order() {
        let engine = RosterEngine::new();
        let prepared = engine.prepare(&scenario_a()).unwrap();
        let mut phases = Vec::new();
        let report = engine.execute(prepared, &CancellationToken::new(), |p| phases.push(p));
        assert_eq!(phases, vec![RunStatus::Building, RunStatus::Solving]);
        assert!(report.is_success());
    }

    #[test]
    fn test_cancelled_before_building() {
        let engine = RosterEngine::new();
        let prepared = engine.prepare(&scenario_a()).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let report = engine.execute(prepared, &token, |_| {});
        assert_eq!(report.status, RunStatus::Cancelled);
        assert!(report.assignments.is_empty());
        assert_eq!(report.error, Some(EngineError::Cancelled));
    }

    /// Returns a fixed assignment regardless of the model.
    struct FixedSolver(Vec<bool>);

    impl CpSolver for FixedSolver {
        fn solve(
            &self,
            model: &BoolModel,
            _config: &SolverConfig,
            _cancel: &CancellationToken,
        ) -> CpSolution {
            CpSolution {
                status: SolverStatus::Optimal,
                values: Some(self.0.clone()),
                objective: Some(model.evaluate(&self.0)),
                best_bound: 0,
                nodes: 1,
                conflicts: 0,
                solutions_found: 1,
                conflicts_by_tag: BTreeMap::new(),
                elapsed: Duration::ZERO,
                seed: 0,
            }
        }
    }

    #[test]
    fn test_invalid_solver_result_fails_run() {
        // Everyone at home every day breaks the floor.
        let request = scenario_a();
        let engine = RosterEngine::with_solver(FixedSolver(vec![false; 35]));
        let report = engine.run(&request).unwrap();
        assert_eq!(report.status, RunStatus::Failure);
        assert!(report.assignments.is_empty());
        match report.error {
            Some(EngineError::EngineInvariant { violations }) => assert!(!violations.is_empty()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_infeasible_model_reports_hints() {
        // Floor 2 on every day, but nobody may serve more than 3 days in a row.
        let params = base_params()
            .with_min_required(2)
            .with_base_days_target(7)
            .with_consecutive_caps(3, 7)
            .with_single_day_blocks(true);
        let request = RunRequest::new(roster(2), window(7), params);
        let report = RosterEngine::new().run(&request).unwrap();
        assert_eq!(report.status, RunStatus::NoSolution);
        assert!(matches!(
            report.error,
            Some(EngineError::InfeasibleModel { .. })
        ));
        assert!(!report.diagnostics.infeasibility_hints.is_empty());
    }

    /// Default parameters apart from floor, target and seed. The node limit
    /// keeps the tree search after the warm start short.
    fn default_fortnight() -> ParameterSet {
        ParameterSet::default()
            .with_min_required(5)
            .with_base_days_target(7)
            .with_seed(1)
            .with_node_limit(100_000)
    }

    /// On-base runs per person, as (first, last) day offsets.
    fn on_base_runs(report: &RunReport, person: &str) -> Vec<(i64, i64)> {
        let start = date(3);
        let mut days: Vec<i64> = report
            .assignments_for(person)
            .into_iter()
            .filter(|a| a.on_base)
            .map(|a| (a.date - start).num_days())
            .collect();
        days.sort_unstable();
        let mut runs: Vec<(i64, i64)> = Vec::new();
        for d in days {
            match runs.last_mut() {
                Some((_, last)) if *last + 1 == d => *last = d,
                _ => runs.push((d, d)),
            }
        }
        runs
    }

    #[test]
    fn test_default_parameters_fortnight() {
        let request = RunRequest::new(roster(10), window(14), default_fortnight());
        let report = RosterEngine::new().run(&request).unwrap();
        assert_eq!(report.status, RunStatus::Success, "{:?}", report.error);
        assert_eq!(report.assignments.len(), 140);

        let metrics = report.metrics.as_ref().unwrap();
        assert!(metrics.min_daily_on_base >= 5);
        for person in &metrics.persons {
            assert_eq!(person.base_days, 7, "{person:?}");
            assert!(person.max_consecutive_base <= 7, "{person:?}");
            assert!(person.max_consecutive_home <= 10, "{person:?}");
            for (first, last) in on_base_runs(&report, &person.person_id) {
                let interior = first > 0 && last < 13;
                assert!(!interior || last - first + 1 >= 3, "{person:?}");
            }
        }
    }

    #[test]
    fn test_weekend_only_person_serves_weekends() {
        let roster = roster(10).with_person(Person::weekend_only("W"));
        let request = RunRequest::new(roster, window(14), default_fortnight());
        let report = RosterEngine::new().run(&request).unwrap();
        assert_eq!(report.status, RunStatus::Success, "{:?}", report.error);

        assert!(report
            .assignments_for("W")
            .into_iter()
            .filter(|a| a.on_base)
            .all(|a| matches!(a.date.weekday(), Weekday::Fri | Weekday::Sat)));
        let w = report.metrics.as_ref().unwrap().person("W").unwrap();
        assert_eq!(w.base_days, w.weekend_base_days);
    }

    #[test]
    fn test_home_cap_respected() {
        // Targets sum below the floors, so workloads are ranges [4, 6] and
        // the cap of 9 home days is what rules out 4.
        let params = default_fortnight()
            .with_min_required(4)
            .with_base_days_target(5)
            .with_max_total_home_days(9);
        let request = RunRequest::new(roster(10), window(14), params);
        let report = RosterEngine::new().run(&request).unwrap();
        assert_eq!(report.status, RunStatus::Success, "{:?}", report.error);

        let metrics = report.metrics.as_ref().unwrap();
        assert!(metrics.min_daily_on_base >= 4);
        for person in &metrics.persons {
            assert!(person.home_days <= 9, "{person:?}");
        }
    }

    #[test]
    fn test_weights_adapted_to_difficulty() {
        // Two people for a floor of two: nothing to spare.
        let params = base_params()
            .with_min_required(2)
            .with_base_days_target(7)
            .with_single_day_blocks(true);
        let request = RunRequest::new(roster(2), window(7), params.clone());
        let prepared = RosterEngine::new().prepare(&request).unwrap();
        assert_eq!(prepared.analysis.difficulty, Difficulty::Apocalyptic);
        let adapted = &prepared.context.params.objective;
        let base = ObjectiveWeights::default();
        assert!(adapted.smoothness > base.smoothness);
        assert!(adapted.home_balance > base.home_balance);

        let pinned = RunRequest::new(
            roster(2),
            window(7),
            params.with_weights(ObjectiveWeights::default().pinned()),
        );
        let prepared = RosterEngine::new().prepare(&pinned).unwrap();
        assert_eq!(prepared.context.params.objective.smoothness, 0);
        assert_eq!(prepared.context.params.objective.home_balance, 10);
    }

    #[test]
    fn test_applied_weights_in_diagnostics() {
        let report = RosterEngine::new().run(&scenario_a()).unwrap();
        let weights = report.diagnostics.objective_weights.as_ref().unwrap();
        let difficulty = report.diagnostics.analysis.as_ref().unwrap().difficulty;
        assert_eq!(
            *weights,
            difficulty.adapt_weights(&ObjectiveWeights::default())
        );
    }
}
