//! Roster formulation.
//!
//! Translates a roster, a date window and a resolved [`ParameterSet`] into
//! a [`BoolModel`], solves it with any [`CpSolver`] and decodes the result
//! into a [`DutyGrid`].
//!
//! # Modules
//!
//! - **`variables`**: One boolean per (person, day)
//! - **`roles`**: Per-kind rule contributions (standard, exceptional, weekend-only)
//! - **`workload`**: Per-person on-base ranges and home targets
//! - **`constraints`**: Declarative hard-constraint groups
//! - **`objective`**: Declarative weighted penalty terms
//!
//! # Reference
//! - Ernst et al. (2004), "Staff scheduling and rostering: A review of
//!   applications, methods and models", EJOR 153(1)
//! - Burke et al. (2004), "The State of the Art of Nurse Rostering"

mod constraints;
mod objective;
mod roles;
mod variables;
mod workload;

pub use constraints::{ConstraintAssembler, ConstraintGroup, CONSTRAINT_GROUPS};
pub use objective::{ObjectiveComposer, PenaltyDescriptor, PENALTY_TERMS};
pub use roles::{role_of, RoleContribution};
pub use variables::{DutyGrid, VarGrid, VariableFactory};
pub use workload::{PersonPlan, WorkloadPlan};

use chrono::NaiveDate;
use tracing::debug;

use crate::models::{DateWindow, Person, RosterSnapshot};
use crate::params::{ConstraintGroupKind, ParameterSet, PenaltyKind};
use crate::solver::{BoolModel, CancellationToken, CpSolution, CpSolver};

/// Maximum number of groups reported as infeasibility hints.
const MAX_HINTS: usize = 3;

/// A target-roster member with their unavailability projected onto the window.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    /// The person.
    pub person: Person,
    /// Per-day unavailability flags.
    pub unavailable: Vec<bool>,
}

impl RosterEntry {
    /// Number of unavailable days inside the window.
    pub fn unavailable_count(&self) -> usize {
        self.unavailable.iter().filter(|&&u| u).count()
    }

    /// Number of days the person could serve.
    pub fn available_count(&self) -> usize {
        self.unavailable.len() - self.unavailable_count()
    }
}

/// Everything the model builders need about one run.
#[derive(Debug, Clone)]
pub struct ModelContext {
    /// Target roster, in roster order.
    pub entries: Vec<RosterEntry>,
    /// Run window.
    pub window: DateWindow,
    /// Window days.
    pub dates: Vec<NaiveDate>,
    /// Per-day weekend flags.
    pub weekend: Vec<bool>,
    /// Per-day on-base floors.
    pub floors: Vec<u32>,
    /// Resolved parameters.
    pub params: ParameterSet,
    /// Per-person workload plan.
    pub plan: WorkloadPlan,
}

impl ModelContext {
    /// Projects a roster snapshot onto a window.
    ///
    /// Inactive persons are dropped; unavailability outside the window is
    /// ignored.
    pub fn new(roster: &RosterSnapshot, window: DateWindow, params: ParameterSet) -> Self {
        let dates = window.days();
        let weekend = window.weekend_mask(&params.weekend_days);
        let floors: Vec<u32> = dates
            .iter()
            .zip(&weekend)
            .map(|(date, &is_weekend)| params.floor_on(*date, is_weekend))
            .collect();

        let entries: Vec<RosterEntry> = roster
            .active_persons()
            .map(|person| {
                let mut unavailable = vec![false; dates.len()];
                for record in roster
                    .unavailability
                    .iter()
                    .filter(|u| u.person_id == person.id)
                {
                    if let Some(d) = window.index_of(record.date) {
                        unavailable[d] = true;
                    }
                }
                RosterEntry {
                    person: person.clone(),
                    unavailable,
                }
            })
            .collect();

        let plan = WorkloadPlan::build(&entries, &params, &floors, &weekend);

        Self {
            entries,
            window,
            dates,
            weekend,
            floors,
            params,
            plan,
        }
    }

    /// Number of persons in the target roster.
    #[inline]
    pub fn persons(&self) -> usize {
        self.entries.len()
    }

    /// Number of days in the window.
    #[inline]
    pub fn days(&self) -> usize {
        self.dates.len()
    }

    /// Number of weekend days in the window.
    pub fn weekend_days(&self) -> usize {
        self.weekend.iter().filter(|&&w| w).count()
    }

    /// Person at a roster position.
    #[inline]
    pub fn person(&self, p: usize) -> &Person {
        &self.entries[p].person
    }

    /// Whether a person may serve on a day (ignoring role rules).
    #[inline]
    pub fn is_available(&self, p: usize, d: usize) -> bool {
        !self.entries[p].unavailable[d]
    }

    /// Rule contribution of the person at a roster position.
    pub fn role(&self, p: usize) -> &'static dyn RoleContribution {
        role_of(self.entries[p].person.kind)
    }

    /// Roster positions whose role is subject to a group.
    pub fn subject_to(&self, group: ConstraintGroupKind) -> impl Iterator<Item = usize> + '_ {
        (0..self.persons()).filter(move |&p| self.role(p).subject_to(group))
    }

    /// Roster position of a person id.
    pub fn index_of(&self, person_id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.person.id == person_id)
    }
}

/// A built model with its variable layout and composition statistics.
#[derive(Debug, Clone)]
pub struct BuiltModel {
    /// The model.
    pub model: BoolModel,
    /// Variable layout.
    pub grid: VarGrid,
    /// Constraints emitted per enabled group.
    pub group_sizes: Vec<(ConstraintGroupKind, usize)>,
    /// Terms emitted per enabled penalty.
    pub term_sizes: Vec<(PenaltyKind, usize)>,
}

/// Builds and solves the roster model of one run.
///
/// # Example
/// ```no_run
/// use u_roster::cp::{ModelContext, RosterCpBuilder};
/// use u_roster::models::{DateWindow, Person, RosterSnapshot};
/// use u_roster::params::ParameterSet;
/// use u_roster::solver::{BranchAndBoundSolver, CancellationToken};
/// use chrono::NaiveDate;
///
/// let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
/// let window = DateWindow::from_start(start, 7).unwrap();
/// let roster = RosterSnapshot::new().with_person(Person::standard("A"));
/// let params = ParameterSet::default().with_min_required(1).with_base_days_target(4);
/// let ctx = ModelContext::new(&roster, window, params);
///
/// let builder = RosterCpBuilder::new(&ctx);
/// let (built, solution) = builder.solve(
///     &BranchAndBoundSolver::new(),
///     &ctx.params.solver_config(),
///     &CancellationToken::new(),
/// );
/// let duty = builder.decode(&built, &solution);
/// ```
pub struct RosterCpBuilder<'a> {
    ctx: &'a ModelContext,
}

impl<'a> RosterCpBuilder<'a> {
    /// Creates a builder over a run context.
    pub fn new(ctx: &'a ModelContext) -> Self {
        Self { ctx }
    }

    /// Builds the model.
    ///
    /// Creates:
    /// - One variable per (person, day), branched day by day
    /// - Every enabled constraint group
    /// - Every enabled penalty term
    pub fn build(&self) -> BuiltModel {
        let mut model = BoolModel::new(format!("roster {}..{}", self.ctx.window.start, self.ctx.window.end));
        let grid = VariableFactory::allocate(&mut model, self.ctx.persons(), self.ctx.days());
        let group_sizes = ConstraintAssembler::new(self.ctx).assemble(&grid, &mut model);
        let term_sizes = ObjectiveComposer::new(self.ctx).compose(&grid, &mut model);

        debug!(
            variables = model.var_count(),
            constraints = model.constraint_count(),
            terms = model.term_count(),
            groups = ?group_sizes,
            "roster model built"
        );

        BuiltModel {
            model,
            grid,
            group_sizes,
            term_sizes,
        }
    }

    /// Builds and solves the model.
    pub fn solve<S: CpSolver + ?Sized>(
        &self,
        solver: &S,
        config: &crate::solver::SolverConfig,
        cancel: &CancellationToken,
    ) -> (BuiltModel, CpSolution) {
        let built = self.build();
        let solution = solver.solve(&built.model, config, cancel);
        (built, solution)
    }

    /// Decodes a solution into a duty grid.
    pub fn decode(&self, built: &BuiltModel, solution: &CpSolution) -> Option<DutyGrid> {
        if !solution.is_solution_found() {
            return None;
        }
        solution
            .values
            .as_ref()
            .map(|values| DutyGrid::from_values(&built.grid, values))
    }

    /// Constraint groups most involved in conflicts, most likely first.
    pub fn infeasibility_hints(solution: &CpSolution) -> Vec<ConstraintGroupKind> {
        solution
            .conflict_ranking()
            .into_iter()
            .filter_map(|(tag, _)| ConstraintGroupKind::from_tag(tag))
            .take(MAX_HINTS)
            .collect()
    }
}
