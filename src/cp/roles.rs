//! Role contributions.
//!
//! Each [`PersonKind`] contributes to the model through one
//! [`RoleContribution`]: which generic groups it is subject to, how its
//! workload is planned, which role-specific hard rules it adds and how
//! its home balance is scored.
//!
//! | Role | Generic groups | Own group | Balance term |
//! |------|----------------|-----------|--------------|
//! | Standard | all | none | home days vs `W − t` |
//! | Exceptional | all but workload | dynamic home range | home days vs `h` |
//! | WeekendOnly | unavailability, staffing | weekday ban, on-base cap | none |

use super::workload::{exceptional_plan, standard_plan, weekend_only_plan, PlanInputs};
use super::{DutyGrid, ModelContext, PersonPlan, RosterEntry, VarGrid};
use crate::models::{PersonKind, Violation, ViolationType};
use crate::params::{ConstraintGroupKind, DeviationShape};
use crate::solver::{BoolModel, PenaltyTerm, Shape};

/// How a kind of roster entry contributes to the model.
pub trait RoleContribution: Send + Sync {
    /// Kind handled.
    fn kind(&self) -> PersonKind;

    /// Whether persons of this kind are subject to a constraint group.
    fn subject_to(&self, group: ConstraintGroupKind) -> bool;

    /// Admissible workload of one person.
    fn plan(&self, entry: &RosterEntry, inputs: &PlanInputs<'_>) -> PersonPlan;

    /// Adds the role's own hard rules for the person at roster position `p`.
    /// Returns the number of constraints added.
    fn constrain(
        &self,
        _ctx: &ModelContext,
        _p: usize,
        _grid: &VarGrid,
        _model: &mut BoolModel,
    ) -> usize {
        0
    }

    /// Re-checks the role's own hard rules on a complete duty grid.
    fn verify(&self, _ctx: &ModelContext, _p: usize, _duty: &DutyGrid, _out: &mut Vec<Violation>) {}

    /// Home-balance penalty of one person, if the role is scored.
    fn balance_term(
        &self,
        _ctx: &ModelContext,
        _p: usize,
        _grid: &VarGrid,
        _weight: i64,
        _tag: u16,
    ) -> Option<PenaltyTerm> {
        None
    }
}

/// Rule contribution of a person kind.
pub fn role_of(kind: PersonKind) -> &'static dyn RoleContribution {
    match kind {
        PersonKind::Standard => &StandardRole,
        PersonKind::Exceptional => &ExceptionalRole,
        PersonKind::WeekendOnly => &WeekendOnlyRole,
    }
}

fn shape_of(shape: DeviationShape) -> Shape {
    match shape {
        DeviationShape::Absolute => Shape::Absolute,
        DeviationShape::Squared => Shape::Squared,
    }
}

fn home_deviation(
    ctx: &ModelContext,
    p: usize,
    grid: &VarGrid,
    weight: i64,
    tag: u16,
) -> PenaltyTerm {
    PenaltyTerm::Deviation {
        lits: grid.at_home_span(p, 0..ctx.days()),
        target: i64::from(ctx.plan.get(p).home_target),
        shape: shape_of(ctx.params.objective.deviation),
        weight,
        tag,
    }
}

/// Regular personnel.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRole;

impl RoleContribution for StandardRole {
    fn kind(&self) -> PersonKind {
        PersonKind::Standard
    }

    fn subject_to(&self, group: ConstraintGroupKind) -> bool {
        !matches!(
            group,
            ConstraintGroupKind::WeekendOnly | ConstraintGroupKind::Exceptional
        )
    }

    fn plan(&self, entry: &RosterEntry, inputs: &PlanInputs<'_>) -> PersonPlan {
        standard_plan(entry, inputs)
    }

    fn balance_term(
        &self,
        ctx: &ModelContext,
        p: usize,
        grid: &VarGrid,
        weight: i64,
        tag: u16,
    ) -> Option<PenaltyTerm> {
        Some(home_deviation(ctx, p, grid, weight, tag))
    }
}

/// Personnel with a dynamic home-day target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionalRole;

impl RoleContribution for ExceptionalRole {
    fn kind(&self) -> PersonKind {
        PersonKind::Exceptional
    }

    fn subject_to(&self, group: ConstraintGroupKind) -> bool {
        !matches!(
            group,
            ConstraintGroupKind::WorkloadTarget | ConstraintGroupKind::WeekendOnly
        )
    }

    fn plan(&self, entry: &RosterEntry, inputs: &PlanInputs<'_>) -> PersonPlan {
        exceptional_plan(entry, inputs)
    }

    fn constrain(
        &self,
        ctx: &ModelContext,
        p: usize,
        grid: &VarGrid,
        model: &mut BoolModel,
    ) -> usize {
        let days = ctx.days();
        let (home_min, home_max) = ctx.plan.get(p).home_range(days as u32);
        model.add_range(
            grid.at_home_span(p, 0..days),
            home_min,
            home_max,
            ConstraintGroupKind::Exceptional.tag(),
        )
    }

    fn verify(&self, ctx: &ModelContext, p: usize, duty: &DutyGrid, out: &mut Vec<Violation>) {
        let days = ctx.days();
        let (home_min, home_max) = ctx.plan.get(p).home_range(days as u32);
        let home = (days - duty.on_base_count(p)) as u32;
        if home < home_min || home > home_max {
            out.push(
                Violation::new(
                    ViolationType::ExceptionalBreach,
                    format!("{home} home days outside [{home_min}, {home_max}]"),
                )
                .for_person(ctx.person(p).id.clone()),
            );
        }
    }

    fn balance_term(
        &self,
        ctx: &ModelContext,
        p: usize,
        grid: &VarGrid,
        weight: i64,
        tag: u16,
    ) -> Option<PenaltyTerm> {
        Some(home_deviation(ctx, p, grid, weight, tag))
    }
}

/// Personnel who only serve on weekend days.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekendOnlyRole;

impl RoleContribution for WeekendOnlyRole {
    fn kind(&self) -> PersonKind {
        PersonKind::WeekendOnly
    }

    fn subject_to(&self, group: ConstraintGroupKind) -> bool {
        matches!(
            group,
            ConstraintGroupKind::Unavailability
                | ConstraintGroupKind::DailyStaffing
                | ConstraintGroupKind::WeekendOnly
        )
    }

    fn plan(&self, entry: &RosterEntry, inputs: &PlanInputs<'_>) -> PersonPlan {
        weekend_only_plan(entry, inputs)
    }

    fn constrain(
        &self,
        ctx: &ModelContext,
        p: usize,
        grid: &VarGrid,
        model: &mut BoolModel,
    ) -> usize {
        let tag = ConstraintGroupKind::WeekendOnly.tag();
        let weekdays: Vec<_> = (0..ctx.days())
            .filter(|&d| !ctx.weekend[d])
            .map(|d| grid.on_base(p, d))
            .collect();
        let mut added = 0;
        if !weekdays.is_empty() && model.add_at_most(weekdays, 0, tag) {
            added += 1;
        }
        if model.add_at_most(
            grid.on_base_span(p, 0..ctx.days()),
            ctx.plan.get(p).on_base_max,
            tag,
        ) {
            added += 1;
        }
        added
    }

    fn verify(&self, ctx: &ModelContext, p: usize, duty: &DutyGrid, out: &mut Vec<Violation>) {
        let id = &ctx.person(p).id;
        for d in 0..ctx.days() {
            if duty.get(p, d) && !ctx.weekend[d] {
                out.push(
                    Violation::new(ViolationType::WeekendOnlyBreach, "on-base on a weekday")
                        .for_person(id.clone())
                        .on(ctx.dates[d]),
                );
            }
        }
        let cap = ctx.plan.get(p).on_base_max as usize;
        let served = duty.on_base_count(p);
        if served > cap {
            out.push(
                Violation::new(
                    ViolationType::WeekendOnlyBreach,
                    format!("{served} on-base days exceed cap {cap}"),
                )
                .for_person(id.clone()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_dispatch() {
        for kind in [
            PersonKind::Standard,
            PersonKind::Exceptional,
            PersonKind::WeekendOnly,
        ] {
            assert_eq!(role_of(kind).kind(), kind);
        }
    }

    #[test]
    fn test_group_applicability() {
        let standard = role_of(PersonKind::Standard);
        let exceptional = role_of(PersonKind::Exceptional);
        let weekend = role_of(PersonKind::WeekendOnly);

        assert!(standard.subject_to(ConstraintGroupKind::WorkloadTarget));
        assert!(!standard.subject_to(ConstraintGroupKind::Exceptional));

        assert!(!exceptional.subject_to(ConstraintGroupKind::WorkloadTarget));
        assert!(exceptional.subject_to(ConstraintGroupKind::ConsecutiveRuns));
        assert!(exceptional.subject_to(ConstraintGroupKind::WeekendCap));
        assert!(exceptional.subject_to(ConstraintGroupKind::Exceptional));

        assert!(weekend.subject_to(ConstraintGroupKind::DailyStaffing));
        assert!(!weekend.subject_to(ConstraintGroupKind::ConsecutiveRuns));
        assert!(!weekend.subject_to(ConstraintGroupKind::MinimumBlock));
        assert!(weekend.subject_to(ConstraintGroupKind::WeekendOnly));
    }

    #[test]
    fn test_shape_mapping() {
        assert_eq!(shape_of(DeviationShape::Absolute), Shape::Absolute);
        assert_eq!(shape_of(DeviationShape::Squared), Shape::Squared);
    }
}
