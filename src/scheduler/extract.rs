//! Solution extraction and independent validation.
//!
//! [`ResultExtractor`] turns a duty grid into [`Assignment`] records.
//! [`Validator`] goes the other way: it rebuilds a grid from assignment
//! records and re-checks every enabled constraint group through the
//! groups' own `verify` functions, never through the solver model.

use crate::cp::{ConstraintAssembler, DutyGrid, ModelContext};
use crate::models::{Assignment, Violation, ViolationType};

/// Converts duty grids into assignment records.
pub struct ResultExtractor;

impl ResultExtractor {
    /// One assignment per (person, day), ordered by date then roster order.
    pub fn extract(ctx: &ModelContext, duty: &DutyGrid) -> Vec<Assignment> {
        let mut assignments = Vec::with_capacity(ctx.persons() * ctx.days());
        for (d, &date) in ctx.dates.iter().enumerate() {
            for p in 0..ctx.persons() {
                assignments.push(Assignment::new(ctx.person(p).id.clone(), date, duty.get(p, d)));
            }
        }
        assignments
    }
}

/// Re-checks assignment records against a run's hard constraints.
pub struct Validator<'a> {
    ctx: &'a ModelContext,
}

impl<'a> Validator<'a> {
    /// Creates a validator over a run context.
    pub fn new(ctx: &'a ModelContext) -> Self {
        Self { ctx }
    }

    /// Rebuilds a duty grid from assignment records.
    ///
    /// Fails when a row names an unknown person or a date outside the
    /// window, when a (person, day) pair appears twice, or when a pair has
    /// no row at all.
    pub fn to_grid(&self, assignments: &[Assignment]) -> Result<DutyGrid, Vec<Violation>> {
        let ctx = self.ctx;
        let mut duty = DutyGrid::new(ctx.persons(), ctx.days());
        let mut seen = vec![false; ctx.persons() * ctx.days()];
        let mut violations = Vec::new();

        for a in assignments {
            let (Some(p), Some(d)) = (ctx.index_of(&a.person_id), ctx.window.index_of(a.date))
            else {
                violations.push(
                    Violation::new(
                        ViolationType::UnexpectedAssignment,
                        "row outside the target roster or window",
                    )
                    .for_person(a.person_id.clone())
                    .on(a.date),
                );
                continue;
            };
            let cell = p * ctx.days() + d;
            if seen[cell] {
                violations.push(
                    Violation::new(ViolationType::UnexpectedAssignment, "duplicate row")
                        .for_person(a.person_id.clone())
                        .on(a.date),
                );
                continue;
            }
            seen[cell] = true;
            duty.set(p, d, a.on_base);
        }

        for p in 0..ctx.persons() {
            for d in 0..ctx.days() {
                if !seen[p * ctx.days() + d] {
                    violations.push(
                        Violation::new(ViolationType::MissingAssignment, "no row for this day")
                            .for_person(ctx.person(p).id.clone())
                            .on(ctx.dates[d]),
                    );
                }
            }
        }

        if violations.is_empty() {
            Ok(duty)
        } else {
            Err(violations)
        }
    }

    /// Every hard-constraint violation of a set of assignment records.
    pub fn validate(&self, assignments: &[Assignment]) -> Vec<Violation> {
        match self.to_grid(assignments) {
            Ok(duty) => ConstraintAssembler::new(self.ctx).verify(&duty),
            Err(violations) => violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateWindow, Person, RosterSnapshot, Unavailability};
    use crate::params::ParameterSet;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn ctx() -> ModelContext {
        let roster = RosterSnapshot::new()
            .with_person(Person::standard("A"))
            .with_person(Person::standard("B"))
            .with_unavailability(Unavailability::new("B", date(2)));
        let window = DateWindow::new(date(1), date(3)).unwrap();
        let params = ParameterSet::default()
            .with_min_required(1)
            .with_base_days_target(2)
            .with_consecutive_caps(3, 3)
            .with_single_day_blocks(true);
        ModelContext::new(&roster, window, params)
    }

    #[test]
    fn test_extract_order() {
        let ctx = ctx();
        let mut duty = DutyGrid::new(2, 3);
        duty.set(0, 0, true);
        duty.set(1, 2, true);
        let rows = ResultExtractor::extract(&ctx, &duty);

        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0], Assignment::new("A", date(1), true));
        assert_eq!(rows[1], Assignment::new("B", date(1), false));
        assert_eq!(rows[5], Assignment::new("B", date(3), true));
    }

    #[test]
    fn test_roundtrip_valid() {
        let ctx = ctx();
        let mut duty = DutyGrid::new(2, 3);
        for (p, d) in [(0, 0), (0, 1), (1, 0), (1, 2)] {
            duty.set(p, d, true);
        }
        let rows = ResultExtractor::extract(&ctx, &duty);
        let validator = Validator::new(&ctx);
        assert_eq!(validator.to_grid(&rows).unwrap(), duty);
        assert!(validator.validate(&rows).is_empty());
    }

    #[test]
    fn test_detects_tampered_rows() {
        let ctx = ctx();
        let mut duty = DutyGrid::new(2, 3);
        for (p, d) in [(0, 0), (0, 1), (1, 0), (1, 2)] {
            duty.set(p, d, true);
        }
        let mut rows = ResultExtractor::extract(&ctx, &duty);

        // B forced on-base on the unavailable day.
        rows[3].on_base = true;
        let violations = Validator::new(&ctx).validate(&rows);
        assert!(violations
            .iter()
            .any(|v| v.violation_type == ViolationType::Unavailable));

        rows.pop();
        rows.push(Assignment::new("ghost", date(1), true));
        let violations = Validator::new(&ctx).validate(&rows);
        assert!(violations
            .iter()
            .any(|v| v.violation_type == ViolationType::MissingAssignment));
        assert!(violations
            .iter()
            .any(|v| v.violation_type == ViolationType::UnexpectedAssignment));
    }
}
