//! Workload planning.
//!
//! Derives each person's admissible on-base range before the model is
//! built. Standard persons get a target with a tolerance band, exceptional
//! persons get a dynamic home target and weekend-only persons get a cap.
//!
//! # Exactness
//!
//! A standard target is enforced exactly only when it is structurally
//! plausible: the planned workload covers the daily floors, the target is
//! not clamped by unavailability and it fits between the minimum and
//! maximum on-base counts that the consecutive-run caps allow. Otherwise
//! the target is widened to `t ± max(tol, 1)`.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{role_of, RosterEntry};
use crate::params::ParameterSet;

/// Admissible workload of one person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonPlan {
    /// Fewest on-base days.
    pub on_base_min: u32,
    /// Most on-base days.
    pub on_base_max: u32,
    /// Planned on-base days.
    pub base_target: u32,
    /// Planned at-home days.
    pub home_target: u32,
    /// Whether `on_base_min == on_base_max == base_target` is enforced.
    pub exact: bool,
}

impl PersonPlan {
    /// At-home range implied by the on-base range over `days` days.
    pub fn home_range(&self, days: u32) -> (u32, u32) {
        (
            days.saturating_sub(self.on_base_max),
            days.saturating_sub(self.on_base_min),
        )
    }
}

/// Shared inputs of the per-person planning pass.
#[derive(Debug, Clone, Copy)]
pub struct PlanInputs<'a> {
    /// Resolved parameters.
    pub params: &'a ParameterSet,
    /// Per-day weekend flags.
    pub weekend: &'a [bool],
    /// Whether planned workloads cover the daily floors.
    pub coverage: bool,
}

impl PlanInputs<'_> {
    /// Window length.
    pub fn days(&self) -> u32 {
        self.weekend.len() as u32
    }
}

/// Workload plan of a whole roster, in roster order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadPlan {
    plans: Vec<PersonPlan>,
    coverage: bool,
}

impl WorkloadPlan {
    /// Plans every entry.
    ///
    /// The first pass estimates every person's workload without relaxation
    /// to decide coverage; the second pass plans each role with that
    /// knowledge.
    pub fn build(
        entries: &[RosterEntry],
        params: &ParameterSet,
        floors: &[u32],
        weekend: &[bool],
    ) -> Self {
        let required: u64 = floors.iter().map(|&f| u64::from(f)).sum();
        let estimate = PlanInputs {
            params,
            weekend,
            coverage: true,
        };
        let planned: u64 = entries
            .iter()
            .map(|e| u64::from(role_of(e.person.kind).plan(e, &estimate).base_target))
            .sum();
        let coverage = planned >= required;
        if !coverage {
            warn!(
                planned,
                required, "planned workload below daily floors, relaxing standard targets"
            );
        }

        let inputs = PlanInputs {
            params,
            weekend,
            coverage,
        };
        let plans = entries
            .iter()
            .map(|e| role_of(e.person.kind).plan(e, &inputs))
            .collect();

        Self { plans, coverage }
    }

    /// Plan of the person at a roster position.
    pub fn get(&self, p: usize) -> &PersonPlan {
        &self.plans[p]
    }

    /// Every plan, in roster order.
    pub fn plans(&self) -> &[PersonPlan] {
        &self.plans
    }

    /// Whether planned workloads cover the daily floors.
    pub fn coverage(&self) -> bool {
        self.coverage
    }

    /// Number of plans relaxed away from an exact target.
    pub fn relaxed_count(&self) -> usize {
        self.plans.iter().filter(|p| !p.exact).count()
    }
}

/// `ceil(fraction × n)`, robust to binary rounding of the product.
pub(crate) fn ceil_fraction(fraction: f64, n: u32) -> u32 {
    let scaled = fraction * f64::from(n) - 1e-9;
    scaled.ceil().max(0.0) as u32
}

/// Plan of a standard person.
pub(crate) fn standard_plan(entry: &RosterEntry, inputs: &PlanInputs<'_>) -> PersonPlan {
    let params = inputs.params;
    let id = entry.person.id.as_str();
    let days = inputs.days();
    let available = entry.available_count() as u32;
    let target = params.base_target_for(id);
    let t = target.min(available);

    let max_base = params.max_consecutive_base_for(id);
    let max_home = params.max_consecutive_home_for(id);
    let reachable_max = days - days / max_base.saturating_add(1);
    let reachable_min = days / max_home.saturating_add(1);

    let exact = inputs.coverage && t == target && t <= reachable_max && t >= reachable_min;
    let (on_base_min, on_base_max) = if exact {
        (t, t)
    } else {
        let tol = ceil_fraction(params.workload_tolerance_fraction, t).max(1);
        (t.saturating_sub(tol), (t + tol).min(available))
    };

    PersonPlan {
        on_base_min,
        on_base_max,
        base_target: t,
        home_target: days - t,
        exact,
    }
}

/// Plan of an exceptional person.
pub(crate) fn exceptional_plan(entry: &RosterEntry, inputs: &PlanInputs<'_>) -> PersonPlan {
    let policy = &inputs.params.exceptional;
    let days = inputs.days();
    let unavailable = entry.unavailable_count() as u32;

    let margin = (policy.safety_margin_fraction * f64::from(days)).round() as u32;
    let threshold = (policy.max_home_fraction * f64::from(days)).floor() as u32;
    let home = (unavailable + margin)
        .min(threshold.max(unavailable))
        .min(days);

    let tol = ceil_fraction(inputs.params.workload_tolerance_fraction, home);
    let home_min = home.saturating_sub(tol).max(unavailable);
    let home_max = (home + tol).min(days);

    PersonPlan {
        on_base_min: days - home_max,
        on_base_max: days - home_min,
        base_target: days - home,
        home_target: home,
        exact: false,
    }
}

/// Plan of a weekend-only person.
pub(crate) fn weekend_only_plan(entry: &RosterEntry, inputs: &PlanInputs<'_>) -> PersonPlan {
    let days = inputs.days();
    let weekend_days = inputs.weekend.iter().filter(|&&w| w).count() as u32;
    let available_weekend = inputs
        .weekend
        .iter()
        .zip(&entry.unavailable)
        .filter(|(w, u)| **w && !**u)
        .count() as u32;
    let cap = inputs
        .params
        .weekend_only_max_base_days
        .unwrap_or(weekend_days)
        .min(available_weekend);

    PersonPlan {
        on_base_min: 0,
        on_base_max: cap,
        base_target: cap,
        home_target: days - cap,
        exact: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Person;

    fn entry(person: Person, days: usize, unavailable: &[usize]) -> RosterEntry {
        let mut flags = vec![false; days];
        for &d in unavailable {
            flags[d] = true;
        }
        RosterEntry {
            person,
            unavailable: flags,
        }
    }

    #[test]
    fn test_ceil_fraction() {
        assert_eq!(ceil_fraction(0.2, 10), 2);
        assert_eq!(ceil_fraction(0.2, 4), 1);
        assert_eq!(ceil_fraction(0.1, 7), 1);
        assert_eq!(ceil_fraction(0.0, 7), 0);
        // 0.1 × 30 = 3.0000000000000004 in binary.
        assert_eq!(ceil_fraction(0.1, 30), 3);
    }

    #[test]
    fn test_standard_exact_when_covered() {
        let params = ParameterSet::default()
            .with_base_days_target(4)
            .with_consecutive_caps(3, 3);
        let weekend = vec![false; 7];
        let inputs = PlanInputs {
            params: &params,
            weekend: &weekend,
            coverage: true,
        };
        let plan = standard_plan(&entry(Person::standard("A"), 7, &[]), &inputs);
        assert!(plan.exact);
        assert_eq!((plan.on_base_min, plan.on_base_max), (4, 4));
        assert_eq!(plan.home_target, 3);
    }

    #[test]
    fn test_standard_relaxed_without_coverage() {
        let params = ParameterSet::default()
            .with_base_days_target(4)
            .with_consecutive_caps(3, 3);
        let weekend = vec![false; 7];
        let inputs = PlanInputs {
            params: &params,
            weekend: &weekend,
            coverage: false,
        };
        let plan = standard_plan(&entry(Person::standard("A"), 7, &[]), &inputs);
        assert!(!plan.exact);
        assert_eq!((plan.on_base_min, plan.on_base_max), (3, 5));
    }

    #[test]
    fn test_standard_clamped_by_unavailability() {
        let params = ParameterSet::default()
            .with_base_days_target(6)
            .with_consecutive_caps(7, 7);
        let weekend = vec![false; 7];
        let inputs = PlanInputs {
            params: &params,
            weekend: &weekend,
            coverage: true,
        };
        let plan = standard_plan(&entry(Person::standard("A"), 7, &[0, 1, 2]), &inputs);
        assert!(!plan.exact);
        assert_eq!(plan.base_target, 4);
        assert_eq!(plan.on_base_max, 4);
        assert_eq!(plan.on_base_min, 3);
    }

    #[test]
    fn test_standard_target_beyond_run_cap() {
        // With at most 2 consecutive on-base days, 10 days allow at most 7.
        let params = ParameterSet::default()
            .with_base_days_target(9)
            .with_consecutive_caps(2, 5);
        let weekend = vec![false; 10];
        let inputs = PlanInputs {
            params: &params,
            weekend: &weekend,
            coverage: true,
        };
        let plan = standard_plan(&entry(Person::standard("A"), 10, &[]), &inputs);
        assert!(!plan.exact);
    }

    #[test]
    fn test_exceptional_home_target() {
        let params = ParameterSet::default().with_tolerance(0.1);
        let weekend = vec![false; 20];
        let inputs = PlanInputs {
            params: &params,
            weekend: &weekend,
            coverage: true,
        };
        let plan = exceptional_plan(&entry(Person::exceptional("X"), 20, &[2, 9, 15]), &inputs);
        // 3 unavailable + round(0.2 × 20) = 7, below ⌊0.5 × 20⌋.
        assert_eq!(plan.home_target, 7);
        assert_eq!(plan.home_range(20), (6, 8));
        assert_eq!((plan.on_base_min, plan.on_base_max), (12, 14));
    }

    #[test]
    fn test_exceptional_home_threshold() {
        let params = ParameterSet::default();
        let weekend = vec![false; 10];
        let inputs = PlanInputs {
            params: &params,
            weekend: &weekend,
            coverage: true,
        };
        // 4 + 2 = 6 > ⌊0.5 × 10⌋ = 5.
        let plan = exceptional_plan(&entry(Person::exceptional("X"), 10, &[0, 1, 2, 3]), &inputs);
        assert_eq!(plan.home_target, 5);
        // Never below the unavailable count.
        let plan = exceptional_plan(
            &entry(Person::exceptional("Y"), 10, &[0, 1, 2, 3, 4, 5, 6]),
            &inputs,
        );
        assert_eq!(plan.home_target, 7);
        assert!(plan.home_range(10).0 >= 7);
    }

    #[test]
    fn test_weekend_only_cap() {
        let params = ParameterSet::default();
        let weekend = vec![false, false, false, false, true, true, false];
        let inputs = PlanInputs {
            params: &params,
            weekend: &weekend,
            coverage: true,
        };
        let plan = weekend_only_plan(&entry(Person::weekend_only("W"), 7, &[]), &inputs);
        assert_eq!((plan.on_base_min, plan.on_base_max), (0, 2));

        let plan = weekend_only_plan(&entry(Person::weekend_only("W"), 7, &[5]), &inputs);
        assert_eq!(plan.on_base_max, 1);

        let capped = ParameterSet {
            weekend_only_max_base_days: Some(1),
            ..params.clone()
        };
        let inputs = PlanInputs {
            params: &capped,
            ..inputs
        };
        let plan = weekend_only_plan(&entry(Person::weekend_only("W"), 7, &[]), &inputs);
        assert_eq!(plan.on_base_max, 1);
    }

    #[test]
    fn test_build_detects_shortfall() {
        let params = ParameterSet::default()
            .with_base_days_target(4)
            .with_consecutive_caps(3, 3);
        let entries: Vec<RosterEntry> = (0..5)
            .map(|i| entry(Person::standard(format!("P{i}")), 7, &[]))
            .collect();
        let weekend = vec![false; 7];

        // 5 × 4 = 20 < 7 × 3 = 21
        let plan = WorkloadPlan::build(&entries, &params, &[3; 7], &weekend);
        assert!(!plan.coverage());
        assert_eq!(plan.relaxed_count(), 5);

        let plan = WorkloadPlan::build(&entries, &params, &[2; 7], &weekend);
        assert!(plan.coverage());
        assert_eq!(plan.relaxed_count(), 0);
        assert_eq!(plan.get(0).on_base_min, 4);
    }
}
