//! Pre-solve problem analysis.
//!
//! Summarises how tight a run is before the solver starts, so that logs
//! and diagnostics can explain slow or infeasible runs.
//!
//! # Difficulty
//!
//! | Level | Heavily constrained persons | Availability ratio |
//! |-------|-----------------------------|--------------------|
//! | Apocalyptic | ≥ 3 | < 1.1 |
//! | Extreme | ≥ 2 | < 1.3 |
//! | Hard | ≥ 1 | < 1.5 |
//! | Medium | otherwise | otherwise |
//!
//! Either column alone is enough to reach a level. A person is heavily
//! constrained when more than 40% of the window is unavailable to them.
//!
//! # Weight adaptation
//!
//! Above Medium, the home-balance weight and the smoothness weight (raised
//! to at least 1) are multiplied by 2, 3 or 5 for Hard, Extreme and
//! Apocalyptic. Tighter runs then prefer rosters with fewer broken blocks
//! and evener home days. Pinned weights are left alone.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cp::ModelContext;
use crate::models::{PersonId, PersonKind};
use crate::params::ObjectiveWeights;

/// Unavailability ratio above which a person counts as heavily constrained.
const HEAVY_UNAVAILABILITY: f64 = 0.4;
/// Smoothness weight used above Medium when none was set.
const BASE_SMOOTHNESS: u32 = 1;

/// Coarse difficulty level of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Comfortable slack.
    Medium,
    /// Little slack.
    Hard,
    /// Very little slack.
    Extreme,
    /// Barely feasible, if at all.
    Apocalyptic,
}

impl Difficulty {
    /// Classifies a run.
    ///
    /// `ratio` is available over required person-days; `None` when no day
    /// carries a floor.
    pub fn classify(heavily_constrained: usize, ratio: Option<f64>) -> Self {
        let below = |threshold: f64| ratio.is_some_and(|r| r < threshold);
        if heavily_constrained >= 3 || below(1.1) {
            Self::Apocalyptic
        } else if heavily_constrained >= 2 || below(1.3) {
            Self::Extreme
        } else if heavily_constrained >= 1 || below(1.5) {
            Self::Hard
        } else {
            Self::Medium
        }
    }

    /// Multiplier applied to the adapted weights.
    pub fn weight_factor(self) -> u32 {
        match self {
            Self::Medium => 1,
            Self::Hard => 2,
            Self::Extreme => 3,
            Self::Apocalyptic => 5,
        }
    }

    /// Objective weights tuned to this level.
    pub fn adapt_weights(self, weights: &ObjectiveWeights) -> ObjectiveWeights {
        if weights.pinned || self == Self::Medium {
            return weights.clone();
        }
        let factor = self.weight_factor();
        ObjectiveWeights {
            home_balance: weights.home_balance.saturating_mul(factor),
            smoothness: weights.smoothness.max(BASE_SMOOTHNESS).saturating_mul(factor),
            ..weights.clone()
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
            Self::Extreme => write!(f, "extreme"),
            Self::Apocalyptic => write!(f, "apocalyptic"),
        }
    }
}

/// Pre-solve summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemAnalysis {
    /// Window length.
    pub total_days: usize,
    /// Target roster size.
    pub persons: usize,
    /// Σ daily floors.
    pub required_person_days: u64,
    /// Person-days that could be served (weekend-only persons count weekends only).
    pub available_person_days: u64,
    /// Available over required person-days.
    pub availability_ratio: Option<f64>,
    /// Exceptional persons.
    pub exceptional_count: usize,
    /// Weekend-only persons.
    pub weekend_only_count: usize,
    /// Persons unavailable on more than 40% of the window.
    pub heavily_constrained: Vec<PersonId>,
    /// Standard persons whose workload target was relaxed.
    pub relaxed_targets: usize,
    /// Overall difficulty.
    pub difficulty: Difficulty,
}

impl ProblemAnalysis {
    /// Analyses a run context.
    pub fn analyze(ctx: &ModelContext) -> Self {
        let days = ctx.days();
        let required: u64 = ctx.floors.iter().map(|&f| u64::from(f)).sum();

        let mut available: u64 = 0;
        let mut heavily_constrained = Vec::new();
        for (p, entry) in ctx.entries.iter().enumerate() {
            let servable = (0..days)
                .filter(|&d| ctx.is_available(p, d))
                .filter(|&d| entry.person.kind != PersonKind::WeekendOnly || ctx.weekend[d])
                .count();
            available += servable as u64;

            let unavailable = entry.unavailable_count() as f64 / days.max(1) as f64;
            if unavailable > HEAVY_UNAVAILABILITY {
                heavily_constrained.push(entry.person.id.clone());
            }
        }

        let count_kind = |kind: PersonKind| {
            ctx.entries
                .iter()
                .filter(|e| e.person.kind == kind)
                .count()
        };
        let relaxed_targets = ctx
            .entries
            .iter()
            .zip(ctx.plan.plans())
            .filter(|(e, plan)| e.person.kind == PersonKind::Standard && !plan.exact)
            .count();

        let availability_ratio = (required > 0).then(|| available as f64 / required as f64);
        let difficulty = Difficulty::classify(heavily_constrained.len(), availability_ratio);

        Self {
            total_days: days,
            persons: ctx.persons(),
            required_person_days: required,
            available_person_days: available,
            availability_ratio,
            exceptional_count: count_kind(PersonKind::Exceptional),
            weekend_only_count: count_kind(PersonKind::WeekendOnly),
            heavily_constrained,
            relaxed_targets,
            difficulty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateWindow, Person, RosterSnapshot};
    use crate::params::ParameterSet;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(Difficulty::classify(0, Some(2.0)), Difficulty::Medium);
        assert_eq!(Difficulty::classify(0, None), Difficulty::Medium);
        assert_eq!(Difficulty::classify(1, Some(2.0)), Difficulty::Hard);
        assert_eq!(Difficulty::classify(0, Some(1.4)), Difficulty::Hard);
        assert_eq!(Difficulty::classify(2, None), Difficulty::Extreme);
        assert_eq!(Difficulty::classify(0, Some(1.2)), Difficulty::Extreme);
        assert_eq!(Difficulty::classify(3, Some(5.0)), Difficulty::Apocalyptic);
        assert_eq!(Difficulty::classify(0, Some(1.05)), Difficulty::Apocalyptic);
    }

    #[test]
    fn test_weights_grow_with_difficulty() {
        let base = ObjectiveWeights::default();
        let medium = Difficulty::Medium.adapt_weights(&base);
        let apocalyptic = Difficulty::Apocalyptic.adapt_weights(&base);

        assert_eq!(medium, base);
        assert!(apocalyptic.smoothness > medium.smoothness);
        assert!(apocalyptic.home_balance > medium.home_balance);
        assert_eq!(apocalyptic.home_balance, 50);
        assert_eq!(apocalyptic.smoothness, 5);
        assert_eq!(apocalyptic.weekend_fairness, base.weekend_fairness);

        let levels = [
            Difficulty::Hard,
            Difficulty::Extreme,
            Difficulty::Apocalyptic,
        ];
        let weights: Vec<_> = levels.iter().map(|d| d.adapt_weights(&base)).collect();
        assert!(weights.windows(2).all(|w| w[0].home_balance < w[1].home_balance));
        assert!(weights.windows(2).all(|w| w[0].smoothness < w[1].smoothness));
    }

    #[test]
    fn test_pinned_weights_unchanged() {
        let pinned = ObjectiveWeights::default().pinned();
        assert_eq!(Difficulty::Apocalyptic.adapt_weights(&pinned), pinned);
    }

    #[test]
    fn test_analyze() {
        let roster = RosterSnapshot::new()
            .with_person(Person::standard("A"))
            .with_person(Person::exceptional("X"))
            .with_person(Person::weekend_only("W"))
            .with_unavailable_dates("X", (3..=5).map(date));
        let window = DateWindow::new(date(3), date(9)).unwrap();
        let params = ParameterSet::default()
            .with_min_required(1)
            .with_base_days_target(4);
        let ctx = ModelContext::new(&roster, window, params);
        let analysis = ProblemAnalysis::analyze(&ctx);

        assert_eq!(analysis.total_days, 7);
        assert_eq!(analysis.persons, 3);
        assert_eq!(analysis.required_person_days, 7);
        // A: 7, X: 4, W: 2 weekend days
        assert_eq!(analysis.available_person_days, 13);
        assert_eq!(analysis.exceptional_count, 1);
        assert_eq!(analysis.weekend_only_count, 1);
        // 3 of 7 days ≈ 0.43
        assert_eq!(analysis.heavily_constrained, vec!["X".to_string()]);
        assert_eq!(analysis.difficulty, Difficulty::Hard);
    }
}
