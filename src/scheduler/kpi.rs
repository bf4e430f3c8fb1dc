//! Roster fairness metrics.
//!
//! Computes workload-distribution indicators from a validated duty grid.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Mean base days | mean over persons of on-base day counts |
//! | Base-day variance | population variance of on-base day counts |
//! | Base-day spread | max − min on-base day count |
//! | Min daily on-base | smallest on-base head count of any day |
//! | Per person | on-base, at-home, weekend on-base, longest on-base and at-home runs |
//!
//! # Reference
//! Burke et al. (2004), "The State of the Art of Nurse Rostering",
//! J. Scheduling 7(6), Sec. 5 (fairness measures)

use serde::{Deserialize, Serialize};

use crate::cp::{DutyGrid, ModelContext};
use crate::models::{PersonId, PersonKind};

/// Per-person workload figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonMetrics {
    /// Person.
    pub person_id: PersonId,
    /// Role of the person.
    pub kind: PersonKind,
    /// On-base days.
    pub base_days: usize,
    /// At-home days.
    pub home_days: usize,
    /// On-base weekend days.
    pub weekend_base_days: usize,
    /// Longest on-base streak.
    pub max_consecutive_base: usize,
    /// Longest at-home streak.
    pub max_consecutive_home: usize,
}

/// Fairness indicators of a roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessMetrics {
    /// Mean on-base days per person.
    pub mean_base_days: f64,
    /// Population variance of on-base days.
    pub base_days_variance: f64,
    /// Largest minus smallest on-base day count.
    pub base_days_spread: usize,
    /// Smallest on-base head count of any day.
    pub min_daily_on_base: usize,
    /// Total on-base person-days.
    pub total_base_days: usize,
    /// Per-person figures, in roster order.
    pub persons: Vec<PersonMetrics>,
}

impl FairnessMetrics {
    /// Computes metrics from a duty grid and its run context.
    pub fn calculate(ctx: &ModelContext, duty: &DutyGrid) -> Self {
        let days = duty.days();
        let persons: Vec<PersonMetrics> = (0..duty.persons())
            .map(|p| {
                let person = ctx.person(p);
                let base_days = duty.on_base_count(p);
                PersonMetrics {
                    person_id: person.id.clone(),
                    kind: person.kind,
                    base_days,
                    home_days: days - base_days,
                    weekend_base_days: duty.on_base_where(p, &ctx.weekend),
                    max_consecutive_base: duty.longest_run(p, true),
                    max_consecutive_home: duty.longest_run(p, false),
                }
            })
            .collect();

        let counts: Vec<f64> = persons.iter().map(|m| m.base_days as f64).collect();
        let (mean, variance) = mean_and_variance(&counts);
        let total_base_days = persons.iter().map(|m| m.base_days).sum();
        let base_days_spread = match (
            persons.iter().map(|m| m.base_days).max(),
            persons.iter().map(|m| m.base_days).min(),
        ) {
            (Some(max), Some(min)) => max - min,
            _ => 0,
        };
        let min_daily_on_base = (0..days).map(|d| duty.day_count(d)).min().unwrap_or(0);

        Self {
            mean_base_days: mean,
            base_days_variance: variance,
            base_days_spread,
            min_daily_on_base,
            total_base_days,
            persons,
        }
    }

    /// Figures of one person.
    pub fn person(&self, person_id: &str) -> Option<&PersonMetrics> {
        self.persons.iter().find(|m| m.person_id == person_id)
    }

    /// Whether the roster meets the given fairness thresholds.
    pub fn meets_thresholds(&self, max_variance: f64, min_daily_on_base: usize) -> bool {
        self.base_days_variance <= max_variance && self.min_daily_on_base >= min_daily_on_base
    }
}

fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}
