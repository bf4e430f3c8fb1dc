//! Weighted objective.
//!
//! Every soft goal is a [`PenaltyDescriptor`]: a weight accessor and a
//! build function. The [`ObjectiveComposer`] adds the terms of every
//! descriptor whose weight is positive and which is not switched off.
//!
//! # Terms
//!
//! | Penalty | Term |
//! |---------|------|
//! | HomeBalance | per person, shape(home days − home target) |
//! | WeekendFairness | per eligible person, (weekend on-base − ideal)² |
//! | ExceptionalSpread | per day and exceptional pair, both at home |
//! | Smoothness | interior one-day blocks; on-base runs longer than 2L |
//! | EventOverride | losing event values as shortfall, deviation, excess or pattern terms |

use super::{ModelContext, VarGrid};
use crate::models::PersonKind;
use crate::params::{ParameterKey, ParameterScope, ParameterSet, PenaltyKind, SoftOverride};
use crate::solver::{BoolModel, Lit, PenaltyTerm, Shape};

/// Declarative description of one objective term family.
#[derive(Clone, Copy)]
pub struct PenaltyDescriptor {
    /// Term identity.
    pub kind: PenaltyKind,
    /// Weight of the family.
    pub weight: fn(&ParameterSet) -> u32,
    /// Emits the family's terms at a weight; returns how many were added.
    pub build: fn(&ModelContext, &VarGrid, &mut BoolModel, i64) -> usize,
}

impl std::fmt::Debug for PenaltyDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PenaltyDescriptor")
            .field("kind", &self.kind)
            .finish()
    }
}

/// Every penalty family, in composition order.
pub const PENALTY_TERMS: &[PenaltyDescriptor] = &[
    PenaltyDescriptor {
        kind: PenaltyKind::HomeBalance,
        weight: weight_home_balance,
        build: build_home_balance,
    },
    PenaltyDescriptor {
        kind: PenaltyKind::WeekendFairness,
        weight: weight_weekend_fairness,
        build: build_weekend_fairness,
    },
    PenaltyDescriptor {
        kind: PenaltyKind::ExceptionalSpread,
        weight: weight_exceptional_spread,
        build: build_exceptional_spread,
    },
    PenaltyDescriptor {
        kind: PenaltyKind::Smoothness,
        weight: weight_smoothness,
        build: build_smoothness,
    },
    PenaltyDescriptor {
        kind: PenaltyKind::EventOverride,
        weight: weight_event_override,
        build: build_event_overrides,
    },
];

fn weight_home_balance(params: &ParameterSet) -> u32 {
    params.objective.home_balance
}

fn weight_weekend_fairness(params: &ParameterSet) -> u32 {
    params.objective.weekend_fairness
}

fn weight_exceptional_spread(params: &ParameterSet) -> u32 {
    params.objective.exceptional_spread
}

fn weight_smoothness(params: &ParameterSet) -> u32 {
    params.objective.smoothness
}

fn weight_event_override(params: &ParameterSet) -> u32 {
    params.objective.event_override
}

/// Composes the objective of one run.
pub struct ObjectiveComposer<'a> {
    ctx: &'a ModelContext,
}

impl<'a> ObjectiveComposer<'a> {
    /// Creates a composer over a run context.
    pub fn new(ctx: &'a ModelContext) -> Self {
        Self { ctx }
    }

    /// Adds every active family; returns the term count per family.
    pub fn compose(&self, grid: &VarGrid, model: &mut BoolModel) -> Vec<(PenaltyKind, usize)> {
        let params = &self.ctx.params;
        let mut sizes = Vec::new();
        for family in PENALTY_TERMS {
            let weight = (family.weight)(params);
            if weight == 0 || !params.penalty_enabled(family.kind) {
                continue;
            }
            let added = (family.build)(self.ctx, grid, model, i64::from(weight));
            sizes.push((family.kind, added));
        }
        sizes
    }
}

// ================================
// Balance and fairness
// ================================

fn build_home_balance(
    ctx: &ModelContext,
    grid: &VarGrid,
    model: &mut BoolModel,
    weight: i64,
) -> usize {
    let tag = PenaltyKind::HomeBalance.tag();
    let mut added = 0;
    for p in 0..ctx.persons() {
        if let Some(term) = ctx.role(p).balance_term(ctx, p, grid, weight, tag) {
            if model.add_penalty(term) {
                added += 1;
            }
        }
    }
    added
}

/// Persons with at least one available weekend day.
fn weekend_eligible(ctx: &ModelContext) -> Vec<usize> {
    (0..ctx.persons())
        .filter(|&p| (0..ctx.days()).any(|d| ctx.weekend[d] && ctx.is_available(p, d)))
        .collect()
}

/// Fair share of weekend on-base days.
fn weekend_ideal(ctx: &ModelContext, eligible: usize) -> i64 {
    if eligible == 0 {
        return 0;
    }
    let demand: u32 = (0..ctx.days())
        .filter(|&d| ctx.weekend[d])
        .map(|d| ctx.floors[d])
        .sum();
    (f64::from(demand) / eligible as f64).round() as i64
}

fn build_weekend_fairness(
    ctx: &ModelContext,
    grid: &VarGrid,
    model: &mut BoolModel,
    weight: i64,
) -> usize {
    let eligible = weekend_eligible(ctx);
    let target = weekend_ideal(ctx, eligible.len());
    let tag = PenaltyKind::WeekendFairness.tag();
    eligible
        .into_iter()
        .filter(|&p| {
            let lits: Vec<Lit> = (0..ctx.days())
                .filter(|&d| ctx.weekend[d])
                .map(|d| grid.on_base(p, d))
                .collect();
            model.add_penalty(PenaltyTerm::Deviation {
                lits,
                target,
                shape: Shape::Squared,
                weight,
                tag,
            })
        })
        .count()
}

fn build_exceptional_spread(
    ctx: &ModelContext,
    grid: &VarGrid,
    model: &mut BoolModel,
    weight: i64,
) -> usize {
    if !ctx.params.exceptional.adaptive {
        return 0;
    }
    let tag = PenaltyKind::ExceptionalSpread.tag();
    let exceptional: Vec<usize> = (0..ctx.persons())
        .filter(|&p| ctx.person(p).kind == PersonKind::Exceptional)
        .collect();

    let mut added = 0;
    for (i, &a) in exceptional.iter().enumerate() {
        for &b in &exceptional[i + 1..] {
            for d in 0..ctx.days() {
                // Forced-home days cannot be spread.
                if !ctx.is_available(a, d) || !ctx.is_available(b, d) {
                    continue;
                }
                let term = PenaltyTerm::Conjunction {
                    lits: vec![grid.at_home(a, d), grid.at_home(b, d)],
                    weight,
                    tag,
                };
                if model.add_penalty(term) {
                    added += 1;
                }
            }
        }
    }
    added
}

// ================================
// Block shape
// ================================

/// Terms penalising every `len`-day window that person `p` spends entirely
/// on-base (or entirely at home).
fn run_terms(
    grid: &VarGrid,
    p: usize,
    days: usize,
    len: usize,
    on_base: bool,
    weight: i64,
    tag: u16,
) -> Vec<PenaltyTerm> {
    if len == 0 || len > days {
        return Vec::new();
    }
    (0..=days - len)
        .map(|s| PenaltyTerm::Conjunction {
            lits: if on_base {
                grid.on_base_span(p, s..s + len)
            } else {
                grid.at_home_span(p, s..s + len)
            },
            weight,
            tag,
        })
        .collect()
}

/// Terms penalising an on-base block that starts on day `d ≥ 1` and ends
/// before day `d + min_block − 1`.
fn short_block_terms(
    grid: &VarGrid,
    p: usize,
    days: usize,
    min_block: usize,
    weight: i64,
    tag: u16,
) -> Vec<PenaltyTerm> {
    let mut terms = Vec::new();
    for d in 1..days {
        for k in (1..min_block).take_while(|k| d + k < days) {
            let mut lits = vec![grid.at_home(p, d - 1), grid.on_base(p, d)];
            lits.extend(grid.on_base_span(p, d + 1..d + k));
            lits.push(grid.at_home(p, d + k));
            terms.push(PenaltyTerm::Conjunction { lits, weight, tag });
        }
    }
    terms
}

fn build_smoothness(
    ctx: &ModelContext,
    grid: &VarGrid,
    model: &mut BoolModel,
    weight: i64,
) -> usize {
    let tag = PenaltyKind::Smoothness.tag();
    let days = ctx.days();
    let mut added = 0;
    for p in 0..ctx.persons() {
        if ctx.person(p).kind == PersonKind::WeekendOnly {
            continue;
        }
        let id = &ctx.person(p).id;
        let min_block = ctx.params.min_block_for(id) as usize;
        let max_base = ctx.params.max_consecutive_base_for(id) as usize;

        let mut terms = Vec::new();
        if !ctx.params.blocks_enforced_for(id) {
            terms.extend(short_block_terms(grid, p, days, 2, weight, tag));
        }
        let long = 2 * min_block + 1;
        if long <= max_base {
            terms.extend(run_terms(grid, p, days, long, true, weight, tag));
        }
        for term in terms {
            if model.add_penalty(term) {
                added += 1;
            }
        }
    }
    added
}

// ================================
// Event overrides
// ================================

fn soft_override_terms(
    ctx: &ModelContext,
    grid: &VarGrid,
    soft: &SoftOverride,
    weight: i64,
    tag: u16,
) -> Vec<PenaltyTerm> {
    let days = ctx.days();
    let value = soft.value as usize;
    match (&soft.scope, soft.key) {
        (ParameterScope::Day(date), ParameterKey::MinRequiredPerDay) => {
            match ctx.window.index_of(*date) {
                Some(d) if soft.value > ctx.floors[d] => vec![PenaltyTerm::Deviation {
                    lits: grid.day_on_base(d),
                    target: i64::from(soft.value),
                    shape: Shape::Shortfall,
                    weight,
                    tag,
                }],
                _ => Vec::new(),
            }
        }
        (ParameterScope::Person(id), key) => {
            let Some(p) = ctx.index_of(id) else {
                return Vec::new();
            };
            match key {
                ParameterKey::BaseDaysTarget => vec![PenaltyTerm::Deviation {
                    lits: grid.on_base_span(p, 0..days),
                    target: i64::from(soft.value),
                    shape: Shape::Absolute,
                    weight,
                    tag,
                }],
                ParameterKey::MaxTotalHomeDays => vec![PenaltyTerm::Deviation {
                    lits: grid.at_home_span(p, 0..days),
                    target: i64::from(soft.value),
                    shape: Shape::Excess,
                    weight,
                    tag,
                }],
                ParameterKey::MaxConsecutiveBaseDays => {
                    run_terms(grid, p, days, value + 1, true, weight, tag)
                }
                ParameterKey::MaxConsecutiveHomeDays => {
                    run_terms(grid, p, days, value + 1, false, weight, tag)
                }
                ParameterKey::MinBaseBlockDays => {
                    short_block_terms(grid, p, days, value, weight, tag)
                }
                ParameterKey::MinRequiredPerDay => Vec::new(),
            }
        }
        (ParameterScope::Day(_), _) => Vec::new(),
    }
}

fn build_event_overrides(
    ctx: &ModelContext,
    grid: &VarGrid,
    model: &mut BoolModel,
    weight: i64,
) -> usize {
    let tag = PenaltyKind::EventOverride.tag();
    let mut added = 0;
    for soft in &ctx.params.soft_overrides {
        for term in soft_override_terms(ctx, grid, soft, weight, tag) {
            if model.add_penalty(term) {
                added += 1;
            }
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::VariableFactory;
    use crate::models::{DateWindow, Person, RosterSnapshot, Unavailability};
    use crate::params::ObjectiveWeights;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn week() -> DateWindow {
        DateWindow::new(date(3), date(9)).unwrap()
    }

    fn params() -> ParameterSet {
        ParameterSet::default()
            .with_min_required(1)
            .with_base_days_target(4)
            .with_consecutive_caps(5, 5)
            .with_min_block(2)
    }

    fn compose(ctx: &ModelContext) -> (BoolModel, Vec<(PenaltyKind, usize)>) {
        let mut model = BoolModel::new("t");
        let grid = VariableFactory::allocate(&mut model, ctx.persons(), ctx.days());
        let sizes = ObjectiveComposer::new(ctx).compose(&grid, &mut model);
        (model, sizes)
    }

    fn size_of(sizes: &[(PenaltyKind, usize)], kind: PenaltyKind) -> Option<usize> {
        sizes.iter().find(|(k, _)| *k == kind).map(|(_, n)| *n)
    }

    #[test]
    fn test_default_families() {
        let roster = RosterSnapshot::new()
            .with_person(Person::standard("A"))
            .with_person(Person::standard("B"))
            .with_person(Person::weekend_only("W"));
        let ctx = ModelContext::new(&roster, week(), params());
        let (_, sizes) = compose(&ctx);

        // Weekend-only persons carry no balance term.
        assert_eq!(size_of(&sizes, PenaltyKind::HomeBalance), Some(2));
        assert_eq!(size_of(&sizes, PenaltyKind::WeekendFairness), Some(3));
        assert_eq!(size_of(&sizes, PenaltyKind::ExceptionalSpread), Some(0));
        // Zero weight by default.
        assert_eq!(size_of(&sizes, PenaltyKind::Smoothness), None);
        assert_eq!(size_of(&sizes, PenaltyKind::EventOverride), Some(0));
    }

    #[test]
    fn test_disabled_penalty_skipped() {
        let roster = RosterSnapshot::new().with_person(Person::standard("A"));
        let ctx = ModelContext::new(
            &roster,
            week(),
            params().without_penalty(PenaltyKind::HomeBalance),
        );
        let (model, sizes) = compose(&ctx);
        assert_eq!(size_of(&sizes, PenaltyKind::HomeBalance), None);
        assert!(model
            .objective()
            .iter()
            .all(|t| t.tag() != PenaltyKind::HomeBalance.tag()));
    }

    #[test]
    fn test_weekend_ideal_share() {
        let roster = RosterSnapshot::new()
            .with_person(Person::standard("A"))
            .with_person(Person::standard("B"))
            .with_person(Person::standard("C"))
            // C cannot serve either weekend day.
            .with_unavailable_dates("C", [date(7), date(8)]);
        let ctx = ModelContext::new(&roster, week(), params().with_min_required(3));
        let eligible = weekend_eligible(&ctx);
        assert_eq!(eligible, vec![0, 1]);
        // 2 weekend days × floor 3 over 2 persons.
        assert_eq!(weekend_ideal(&ctx, eligible.len()), 3);
        assert_eq!(weekend_ideal(&ctx, 0), 0);
    }

    #[test]
    fn test_exceptional_spread_skips_forced_days() {
        let roster = RosterSnapshot::new()
            .with_person(Person::exceptional("X"))
            .with_person(Person::exceptional("Y"))
            .with_person(Person::exceptional("Z"))
            .with_unavailability(Unavailability::new("X", date(3)));
        let ctx = ModelContext::new(&roster, week(), params());
        let (_, sizes) = compose(&ctx);
        // 3 pairs × 7 days, minus the 2 pairs involving X on day 0.
        assert_eq!(size_of(&sizes, PenaltyKind::ExceptionalSpread), Some(19));
    }

    #[test]
    fn test_smoothness_terms() {
        let weights = ObjectiveWeights {
            smoothness: 1,
            ..Default::default()
        };
        let roster = RosterSnapshot::new().with_person(Person::standard("A"));
        let ctx = ModelContext::new(
            &roster,
            week(),
            params()
                .with_single_day_blocks(true)
                .with_consecutive_caps(6, 5)
                .with_weights(weights),
        );
        let (_, sizes) = compose(&ctx);
        // Interior one-day blocks: d in 1..=5 → 5 terms.
        // Runs longer than 2L = 4 with cap 6: 5-day windows → 3 terms.
        assert_eq!(size_of(&sizes, PenaltyKind::Smoothness), Some(8));
    }

    #[test]
    fn test_event_override_terms() {
        let mut params = params();
        params.soft_overrides = vec![
            SoftOverride {
                key: ParameterKey::MinRequiredPerDay,
                scope: ParameterScope::Day(date(4)),
                value: 2,
                event_id: "drill".into(),
                winner_event_id: "leave".into(),
            },
            SoftOverride {
                key: ParameterKey::BaseDaysTarget,
                scope: ParameterScope::Person("A".into()),
                value: 5,
                event_id: "drill".into(),
                winner_event_id: "leave".into(),
            },
            SoftOverride {
                key: ParameterKey::MaxConsecutiveBaseDays,
                scope: ParameterScope::Person("A".into()),
                value: 4,
                event_id: "drill".into(),
                winner_event_id: "leave".into(),
            },
            SoftOverride {
                key: ParameterKey::BaseDaysTarget,
                scope: ParameterScope::Person("ghost".into()),
                value: 5,
                event_id: "drill".into(),
                winner_event_id: "leave".into(),
            },
        ];
        let roster = RosterSnapshot::new()
            .with_person(Person::standard("A"))
            .with_person(Person::standard("B"));
        let ctx = ModelContext::new(&roster, week(), params);
        let (model, sizes) = compose(&ctx);

        // 1 shortfall + 1 deviation + 3 five-day run terms; unknown person ignored.
        assert_eq!(size_of(&sizes, PenaltyKind::EventOverride), Some(5));

        // Shortfall costs weight × missing persons.
        let mut values = vec![false; model.var_count()];
        values[1] = true; // A on day 1
        let shortfall = model
            .objective()
            .iter()
            .find(|t| {
                t.tag() == PenaltyKind::EventOverride.tag()
                    && matches!(t, PenaltyTerm::Deviation { shape: Shape::Shortfall, .. })
            })
            .unwrap();
        assert_eq!(shortfall.evaluate(&values), 20);
    }
}
