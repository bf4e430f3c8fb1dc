//! Hard-constraint groups.
//!
//! Every group is a [`ConstraintGroup`] descriptor holding three plain
//! functions: `enabled` (structural applicability), `build` (emit solver
//! constraints) and `verify` (re-check a complete duty grid without the
//! solver model). The [`ConstraintAssembler`] walks [`CONSTRAINT_GROUPS`]
//! and skips groups that are switched off in the parameter set.
//!
//! # Encodings
//!
//! | Group | Encoding |
//! |-------|----------|
//! | Unavailability | unit clause ¬x[p,d] |
//! | DailyStaffing | AtLeast(floor) over a day's column |
//! | WorkloadTarget | AtLeast/AtMost over a person's row; AtMost(cap) over at-home literals |
//! | ConsecutiveRuns | AtMost(M) per window of M+1; AtLeast(1) per window of H+1 |
//! | MinimumBlock | clause x[d−1] ∨ ¬x[d] ∨ x[d+k] for 1 ≤ k < L |
//! | WeekendCap | AtMost(cap) over weekend literals |
//! | WeekendOnly / Exceptional | delegated to the role |
//!
//! # Reference
//! - Bacchus (2007), "GAC via Unit Propagation", CP 2007 (sliding-window
//!   cardinality encodings of sequence constraints)

use super::{DutyGrid, ModelContext, VarGrid};
use crate::models::{PersonKind, Violation, ViolationType};
use crate::params::ConstraintGroupKind;
use crate::solver::{BoolModel, Lit};

/// Declarative description of one hard-constraint group.
#[derive(Clone, Copy)]
pub struct ConstraintGroup {
    /// Group identity.
    pub kind: ConstraintGroupKind,
    /// Whether the group has anything to constrain in this run.
    pub enabled: fn(&ModelContext) -> bool,
    /// Emits the group's constraints; returns how many were added.
    pub build: fn(&ModelContext, &VarGrid, &mut BoolModel) -> usize,
    /// Appends violations found on a complete duty grid.
    pub verify: fn(&ModelContext, &DutyGrid, &mut Vec<Violation>),
}

impl std::fmt::Debug for ConstraintGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintGroup")
            .field("kind", &self.kind)
            .finish()
    }
}

/// Every hard-constraint group, in assembly order.
pub const CONSTRAINT_GROUPS: &[ConstraintGroup] = &[
    ConstraintGroup {
        kind: ConstraintGroupKind::Unavailability,
        enabled: unavailability_enabled,
        build: build_unavailability,
        verify: verify_unavailability,
    },
    ConstraintGroup {
        kind: ConstraintGroupKind::DailyStaffing,
        enabled: staffing_enabled,
        build: build_staffing,
        verify: verify_staffing,
    },
    ConstraintGroup {
        kind: ConstraintGroupKind::WorkloadTarget,
        enabled: workload_enabled,
        build: build_workload,
        verify: verify_workload,
    },
    ConstraintGroup {
        kind: ConstraintGroupKind::ConsecutiveRuns,
        enabled: runs_enabled,
        build: build_runs,
        verify: verify_runs,
    },
    ConstraintGroup {
        kind: ConstraintGroupKind::MinimumBlock,
        enabled: blocks_enabled,
        build: build_blocks,
        verify: verify_blocks,
    },
    ConstraintGroup {
        kind: ConstraintGroupKind::WeekendCap,
        enabled: weekend_cap_enabled,
        build: build_weekend_cap,
        verify: verify_weekend_cap,
    },
    ConstraintGroup {
        kind: ConstraintGroupKind::WeekendOnly,
        enabled: weekend_only_enabled,
        build: build_weekend_only,
        verify: verify_weekend_only,
    },
    ConstraintGroup {
        kind: ConstraintGroupKind::Exceptional,
        enabled: exceptional_enabled,
        build: build_exceptional,
        verify: verify_exceptional,
    },
];

/// Walks the group list for one run.
pub struct ConstraintAssembler<'a> {
    ctx: &'a ModelContext,
}

impl<'a> ConstraintAssembler<'a> {
    /// Creates an assembler over a run context.
    pub fn new(ctx: &'a ModelContext) -> Self {
        Self { ctx }
    }

    /// Groups that take part in this run.
    pub fn active_groups(&self) -> impl Iterator<Item = &'static ConstraintGroup> + '_ {
        CONSTRAINT_GROUPS
            .iter()
            .filter(|g| self.ctx.params.group_enabled(g.kind) && (g.enabled)(self.ctx))
    }

    /// Emits every active group; returns the constraint count per group.
    pub fn assemble(
        &self,
        grid: &VarGrid,
        model: &mut BoolModel,
    ) -> Vec<(ConstraintGroupKind, usize)> {
        self.active_groups()
            .map(|g| (g.kind, (g.build)(self.ctx, grid, model)))
            .collect()
    }

    /// Re-checks every active group on a complete duty grid.
    pub fn verify(&self, duty: &DutyGrid) -> Vec<Violation> {
        let mut violations = Vec::new();
        for group in self.active_groups() {
            (group.verify)(self.ctx, duty, &mut violations);
        }
        violations
    }
}

// ================================
// Unavailability
// ================================

fn unavailability_enabled(ctx: &ModelContext) -> bool {
    ctx.entries.iter().any(|e| e.unavailable.contains(&true))
}

fn build_unavailability(ctx: &ModelContext, grid: &VarGrid, model: &mut BoolModel) -> usize {
    let tag = ConstraintGroupKind::Unavailability.tag();
    let mut added = 0;
    for p in 0..ctx.persons() {
        for d in (0..ctx.days()).filter(|&d| !ctx.is_available(p, d)) {
            model.fix(grid.at_home(p, d), tag);
            added += 1;
        }
    }
    added
}

fn verify_unavailability(ctx: &ModelContext, duty: &DutyGrid, out: &mut Vec<Violation>) {
    for p in 0..ctx.persons() {
        for d in (0..ctx.days()).filter(|&d| !ctx.is_available(p, d)) {
            if duty.get(p, d) {
                out.push(
                    Violation::new(ViolationType::Unavailable, "on-base while unavailable")
                        .for_person(ctx.person(p).id.clone())
                        .on(ctx.dates[d]),
                );
            }
        }
    }
}

// ================================
// Daily staffing
// ================================

fn staffing_enabled(ctx: &ModelContext) -> bool {
    ctx.persons() > 0 && ctx.floors.iter().any(|&f| f > 0)
}

fn build_staffing(ctx: &ModelContext, grid: &VarGrid, model: &mut BoolModel) -> usize {
    let tag = ConstraintGroupKind::DailyStaffing.tag();
    (0..ctx.days())
        .filter(|&d| model.add_at_least(grid.day_on_base(d), ctx.floors[d], tag))
        .count()
}

fn verify_staffing(ctx: &ModelContext, duty: &DutyGrid, out: &mut Vec<Violation>) {
    for d in 0..ctx.days() {
        let on_base = duty.day_count(d);
        let floor = ctx.floors[d] as usize;
        if on_base < floor {
            out.push(
                Violation::new(
                    ViolationType::StaffingShortfall,
                    format!("{on_base} on-base, floor is {floor}"),
                )
                .on(ctx.dates[d]),
            );
        }
    }
}

// ================================
// Workload target
// ================================

fn workload_enabled(ctx: &ModelContext) -> bool {
    ctx.subject_to(ConstraintGroupKind::WorkloadTarget)
        .next()
        .is_some()
}

fn build_workload(ctx: &ModelContext, grid: &VarGrid, model: &mut BoolModel) -> usize {
    let tag = ConstraintGroupKind::WorkloadTarget.tag();
    let days = ctx.days();
    let mut added = 0;
    for p in ctx.subject_to(ConstraintGroupKind::WorkloadTarget) {
        let plan = ctx.plan.get(p);
        added += model.add_range(
            grid.on_base_span(p, 0..days),
            plan.on_base_min,
            plan.on_base_max,
            tag,
        );
        if let Some(cap) = ctx.params.max_total_home_for(&ctx.person(p).id) {
            if model.add_at_most(grid.at_home_span(p, 0..days), cap, tag) {
                added += 1;
            }
        }
    }
    added
}

fn verify_workload(ctx: &ModelContext, duty: &DutyGrid, out: &mut Vec<Violation>) {
    let days = ctx.days();
    for p in ctx.subject_to(ConstraintGroupKind::WorkloadTarget) {
        let plan = ctx.plan.get(p);
        let id = &ctx.person(p).id;
        let on_base = duty.on_base_count(p) as u32;
        if on_base < plan.on_base_min || on_base > plan.on_base_max {
            out.push(
                Violation::new(
                    ViolationType::WorkloadOutOfRange,
                    format!(
                        "{on_base} on-base days outside [{}, {}]",
                        plan.on_base_min, plan.on_base_max
                    ),
                )
                .for_person(id.clone()),
            );
        }
        if let Some(cap) = ctx.params.max_total_home_for(id) {
            let home = days as u32 - on_base;
            if home > cap {
                out.push(
                    Violation::new(
                        ViolationType::HomeCapExceeded,
                        format!("{home} home days exceed cap {cap}"),
                    )
                    .for_person(id.clone()),
                );
            }
        }
    }
}

// ================================
// Consecutive runs
// ================================

fn runs_enabled(ctx: &ModelContext) -> bool {
    ctx.days() > 1
        && ctx
            .subject_to(ConstraintGroupKind::ConsecutiveRuns)
            .next()
            .is_some()
}

/// Start days of every `len`-day window inside `days`.
fn windows(days: usize, len: usize) -> std::ops::Range<usize> {
    if len == 0 || len > days {
        0..0
    } else {
        0..days - len + 1
    }
}

fn build_runs(ctx: &ModelContext, grid: &VarGrid, model: &mut BoolModel) -> usize {
    let tag = ConstraintGroupKind::ConsecutiveRuns.tag();
    let days = ctx.days();
    let mut added = 0;
    for p in ctx.subject_to(ConstraintGroupKind::ConsecutiveRuns) {
        let id = &ctx.person(p).id;
        let max_base = ctx.params.max_consecutive_base_for(id) as usize;
        let max_home = ctx.params.max_consecutive_home_for(id) as usize;

        for s in windows(days, max_base + 1) {
            if model.add_at_most(grid.on_base_span(p, s..s + max_base + 1), max_base as u32, tag) {
                added += 1;
            }
        }
        for s in windows(days, max_home + 1) {
            let span = s..s + max_home + 1;
            if span.clone().all(|d| !ctx.is_available(p, d)) {
                continue;
            }
            if model.add_at_least(grid.on_base_span(p, span), 1, tag) {
                added += 1;
            }
        }
    }
    added
}

fn verify_runs(ctx: &ModelContext, duty: &DutyGrid, out: &mut Vec<Violation>) {
    let days = ctx.days();
    for p in ctx.subject_to(ConstraintGroupKind::ConsecutiveRuns) {
        let id = &ctx.person(p).id;
        let max_base = ctx.params.max_consecutive_base_for(id) as usize;
        let max_home = ctx.params.max_consecutive_home_for(id) as usize;

        let longest = duty.longest_run(p, true);
        if longest > max_base {
            out.push(
                Violation::new(
                    ViolationType::ConsecutiveBaseExceeded,
                    format!("{longest} consecutive on-base days, cap is {max_base}"),
                )
                .for_person(id.clone()),
            );
        }
        for s in windows(days, max_home + 1) {
            let span = s..s + max_home + 1;
            if span.clone().all(|d| !ctx.is_available(p, d)) {
                continue;
            }
            if span.clone().all(|d| !duty.get(p, d)) {
                out.push(
                    Violation::new(
                        ViolationType::ConsecutiveHomeExceeded,
                        format!("more than {max_home} consecutive home days"),
                    )
                    .for_person(id.clone())
                    .on(ctx.dates[s]),
                );
                break;
            }
        }
    }
}

// ================================
// Minimum block
// ================================

fn block_persons(ctx: &ModelContext) -> impl Iterator<Item = usize> + '_ {
    ctx.subject_to(ConstraintGroupKind::MinimumBlock)
        .filter(|&p| ctx.params.blocks_enforced_for(&ctx.person(p).id))
}

fn blocks_enabled(ctx: &ModelContext) -> bool {
    ctx.days() > 2 && block_persons(ctx).next().is_some()
}

fn build_blocks(ctx: &ModelContext, grid: &VarGrid, model: &mut BoolModel) -> usize {
    let tag = ConstraintGroupKind::MinimumBlock.tag();
    let days = ctx.days();
    let mut added = 0;
    for p in block_persons(ctx) {
        let min_block = ctx.params.min_block_for(&ctx.person(p).id) as usize;
        for d in 1..days {
            for k in (1..min_block).take_while(|k| d + k < days) {
                let clause: Vec<Lit> = vec![
                    grid.on_base(p, d - 1),
                    grid.at_home(p, d),
                    grid.on_base(p, d + k),
                ];
                if model.add_at_least(clause, 1, tag) {
                    added += 1;
                }
            }
        }
    }
    added
}

fn verify_blocks(ctx: &ModelContext, duty: &DutyGrid, out: &mut Vec<Violation>) {
    let days = ctx.days();
    for p in block_persons(ctx) {
        let id = &ctx.person(p).id;
        let min_block = ctx.params.min_block_for(id) as usize;
        for (first, last) in duty.blocks(p) {
            // Blocks touching either window edge may continue outside it.
            let interior = first >= 1 && last + 1 < days;
            let len = last - first + 1;
            if interior && len < min_block {
                out.push(
                    Violation::new(
                        ViolationType::BlockTooShort,
                        format!("{len}-day block, minimum is {min_block}"),
                    )
                    .for_person(id.clone())
                    .on(ctx.dates[first]),
                );
            }
        }
    }
}

// ================================
// Weekend cap
// ================================

fn weekend_cap_enabled(ctx: &ModelContext) -> bool {
    ctx.params.max_weekend_base_days_per_person.is_some()
        && ctx.weekend_days() > 0
        && ctx
            .subject_to(ConstraintGroupKind::WeekendCap)
            .next()
            .is_some()
}

fn build_weekend_cap(ctx: &ModelContext, grid: &VarGrid, model: &mut BoolModel) -> usize {
    let Some(cap) = ctx.params.max_weekend_base_days_per_person else {
        return 0;
    };
    let tag = ConstraintGroupKind::WeekendCap.tag();
    let mut added = 0;
    for p in ctx.subject_to(ConstraintGroupKind::WeekendCap) {
        let lits: Vec<Lit> = (0..ctx.days())
            .filter(|&d| ctx.weekend[d])
            .map(|d| grid.on_base(p, d))
            .collect();
        if model.add_at_most(lits, cap, tag) {
            added += 1;
        }
    }
    added
}

fn verify_weekend_cap(ctx: &ModelContext, duty: &DutyGrid, out: &mut Vec<Violation>) {
    let Some(cap) = ctx.params.max_weekend_base_days_per_person else {
        return;
    };
    for p in ctx.subject_to(ConstraintGroupKind::WeekendCap) {
        let served = duty.on_base_where(p, &ctx.weekend);
        if served > cap as usize {
            out.push(
                Violation::new(
                    ViolationType::WeekendCapExceeded,
                    format!("{served} weekend on-base days exceed cap {cap}"),
                )
                .for_person(ctx.person(p).id.clone()),
            );
        }
    }
}

// ================================
// Role groups
// ================================

fn weekend_only_enabled(ctx: &ModelContext) -> bool {
    ctx.subject_to(ConstraintGroupKind::WeekendOnly)
        .next()
        .is_some()
}

fn build_weekend_only(ctx: &ModelContext, grid: &VarGrid, model: &mut BoolModel) -> usize {
    ctx.subject_to(ConstraintGroupKind::WeekendOnly)
        .map(|p| ctx.role(p).constrain(ctx, p, grid, model))
        .sum()
}

fn verify_weekend_only(ctx: &ModelContext, duty: &DutyGrid, out: &mut Vec<Violation>) {
    for p in ctx.subject_to(ConstraintGroupKind::WeekendOnly) {
        ctx.role(p).verify(ctx, p, duty, out);
    }
}

fn exceptional_enabled(ctx: &ModelContext) -> bool {
    ctx.subject_to(ConstraintGroupKind::Exceptional)
        .next()
        .is_some()
}

fn exceptional_persons(ctx: &ModelContext) -> Vec<usize> {
    (0..ctx.persons())
        .filter(|&p| ctx.person(p).kind == PersonKind::Exceptional)
        .collect()
}

/// Exceptional persons allowed at home on day `d` when overlap is a hard rule.
fn home_allowance(ctx: &ModelContext, exceptional: &[usize], d: usize) -> u32 {
    let forced = exceptional
        .iter()
        .filter(|&&p| !ctx.is_available(p, d))
        .count() as u32;
    forced.max(1)
}

fn build_exceptional(ctx: &ModelContext, grid: &VarGrid, model: &mut BoolModel) -> usize {
    let mut added: usize = ctx
        .subject_to(ConstraintGroupKind::Exceptional)
        .map(|p| ctx.role(p).constrain(ctx, p, grid, model))
        .sum();

    let exceptional = exceptional_persons(ctx);
    if !ctx.params.exceptional.adaptive && exceptional.len() >= 2 {
        let tag = ConstraintGroupKind::Exceptional.tag();
        for d in 0..ctx.days() {
            let lits: Vec<Lit> = exceptional.iter().map(|&p| grid.at_home(p, d)).collect();
            if model.add_at_most(lits, home_allowance(ctx, &exceptional, d), tag) {
                added += 1;
            }
        }
    }
    added
}

fn verify_exceptional(ctx: &ModelContext, duty: &DutyGrid, out: &mut Vec<Violation>) {
    for p in ctx.subject_to(ConstraintGroupKind::Exceptional) {
        ctx.role(p).verify(ctx, p, duty, out);
    }

    let exceptional = exceptional_persons(ctx);
    if !ctx.params.exceptional.adaptive && exceptional.len() >= 2 {
        for d in 0..ctx.days() {
            let home = exceptional.iter().filter(|&&p| !duty.get(p, d)).count() as u32;
            let allowance = home_allowance(ctx, &exceptional, d);
            if home > allowance {
                out.push(
                    Violation::new(
                        ViolationType::ExceptionalBreach,
                        format!("{home} exceptional persons at home, at most {allowance}"),
                    )
                    .on(ctx.dates[d]),
                );
            }
        }
    }
}
