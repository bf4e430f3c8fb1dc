//! Depth-first branch-and-bound with a local-search warm start.
//!
//! # Algorithm
//!
//! 1. Propagate every cardinality constraint at the root: a constraint
//!    whose slack reaches zero forces its unassigned literals. A conflict
//!    here proves infeasibility.
//! 2. Dive once without backtracking to get a complete assignment, then
//!    repair and improve it with the weighted local search in `local`.
//!    Its best feasible assignment becomes the first incumbent.
//! 3. Branch on variables in branching-group order; variables inside a
//!    group are shuffled once with the seeded RNG.
//! 4. The value tried first is the incumbent's value for the variable.
//!    Without an incumbent it follows the pacing heuristic: for each
//!    deviation term over the variable, prefer the value that keeps the
//!    term's true-count on track towards its target.
//! 5. Maintain an admissible lower bound incrementally (the sum of the
//!    per-term bounds for the current partial assignment) and prune any
//!    node whose bound is not better than the incumbent.
//! 6. Chronological backtracking. Search stops when the tree is exhausted,
//!    the incumbent meets the root bound, the budget expires or the
//!    cancellation token is set.
//!
//! # Complexity
//! Worst case exponential in the number of variables; each node costs
//! O(occurrences of the decided variable) plus the propagation it triggers.
//!
//! # Reference
//! - Davis, Logemann & Loveland (1962), "A Machine Program for Theorem-Proving"
//! - Land & Doig (1960), "An Automatic Method of Solving Discrete Programming Problems"

use std::collections::BTreeMap;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, trace};

use super::local::LocalSearch;
use super::{
    BoolModel, Bound, CancellationToken, CpSolution, CpSolver, PenaltyTerm, SolverConfig,
    SolverStatus, VarId,
};

/// Nodes between two budget/cancellation checks.
const CHECK_INTERVAL: u64 = 64;
/// Share of the time budget the local search may use.
const LOCAL_SEARCH_SHARE: f64 = 0.5;

/// Occurrence lists: var → (constraint, polarity) and var → (term, polarity).
pub(super) fn occurrences(
    model: &BoolModel,
) -> (Vec<Vec<(usize, bool)>>, Vec<Vec<(usize, bool)>>) {
    let n = model.var_count();
    let mut con_occurs = vec![Vec::new(); n];
    for (c, con) in model.constraints().iter().enumerate() {
        for lit in &con.lits {
            con_occurs[lit.var()].push((c, lit.is_positive()));
        }
    }
    let mut term_occurs = vec![Vec::new(); n];
    for (t, term) in model.objective().iter().enumerate() {
        for lit in term.lits() {
            term_occurs[lit.var()].push((t, lit.is_positive()));
        }
    }
    (con_occurs, term_occurs)
}

/// Exact branch-and-bound solver for [`BoolModel`]s, warm-started by a
/// weighted local search.
///
/// Returns the best solution found when the budget expires.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchAndBoundSolver;

impl BranchAndBoundSolver {
    /// Creates a new solver.
    pub fn new() -> Self {
        Self
    }
}

impl CpSolver for BranchAndBoundSolver {
    fn solve(
        &self,
        model: &BoolModel,
        config: &SolverConfig,
        cancel: &CancellationToken,
    ) -> CpSolution {
        let started = Instant::now();
        let deadline = started.checked_add(config.time_limit);
        let seed = config.random_seed.unwrap_or_else(rand::random);
        let mut search = Search::new(model, seed);
        let mut outcome = Outcome {
            stop: None,
            best: None,
            root_bound: 0,
            nodes: 0,
            solutions: 0,
        };

        match search.root() {
            Err(c) => {
                search.note_conflict(c);
                outcome.root_bound = search.bound;
            }
            Ok(()) => {
                outcome.root_bound = search.bound;
                if config.local_search && !cancel.is_cancelled() {
                    let share = started.checked_add(config.time_limit.mul_f64(LOCAL_SEARCH_SHARE));
                    let local = LocalSearch::new(model, search.dive(), seed).run(
                        share,
                        outcome.root_bound,
                        cancel,
                    );
                    debug!(
                        model = %model.name,
                        steps = local.steps,
                        objective = ?local.best.as_ref().map(|(cost, _)| *cost),
                        "local search finished"
                    );
                    outcome.solutions += local.improvements;
                    search.hint = local.best.as_ref().map(|(_, values)| values.clone());
                    outcome.best = local.best;
                }
                search.run(deadline, config, cancel, &mut outcome);
            }
        }

        let status = match (outcome.stop, &outcome.best) {
            (Some(Stop::Cancelled), _) => SolverStatus::Cancelled,
            (Some(Stop::Budget), Some(_)) => SolverStatus::Feasible,
            (Some(Stop::Budget), None) => SolverStatus::Unknown,
            (None, Some(_)) => SolverStatus::Optimal,
            (None, None) => SolverStatus::Infeasible,
        };

        let (values, objective) = match outcome.best {
            Some((cost, values)) if status != SolverStatus::Cancelled => {
                (Some(values), Some(cost))
            }
            _ => (None, None),
        };
        let best_bound = match (status, objective) {
            (SolverStatus::Optimal, Some(cost)) => cost,
            _ => outcome.root_bound,
        };

        let elapsed = started.elapsed();
        debug!(
            model = %model.name,
            status = %status,
            nodes = outcome.nodes,
            conflicts = search.conflicts,
            objective = ?objective,
            elapsed_ms = elapsed.as_millis() as u64,
            "solve finished"
        );

        CpSolution {
            status,
            values,
            objective,
            best_bound,
            nodes: outcome.nodes,
            conflicts: search.conflicts,
            solutions_found: outcome.solutions,
            conflicts_by_tag: search.conflicts_by_tag,
            elapsed,
            seed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Budget,
    Cancelled,
}

struct Outcome {
    stop: Option<Stop>,
    best: Option<(i64, Vec<bool>)>,
    root_bound: i64,
    nodes: u64,
    solutions: u64,
}

/// A decision on the search stack.
#[derive(Clone)]
struct Frame {
    trail_len: usize,
    var: VarId,
    value: bool,
    flipped: bool,
}

#[derive(Clone)]
struct Search<'a> {
    model: &'a BoolModel,
    values: Vec<Option<bool>>,
    /// var → (constraint, literal polarity)
    con_occurs: Vec<Vec<(usize, bool)>>,
    /// var → (term, literal polarity)
    term_occurs: Vec<Vec<(usize, bool)>>,
    con_true: Vec<u32>,
    con_false: Vec<u32>,
    term_true: Vec<usize>,
    term_false: Vec<usize>,
    term_bound: Vec<i64>,
    bound: i64,
    trail: Vec<VarId>,
    frames: Vec<Frame>,
    queue: Vec<usize>,
    order: Vec<VarId>,
    /// Preferred values, taken from the incumbent.
    hint: Option<Vec<bool>>,
    conflicts: u64,
    conflicts_by_tag: BTreeMap<u16, u64>,
}

impl<'a> Search<'a> {
    fn new(model: &'a BoolModel, seed: u64) -> Self {
        let n = model.var_count();
        let (con_occurs, term_occurs) = occurrences(model);

        let term_bound: Vec<i64> = model
            .objective()
            .iter()
            .map(|t| t.lower_bound(0, 0))
            .collect();
        let bound = term_bound.iter().sum();

        let mut rng = StdRng::seed_from_u64(seed);
        let mut seen = vec![false; n];
        let mut order = Vec::with_capacity(n);
        for group in model.branching_groups() {
            let mut group: Vec<VarId> = group
                .iter()
                .copied()
                .filter(|&v| v < n && !seen[v])
                .collect();
            group.dedup();
            group.shuffle(&mut rng);
            for &v in &group {
                if !seen[v] {
                    seen[v] = true;
                    order.push(v);
                }
            }
        }
        order.extend((0..n).filter(|&v| !seen[v]));

        Self {
            model,
            values: vec![None; n],
            con_occurs,
            term_occurs,
            con_true: vec![0; model.constraint_count()],
            con_false: vec![0; model.constraint_count()],
            term_true: vec![0; model.term_count()],
            term_false: vec![0; model.term_count()],
            term_bound,
            bound,
            trail: Vec::with_capacity(n),
            frames: Vec::new(),
            queue: Vec::new(),
            order,
            hint: None,
            conflicts: 0,
            conflicts_by_tag: BTreeMap::new(),
        }
    }

    /// Propagates every constraint once.
    fn root(&mut self) -> Result<(), usize> {
        self.queue.extend(0..self.model.constraint_count());
        self.propagate()
    }

    /// Complete assignment from one greedy descent without backtracking.
    /// Variables left after the first conflict take their heuristic value.
    fn dive(&self) -> Vec<bool> {
        let mut dive = self.clone();
        while let Some(var) = dive.next_unassigned() {
            let value = dive.phase(var);
            dive.assign(var, value);
            if dive.propagate().is_err() {
                break;
            }
        }
        dive.queue.clear();
        while let Some(var) = dive.next_unassigned() {
            let value = dive.phase(var);
            dive.assign(var, value);
        }
        dive.values.iter().map(|v| v.unwrap_or(false)).collect()
    }

    /// Tree search from the propagated root, improving on `outcome.best`.
    fn run(
        &mut self,
        deadline: Option<Instant>,
        config: &SolverConfig,
        cancel: &CancellationToken,
        outcome: &mut Outcome,
    ) {
        let root_bound = outcome.root_bound;
        if cancel.is_cancelled() {
            outcome.stop = Some(Stop::Cancelled);
            return;
        }
        if outcome
            .best
            .as_ref()
            .is_some_and(|(cost, _)| *cost <= root_bound)
        {
            return;
        }

        'search: loop {
            outcome.nodes += 1;
            if outcome.nodes == 1 || outcome.nodes % CHECK_INTERVAL == 0 {
                if cancel.is_cancelled() {
                    outcome.stop = Some(Stop::Cancelled);
                    break;
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    outcome.stop = Some(Stop::Budget);
                    break;
                }
            }
            if config.node_limit.is_some_and(|limit| outcome.nodes > limit) {
                outcome.stop = Some(Stop::Budget);
                break;
            }

            let prune = outcome
                .best
                .as_ref()
                .is_some_and(|(cost, _)| self.bound >= *cost);

            if prune {
                if !self.backtrack() {
                    break;
                }
            } else {
                match self.next_unassigned() {
                    Some(var) => {
                        let value = self.phase(var);
                        self.decide(var, value);
                    }
                    None => {
                        let cost = self.bound;
                        let values: Vec<bool> = self.values.iter().map(|v| v.unwrap_or(false)).collect();
                        outcome.solutions += 1;
                        if self.hint.is_some() {
                            self.hint = Some(values.clone());
                        }
                        outcome.best = Some((cost, values));
                        trace!(cost, nodes = outcome.nodes, "improving solution");
                        if cost <= root_bound || !self.backtrack() {
                            break;
                        }
                    }
                }
            }

            while let Err(c) = self.propagate() {
                self.note_conflict(c);
                if !self.backtrack() {
                    break 'search;
                }
            }
        }
    }

    fn note_conflict(&mut self, constraint: usize) {
        self.conflicts += 1;
        let tag = self.model.constraints()[constraint].tag;
        *self.conflicts_by_tag.entry(tag).or_insert(0) += 1;
    }

    fn next_unassigned(&self) -> Option<VarId> {
        self.order.iter().copied().find(|&v| self.values[v].is_none())
    }

    /// Incumbent value, else the pacing heuristic over the deviation terms
    /// that mention `var`.
    fn phase(&self, var: VarId) -> bool {
        if let Some(hint) = &self.hint {
            return hint[var];
        }
        let model = self.model;
        let mut score: i64 = 0;
        for &(t, positive) in &self.term_occurs[var] {
            if let PenaltyTerm::Deviation {
                lits,
                target,
                weight,
                ..
            } = &model.objective()[t]
            {
                let len = lits.len() as i64;
                let n_true = self.term_true[t] as i64;
                let assigned = n_true + self.term_false[t] as i64;
                let lit_wanted = target * (assigned + 1) - n_true * len > 0;
                if lit_wanted == positive {
                    score += weight;
                } else {
                    score -= weight;
                }
            }
        }
        score > 0
    }

    fn decide(&mut self, var: VarId, value: bool) {
        self.frames.push(Frame {
            trail_len: self.trail.len(),
            var,
            value,
            flipped: false,
        });
        self.assign(var, value);
    }

    /// Undoes decisions until one can be flipped. Returns `false` when
    /// the tree is exhausted.
    fn backtrack(&mut self) -> bool {
        self.queue.clear();
        while let Some(frame) = self.frames.pop() {
            self.undo_to(frame.trail_len);
            if !frame.flipped {
                let value = !frame.value;
                self.frames.push(Frame {
                    trail_len: frame.trail_len,
                    var: frame.var,
                    value,
                    flipped: true,
                });
                self.assign(frame.var, value);
                return true;
            }
        }
        false
    }

    fn assign(&mut self, var: VarId, value: bool) {
        let model = self.model;
        self.values[var] = Some(value);
        self.trail.push(var);

        for &(c, positive) in &self.con_occurs[var] {
            if value == positive {
                self.con_true[c] += 1;
            } else {
                self.con_false[c] += 1;
            }
            self.queue.push(c);
        }
        for &(t, positive) in &self.term_occurs[var] {
            if value == positive {
                self.term_true[t] += 1;
            } else {
                self.term_false[t] += 1;
            }
            let b = model.objective()[t].lower_bound(self.term_true[t], self.term_false[t]);
            self.bound += b - self.term_bound[t];
            self.term_bound[t] = b;
        }
    }

    fn unassign(&mut self, var: VarId) {
        let model = self.model;
        let Some(value) = self.values[var].take() else {
            return;
        };
        for &(c, positive) in &self.con_occurs[var] {
            if value == positive {
                self.con_true[c] -= 1;
            } else {
                self.con_false[c] -= 1;
            }
        }
        for &(t, positive) in &self.term_occurs[var] {
            if value == positive {
                self.term_true[t] -= 1;
            } else {
                self.term_false[t] -= 1;
            }
            let b = model.objective()[t].lower_bound(self.term_true[t], self.term_false[t]);
            self.bound += b - self.term_bound[t];
            self.term_bound[t] = b;
        }
    }

    fn undo_to(&mut self, len: usize) {
        while self.trail.len() > len {
            if let Some(var) = self.trail.pop() {
                self.unassign(var);
            }
        }
    }

    /// Runs queued constraints to a fixpoint. Returns the index of a
    /// violated constraint on conflict.
    fn propagate(&mut self) -> Result<(), usize> {
        let model = self.model;
        while let Some(c) = self.queue.pop() {
            let con = &model.constraints()[c];
            let len = con.lits.len() as u32;
            let n_true = self.con_true[c];
            let free = len - n_true - self.con_false[c];
            match con.bound {
                Bound::AtLeast(k) => {
                    if n_true + free < k {
                        self.queue.clear();
                        return Err(c);
                    }
                    if n_true < k && n_true + free == k {
                        for lit in &con.lits {
                            if self.values[lit.var()].is_none() {
                                self.assign(lit.var(), lit.is_positive());
                            }
                        }
                    }
                }
                Bound::AtMost(k) => {
                    if n_true > k {
                        self.queue.clear();
                        return Err(c);
                    }
                    if n_true == k && free > 0 {
                        for lit in &con.lits {
                            if self.values[lit.var()].is_none() {
                                self.assign(lit.var(), !lit.is_positive());
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{Lit, Shape};
    use std::time::Duration;

    fn config() -> SolverConfig {
        SolverConfig::default()
            .with_time_limit(Duration::from_secs(10))
            .with_seed(7)
    }

    fn count_model() -> BoolModel {
        // At least 2 of 4 true; prefer as few true as possible.
        let mut m = BoolModel::new("count");
        let vars = m.new_vars(4);
        let lits: Vec<Lit> = vars.map(Lit::pos).collect();
        m.add_at_least(lits.clone(), 2, 1);
        m.add_penalty(PenaltyTerm::Deviation {
            lits,
            target: 0,
            shape: Shape::Absolute,
            weight: 3,
            tag: 0,
        });
        m
    }

    #[test]
    fn test_optimal_solution() {
        let m = count_model();
        let sol = BranchAndBoundSolver::new().solve(&m, &config(), &CancellationToken::new());
        assert_eq!(sol.status, SolverStatus::Optimal);
        assert_eq!(sol.objective, Some(6));
        let values = sol.values.unwrap();
        assert_eq!(values.iter().filter(|&&v| v).count(), 2);
        assert!(m.violated(&values).is_empty());
        assert_eq!(m.evaluate(&values), 6);
    }

    #[test]
    fn test_infeasible_model_reports_tags() {
        let mut m = BoolModel::new("clash");
        let vars = m.new_vars(3);
        let lits: Vec<Lit> = vars.map(Lit::pos).collect();
        m.add_at_least(lits.clone(), 2, 4);
        m.add_at_most(lits, 1, 5);
        let sol = BranchAndBoundSolver::new().solve(&m, &config(), &CancellationToken::new());
        assert_eq!(sol.status, SolverStatus::Infeasible);
        assert!(sol.values.is_none());
        assert!(sol.conflicts > 0);
        assert!(!sol.conflict_ranking().is_empty());
    }

    #[test]
    fn test_root_conflict() {
        let mut m = BoolModel::new("root");
        m.new_vars(1);
        m.add_at_least(vec![Lit::pos(0)], 2, 9);
        let sol = BranchAndBoundSolver::new().solve(&m, &config(), &CancellationToken::new());
        assert_eq!(sol.status, SolverStatus::Infeasible);
        assert_eq!(sol.conflicts_by_tag.get(&9), Some(&1));
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let sol = BranchAndBoundSolver::new().solve(&count_model(), &config(), &token);
        assert_eq!(sol.status, SolverStatus::Cancelled);
        assert!(sol.values.is_none());
    }

    #[test]
    fn test_node_limit_without_solution() {
        let mut m = BoolModel::new("free");
        m.new_vars(5);
        let sol = BranchAndBoundSolver::new().solve(
            &m,
            &config().with_node_limit(1).with_local_search(false),
            &CancellationToken::new(),
        );
        assert_eq!(sol.status, SolverStatus::Unknown);
    }

    /// Six people over twelve days: exactly three on base per day, exactly
    /// six on-days each, on-base runs of at least three days and at most
    /// four in a row.
    fn block_roster() -> BoolModel {
        let (people, days) = (6, 12);
        let mut m = BoolModel::new("blocks");
        m.new_vars(people * days);
        let on = |p: usize, d: usize| Lit::pos(p * days + d);
        let off = |p: usize, d: usize| Lit::neg(p * days + d);
        for d in 0..days {
            let lits: Vec<Lit> = (0..people).map(|p| on(p, d)).collect();
            m.add_range(lits, 3, 3, 1);
            m.add_branching_group((0..people).map(|p| p * days + d).collect());
        }
        for p in 0..people {
            let lits: Vec<Lit> = (0..days).map(|d| on(p, d)).collect();
            m.add_range(lits.clone(), 6, 6, 2);
            for d in 0..days - 4 {
                m.add_at_most((d..d + 5).map(|k| on(p, k)).collect(), 4, 3);
            }
            for d in 1..days {
                for k in (1..3).take_while(|k| d + k < days) {
                    m.add_at_least(vec![on(p, d - 1), off(p, d), on(p, d + k)], 1, 4);
                }
            }
            m.add_penalty(PenaltyTerm::Deviation {
                lits: vec![on(p, 5), on(p, 6)],
                target: 1,
                shape: Shape::Squared,
                weight: 2,
                tag: 0,
            });
        }
        m
    }

    #[test]
    fn test_warm_start_finds_block_roster() {
        let m = block_roster();
        let sol = BranchAndBoundSolver::new().solve(
            &m,
            &config().with_node_limit(20_000),
            &CancellationToken::new(),
        );
        assert!(sol.is_solution_found());
        assert!(sol.solutions_found >= 1);
        let values = sol.values.unwrap();
        assert!(m.violated(&values).is_empty());
        assert_eq!(m.evaluate(&values), sol.objective.unwrap());
    }

    #[test]
    fn test_warm_start_under_tiny_node_limit() {
        // Tree search alone cannot reach a leaf in one node.
        let m = block_roster();
        let sol = BranchAndBoundSolver::new().solve(
            &m,
            &config().with_node_limit(1),
            &CancellationToken::new(),
        );
        assert!(matches!(
            sol.status,
            SolverStatus::Feasible | SolverStatus::Optimal
        ));
        assert!(m.violated(&sol.values.unwrap()).is_empty());
    }

    #[test]
    fn test_local_search_keeps_infeasibility_proof() {
        let mut m = BoolModel::new("clash");
        let vars = m.new_vars(4);
        let lits: Vec<Lit> = vars.map(Lit::pos).collect();
        m.add_at_least(lits[..3].to_vec(), 3, 1);
        m.add_at_most(vec![lits[0], lits[1], lits[3]], 1, 2);
        let with = BranchAndBoundSolver::new().solve(&m, &config(), &CancellationToken::new());
        let without = BranchAndBoundSolver::new().solve(
            &m,
            &config().with_local_search(false),
            &CancellationToken::new(),
        );
        assert_eq!(with.status, SolverStatus::Infeasible);
        assert_eq!(without.status, SolverStatus::Infeasible);
    }

    #[test]
    fn test_empty_model_is_optimal() {
        let m = BoolModel::new("empty");
        let sol = BranchAndBoundSolver::new().solve(&m, &config(), &CancellationToken::new());
        assert_eq!(sol.status, SolverStatus::Optimal);
        assert_eq!(sol.objective, Some(0));
    }

    #[test]
    fn test_conjunction_avoided() {
        let mut m = BoolModel::new("pair");
        m.new_vars(2);
        m.add_at_least(vec![Lit::neg(0), Lit::neg(1)], 1, 0);
        m.add_penalty(PenaltyTerm::Conjunction {
            lits: vec![Lit::neg(0), Lit::neg(1)],
            weight: 5,
            tag: 0,
        });
        let sol = BranchAndBoundSolver::new().solve(&m, &config(), &CancellationToken::new());
        assert_eq!(sol.status, SolverStatus::Optimal);
        assert_eq!(sol.objective, Some(0));
        let values = sol.values.unwrap();
        assert_eq!(values.iter().filter(|&&v| v).count(), 1);
    }

    #[test]
    fn test_same_seed_same_result() {
        let mut m = BoolModel::new("grid");
        let vars: Vec<VarId> = m.new_vars(12).collect();
        for day in vars.chunks(3) {
            m.add_at_least(day.iter().copied().map(Lit::pos).collect(), 1, 0);
            m.add_branching_group(day.to_vec());
        }
        for person in 0..3 {
            let lits: Vec<Lit> = (0..4).map(|d| Lit::pos(d * 3 + person)).collect();
            m.add_penalty(PenaltyTerm::Deviation {
                lits,
                target: 2,
                shape: Shape::Squared,
                weight: 1,
                tag: 0,
            });
        }
        let solver = BranchAndBoundSolver::new();
        let a = solver.solve(&m, &config(), &CancellationToken::new());
        let b = solver.solve(&m, &config(), &CancellationToken::new());
        assert_eq!(a.status, SolverStatus::Optimal);
        assert_eq!(a.objective, b.objective);
        assert_eq!(a.values, b.values);
        assert_eq!(a.seed, 7);
    }
}
