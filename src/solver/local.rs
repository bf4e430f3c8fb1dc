//! Weighted local search for a first incumbent.
//!
//! # Algorithm
//!
//! 1. Start from a complete, possibly infeasible assignment.
//! 2. While constraints are violated, pick one at random and try every
//!    flip that repairs it, plus pair moves that flip a second variable
//!    to repair whatever the first flip broke. Moves are ranked by
//!    weighted violation first and objective second.
//! 3. At a local minimum every violated constraint gains one unit of
//!    weight (breakout), and with a small probability the best non-improving
//!    move is taken anyway.
//! 4. Once feasible, penalised terms are attacked with the same moves as
//!    long as the assignment stays feasible. Search ends after a run of
//!    non-improving attempts.
//!
//! Deterministic for a fixed seed unless the deadline interrupts it.
//!
//! # Reference
//! - Morris (1993), "The Breakout Method for Escaping from Local Minima"
//! - Selman, Kautz & Cohen (1994), "Noise Strategies for Improving Local Search"

use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::search::occurrences;
use super::{BoolModel, Bound, CancellationToken, VarId};

/// Upper bound on moves.
const MAX_STEPS: u64 = 200_000;
/// Consecutive failed improvement attempts once feasible.
const STALL_LIMIT: u64 = 300;
/// First flips examined per step.
const MAX_PIVOTS: usize = 8;
/// Probability of taking a non-improving move at a local minimum.
const NOISE: f64 = 0.1;
/// Steps between deadline and cancellation checks.
const CHECK_INTERVAL: u64 = 256;

/// Result of a local search run.
#[derive(Debug, Clone)]
pub(crate) struct LocalOutcome {
    /// Best feasible assignment and its cost.
    pub best: Option<(i64, Vec<bool>)>,
    /// Moves attempted.
    pub steps: u64,
    /// Times the best feasible cost improved.
    pub improvements: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Move {
    first: VarId,
    second: Option<VarId>,
}

/// Weighted violation first, objective second.
type Score = (u64, i64);

pub(crate) struct LocalSearch<'a> {
    model: &'a BoolModel,
    rng: StdRng,
    values: Vec<bool>,
    con_occurs: Vec<Vec<(usize, bool)>>,
    term_occurs: Vec<Vec<(usize, bool)>>,
    con_true: Vec<u32>,
    term_true: Vec<usize>,
    weights: Vec<u64>,
    penalty: u64,
    cost: i64,
    violated: Vec<usize>,
    slot: Vec<Option<usize>>,
    tabu: Vec<u64>,
    step: u64,
}

impl<'a> LocalSearch<'a> {
    pub(crate) fn new(model: &'a BoolModel, values: Vec<bool>, seed: u64) -> Self {
        let (con_occurs, term_occurs) = occurrences(model);
        let con_true: Vec<u32> = model
            .constraints()
            .iter()
            .map(|c| c.lits.iter().filter(|l| l.holds(values[l.var()])).count() as u32)
            .collect();
        let term_true: Vec<usize> = model
            .objective()
            .iter()
            .map(|t| t.lits().iter().filter(|l| l.holds(values[l.var()])).count())
            .collect();
        let cost = model
            .objective()
            .iter()
            .zip(&term_true)
            .map(|(t, &n)| t.cost_at(n))
            .sum();

        let n = values.len();
        let mut search = Self {
            model,
            rng: StdRng::seed_from_u64(seed),
            values,
            con_occurs,
            term_occurs,
            con_true,
            term_true,
            weights: vec![1; model.constraint_count()],
            penalty: 0,
            cost,
            violated: Vec::new(),
            slot: vec![None; model.constraint_count()],
            tabu: vec![0; n],
            step: 0,
        };
        for c in 0..model.constraint_count() {
            let v = search.violation(c);
            search.penalty += v;
            search.mark(c, v > 0);
        }
        search
    }

    /// Searches until the step limit, the deadline, cancellation, a stall
    /// once feasible, or a feasible cost at `floor`.
    pub(crate) fn run(
        mut self,
        deadline: Option<Instant>,
        floor: i64,
        cancel: &CancellationToken,
    ) -> LocalOutcome {
        let mut best: Option<(i64, Vec<bool>)> = None;
        let mut improvements = 0;
        let mut stall = 0;

        while self.step < MAX_STEPS {
            self.step += 1;
            if self.step % CHECK_INTERVAL == 0
                && (cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d))
            {
                break;
            }

            if self.violated.is_empty() {
                if best.as_ref().map_or(true, |(cost, _)| self.cost < *cost) {
                    best = Some((self.cost, self.values.clone()));
                    improvements += 1;
                    stall = 0;
                }
                if self.cost <= floor || stall >= STALL_LIMIT {
                    break;
                }
                let pivots = self.term_pivots();
                if pivots.is_empty() {
                    break;
                }
                let aspiration = self.cost;
                match self.best_move(&pivots, aspiration) {
                    Some((mv, (0, cost))) if cost < self.cost => self.apply(mv),
                    _ => stall += 1,
                }
            } else {
                let c = self.violated[self.rng.random_range(0..self.violated.len())];
                let pivots = self.constraint_pivots(c);
                let current = (self.penalty, self.cost);
                let aspiration = best.as_ref().map_or(i64::MAX, |(cost, _)| *cost);
                match self.best_move(&pivots, aspiration) {
                    Some((mv, score)) if score < current => self.apply(mv),
                    other => {
                        self.breakout();
                        if let Some((mv, _)) = other {
                            if self.rng.random_bool(NOISE) {
                                self.apply(mv);
                            }
                        }
                    }
                }
            }
        }

        LocalOutcome {
            best,
            steps: self.step,
            improvements,
        }
    }

    fn violation(&self, c: usize) -> u64 {
        let count = self.con_true[c];
        let amount = match self.model.constraints()[c].bound {
            Bound::AtLeast(k) => k.saturating_sub(count),
            Bound::AtMost(k) => count.saturating_sub(k),
        };
        u64::from(amount) * self.weights[c]
    }

    fn mark(&mut self, c: usize, violated: bool) {
        match (self.slot[c], violated) {
            (None, true) => {
                self.slot[c] = Some(self.violated.len());
                self.violated.push(c);
            }
            (Some(i), false) => {
                self.violated.swap_remove(i);
                if let Some(&moved) = self.violated.get(i) {
                    self.slot[moved] = Some(i);
                }
                self.slot[c] = None;
            }
            _ => {}
        }
    }

    fn flip(&mut self, var: VarId) {
        let model = self.model;
        let value = !self.values[var];
        self.values[var] = value;

        for i in 0..self.con_occurs[var].len() {
            let (c, positive) = self.con_occurs[var][i];
            let before = self.violation(c);
            if value == positive {
                self.con_true[c] += 1;
            } else {
                self.con_true[c] -= 1;
            }
            let after = self.violation(c);
            self.penalty = self.penalty - before + after;
            self.mark(c, after > 0);
        }
        for i in 0..self.term_occurs[var].len() {
            let (t, positive) = self.term_occurs[var][i];
            let term = &model.objective()[t];
            let before = term.cost_at(self.term_true[t]);
            if value == positive {
                self.term_true[t] += 1;
            } else {
                self.term_true[t] -= 1;
            }
            self.cost += term.cost_at(self.term_true[t]) - before;
        }
    }

    fn apply(&mut self, mv: Move) {
        let tenure = self.step + self.rng.random_range(3..8);
        self.flip(mv.first);
        self.tabu[mv.first] = tenure;
        if let Some(second) = mv.second {
            self.flip(second);
            self.tabu[second] = tenure;
        }
    }

    fn breakout(&mut self) {
        for i in 0..self.violated.len() {
            let c = self.violated[i];
            let unit = self.violation(c) / self.weights[c];
            self.weights[c] += 1;
            self.penalty += unit;
        }
    }

    /// Variables whose flip reduces the violation of constraint `c`.
    fn constraint_pivots(&mut self, c: usize) -> Vec<VarId> {
        let con = &self.model.constraints()[c];
        let want_true = matches!(con.bound, Bound::AtLeast(_));
        let mut pivots: Vec<VarId> = con
            .lits
            .iter()
            .filter(|l| l.holds(self.values[l.var()]) != want_true)
            .map(|l| l.var())
            .collect();
        self.sample(&mut pivots);
        pivots
    }

    /// Variables whose flip lowers the cost of a random penalised term.
    fn term_pivots(&mut self) -> Vec<VarId> {
        let model = self.model;
        let penalised: Vec<usize> = (0..model.term_count())
            .filter(|&t| model.objective()[t].cost_at(self.term_true[t]) > 0)
            .collect();
        if penalised.is_empty() {
            return Vec::new();
        }
        let t = penalised[self.rng.random_range(0..penalised.len())];
        let term = &model.objective()[t];
        let n = self.term_true[t];
        let now = term.cost_at(n);
        let drop_true = n > 0 && term.cost_at(n - 1) < now;
        let add_true = n < term.lits().len() && term.cost_at(n + 1) < now;

        let mut pivots: Vec<VarId> = term
            .lits()
            .iter()
            .filter(|l| {
                let holds = l.holds(self.values[l.var()]);
                (holds && drop_true) || (!holds && add_true)
            })
            .map(|l| l.var())
            .collect();
        self.sample(&mut pivots);
        pivots
    }

    fn sample(&mut self, pivots: &mut Vec<VarId>) {
        pivots.sort_unstable();
        pivots.dedup();
        if pivots.len() > MAX_PIVOTS {
            pivots.shuffle(&mut self.rng);
            pivots.truncate(MAX_PIVOTS);
        }
    }

    fn is_tabu(&self, var: VarId) -> bool {
        self.tabu[var] > self.step
    }

    /// Best single or pair move starting from `pivots`. Tabu moves are
    /// admitted only when they reach a feasible cost below `aspiration`.
    fn best_move(&mut self, pivots: &[VarId], aspiration: i64) -> Option<(Move, Score)> {
        let model = self.model;
        let mut best: Option<(Move, Score)> = None;
        let mut ties = 0u32;

        for &x in pivots {
            self.flip(x);
            self.consider(
                Move {
                    first: x,
                    second: None,
                },
                aspiration,
                &mut best,
                &mut ties,
            );

            let broken: Vec<usize> = self.con_occurs[x]
                .iter()
                .map(|&(c, _)| c)
                .filter(|&c| self.slot[c].is_some())
                .collect();
            for c in broken {
                let con = &model.constraints()[c];
                let want_true = matches!(con.bound, Bound::AtLeast(_));
                for lit in &con.lits {
                    let y = lit.var();
                    if y == x || lit.holds(self.values[y]) == want_true {
                        continue;
                    }
                    self.flip(y);
                    self.consider(
                        Move {
                            first: x,
                            second: Some(y),
                        },
                        aspiration,
                        &mut best,
                        &mut ties,
                    );
                    self.flip(y);
                }
            }
            self.flip(x);
        }
        best
    }

    fn consider(
        &mut self,
        mv: Move,
        aspiration: i64,
        best: &mut Option<(Move, Score)>,
        ties: &mut u32,
    ) {
        let tabu = self.is_tabu(mv.first) || mv.second.is_some_and(|v| self.is_tabu(v));
        if tabu && !(self.penalty == 0 && self.cost < aspiration) {
            return;
        }
        let score = (self.penalty, self.cost);
        match best.as_ref().map(|(_, s)| *s) {
            Some(current) if score > current => {}
            Some(current) if score == current => {
                *ties += 1;
                if self.rng.random_range(0..=*ties) == 0 {
                    *best = Some((mv, score));
                }
            }
            _ => {
                *ties = 0;
                *best = Some((mv, score));
            }
        }
    }
}
