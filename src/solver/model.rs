//! Pseudo-boolean model.
//!
//! A [`BoolModel`] holds boolean variables, cardinality constraints over
//! literals and an objective made of penalty terms. Every constraint and
//! term carries a caller-defined `tag` so that results can be attributed
//! back to the rule that produced them.
//!
//! # Constraint Forms
//!
//! | Form | Meaning |
//! |------|---------|
//! | `AtLeast(k)` | at least k literals true (k = 1 is a clause) |
//! | `AtMost(k)` | at most k literals true |
//!
//! # Penalty Forms
//!
//! | Form | Cost |
//! |------|------|
//! | `Deviation` | weight · f(Σ lits − target), f by [`Shape`] |
//! | `Conjunction` | weight if every literal is true |

use std::ops::{Not, Range};

use serde::{Deserialize, Serialize};

/// Index of a boolean variable.
pub type VarId = usize;

/// A variable or its negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lit {
    var: VarId,
    positive: bool,
}

impl Lit {
    /// The literal "var is true".
    #[inline]
    pub fn pos(var: VarId) -> Self {
        Self {
            var,
            positive: true,
        }
    }

    /// The literal "var is false".
    #[inline]
    pub fn neg(var: VarId) -> Self {
        Self {
            var,
            positive: false,
        }
    }

    /// Underlying variable.
    #[inline]
    pub fn var(&self) -> VarId {
        self.var
    }

    /// Whether the literal is the un-negated variable.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.positive
    }

    /// Truth of the literal under a variable value.
    #[inline]
    pub fn holds(&self, value: bool) -> bool {
        value == self.positive
    }
}

impl Not for Lit {
    type Output = Lit;

    fn not(self) -> Lit {
        Lit {
            var: self.var,
            positive: !self.positive,
        }
    }
}

/// Cardinality bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bound {
    /// Σ true literals ≥ k.
    AtLeast(u32),
    /// Σ true literals ≤ k.
    AtMost(u32),
}

/// A cardinality constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cardinality {
    /// Literals counted.
    pub lits: Vec<Lit>,
    /// Bound on the count.
    pub bound: Bound,
    /// Caller-defined label.
    pub tag: u16,
}

impl Cardinality {
    /// Whether a complete assignment satisfies the constraint.
    pub fn is_satisfied(&self, values: &[bool]) -> bool {
        let count = count_true(&self.lits, values);
        match self.bound {
            Bound::AtLeast(k) => count >= i64::from(k),
            Bound::AtMost(k) => count <= i64::from(k),
        }
    }
}

/// Deviation penalty shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    /// |d|
    Absolute,
    /// d²
    Squared,
    /// max(0, d)
    Excess,
    /// max(0, −d)
    Shortfall,
}

impl Shape {
    /// Cost of a deviation `d = count − target`.
    #[inline]
    pub fn cost(self, d: i64) -> i64 {
        match self {
            Shape::Absolute => d.abs(),
            Shape::Squared => d * d,
            Shape::Excess => d.max(0),
            Shape::Shortfall => (-d).max(0),
        }
    }
}

/// An objective term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PenaltyTerm {
    /// weight · shape(Σ lits − target).
    Deviation {
        /// Literals counted.
        lits: Vec<Lit>,
        /// Desired count.
        target: i64,
        /// Penalty shape.
        shape: Shape,
        /// Non-negative weight.
        weight: i64,
        /// Caller-defined label.
        tag: u16,
    },
    /// weight if every literal is true.
    Conjunction {
        /// Literals that must all hold to incur the cost.
        lits: Vec<Lit>,
        /// Non-negative weight.
        weight: i64,
        /// Caller-defined label.
        tag: u16,
    },
}

impl PenaltyTerm {
    /// Literals the term depends on.
    pub fn lits(&self) -> &[Lit] {
        match self {
            PenaltyTerm::Deviation { lits, .. } | PenaltyTerm::Conjunction { lits, .. } => lits,
        }
    }

    /// Label of the term.
    pub fn tag(&self) -> u16 {
        match self {
            PenaltyTerm::Deviation { tag, .. } | PenaltyTerm::Conjunction { tag, .. } => *tag,
        }
    }

    /// Cost under a complete assignment.
    pub fn evaluate(&self, values: &[bool]) -> i64 {
        self.cost_at(count_true(self.lits(), values) as usize)
    }

    /// Cost when exactly `n_true` of the term's literals hold.
    pub fn cost_at(&self, n_true: usize) -> i64 {
        match self {
            PenaltyTerm::Deviation {
                target,
                shape,
                weight,
                ..
            } => weight * shape.cost(n_true as i64 - target),
            PenaltyTerm::Conjunction { lits, weight, .. } => {
                if n_true == lits.len() {
                    *weight
                } else {
                    0
                }
            }
        }
    }

    /// Smallest cost reachable given `n_true` literals already true and
    /// `n_false` already false.
    ///
    /// Every shape is convex with its minimum at zero deviation, so the
    /// bound clamps the target into the reachable count range.
    pub fn lower_bound(&self, n_true: usize, n_false: usize) -> i64 {
        match self {
            PenaltyTerm::Deviation {
                lits,
                target,
                shape,
                weight,
                ..
            } => {
                let lo = n_true as i64;
                let hi = (lits.len() - n_false) as i64;
                let reachable = (*target).clamp(lo, hi);
                weight * shape.cost(reachable - target)
            }
            PenaltyTerm::Conjunction { lits, weight, .. } => {
                if n_true == lits.len() {
                    *weight
                } else {
                    0
                }
            }
        }
    }
}

fn count_true(lits: &[Lit], values: &[bool]) -> i64 {
    lits.iter().filter(|l| l.holds(values[l.var()])).count() as i64
}

/// A pseudo-boolean optimization model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoolModel {
    /// Model name (for logs).
    pub name: String,
    num_vars: usize,
    constraints: Vec<Cardinality>,
    objective: Vec<PenaltyTerm>,
    branching_groups: Vec<Vec<VarId>>,
}

impl BoolModel {
    /// Creates an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Allocates `n` variables and returns their index range.
    pub fn new_vars(&mut self, n: usize) -> Range<VarId> {
        let start = self.num_vars;
        self.num_vars += n;
        start..self.num_vars
    }

    /// Number of variables.
    pub fn var_count(&self) -> usize {
        self.num_vars
    }

    /// Number of constraints.
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Number of objective terms.
    pub fn term_count(&self) -> usize {
        self.objective.len()
    }

    /// All constraints.
    pub fn constraints(&self) -> &[Cardinality] {
        &self.constraints
    }

    /// All objective terms.
    pub fn objective(&self) -> &[PenaltyTerm] {
        &self.objective
    }

    /// Groups of variables branched on in order.
    ///
    /// Variables not listed are branched on last, by index.
    pub fn branching_groups(&self) -> &[Vec<VarId>] {
        &self.branching_groups
    }

    /// Declares the next branching group.
    pub fn add_branching_group(&mut self, vars: Vec<VarId>) {
        self.branching_groups.push(vars);
    }

    /// Requires at least `k` literals true. Returns `false` when the
    /// constraint is trivially satisfied and was not added.
    pub fn add_at_least(&mut self, lits: Vec<Lit>, k: u32, tag: u16) -> bool {
        if k == 0 {
            return false;
        }
        self.constraints.push(Cardinality {
            lits,
            bound: Bound::AtLeast(k),
            tag,
        });
        true
    }

    /// Requires at most `k` literals true. Returns `false` when the
    /// constraint is trivially satisfied and was not added.
    pub fn add_at_most(&mut self, lits: Vec<Lit>, k: u32, tag: u16) -> bool {
        if k as usize >= lits.len() {
            return false;
        }
        self.constraints.push(Cardinality {
            lits,
            bound: Bound::AtMost(k),
            tag,
        });
        true
    }

    /// Requires between `lo` and `hi` literals true. Returns the number of
    /// constraints added.
    pub fn add_range(&mut self, lits: Vec<Lit>, lo: u32, hi: u32, tag: u16) -> usize {
        let added_hi = self.add_at_most(lits.clone(), hi, tag);
        let added_lo = self.add_at_least(lits, lo, tag);
        usize::from(added_hi) + usize::from(added_lo)
    }

    /// Forces a literal true.
    pub fn fix(&mut self, lit: Lit, tag: u16) {
        self.add_at_least(vec![lit], 1, tag);
    }

    /// Adds an objective term. Zero-weight terms are dropped.
    pub fn add_penalty(&mut self, term: PenaltyTerm) -> bool {
        let weight = match &term {
            PenaltyTerm::Deviation { weight, .. } | PenaltyTerm::Conjunction { weight, .. } => {
                *weight
            }
        };
        if weight <= 0 || term.lits().is_empty() {
            return false;
        }
        self.objective.push(term);
        true
    }

    /// Objective value of a complete assignment.
    pub fn evaluate(&self, values: &[bool]) -> i64 {
        self.objective.iter().map(|t| t.evaluate(values)).sum()
    }

    /// Indices of constraints violated by a complete assignment.
    pub fn violated(&self, values: &[bool]) -> Vec<usize> {
        self.constraints
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_satisfied(values))
            .map(|(i, _)| i)
            .collect()
    }
}
