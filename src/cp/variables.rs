//! Decision variables.
//!
//! One boolean per (person, day): `true` = on-base. At-home is the
//! negated literal, so no second variable is needed.

use crate::solver::{BoolModel, Lit, VarId};

/// Person-major layout of the decision variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarGrid {
    first: VarId,
    persons: usize,
    days: usize,
}

impl VarGrid {
    /// Number of persons.
    #[inline]
    pub fn persons(&self) -> usize {
        self.persons
    }

    /// Number of days.
    #[inline]
    pub fn days(&self) -> usize {
        self.days
    }

    /// Number of variables.
    #[inline]
    pub fn len(&self) -> usize {
        self.persons * self.days
    }

    /// Whether the grid has no variables.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Variable of (person, day).
    #[inline]
    pub fn var(&self, person: usize, day: usize) -> VarId {
        self.first + person * self.days + day
    }

    /// "person is on-base on day".
    #[inline]
    pub fn on_base(&self, person: usize, day: usize) -> Lit {
        Lit::pos(self.var(person, day))
    }

    /// "person is at home on day".
    #[inline]
    pub fn at_home(&self, person: usize, day: usize) -> Lit {
        Lit::neg(self.var(person, day))
    }

    /// On-base literals of a person over a day range.
    pub fn on_base_span(&self, person: usize, days: std::ops::Range<usize>) -> Vec<Lit> {
        days.map(|d| self.on_base(person, d)).collect()
    }

    /// At-home literals of a person over a day range.
    pub fn at_home_span(&self, person: usize, days: std::ops::Range<usize>) -> Vec<Lit> {
        days.map(|d| self.at_home(person, d)).collect()
    }

    /// On-base literals of every person on a day.
    pub fn day_on_base(&self, day: usize) -> Vec<Lit> {
        (0..self.persons).map(|p| self.on_base(p, day)).collect()
    }
}

/// Allocates decision variables in a model.
pub struct VariableFactory;

impl VariableFactory {
    /// Allocates `persons × days` variables and declares one branching
    /// group per day, so the search fills the roster day by day.
    pub fn allocate(model: &mut BoolModel, persons: usize, days: usize) -> VarGrid {
        let range = model.new_vars(persons * days);
        let grid = VarGrid {
            first: range.start,
            persons,
            days,
        };
        for d in 0..days {
            model.add_branching_group((0..persons).map(|p| grid.var(p, d)).collect());
        }
        grid
    }
}

/// A complete on-base/at-home table, indexed by roster position and day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DutyGrid {
    persons: usize,
    days: usize,
    cells: Vec<bool>,
}

impl DutyGrid {
    /// An all-at-home grid.
    pub fn new(persons: usize, days: usize) -> Self {
        Self {
            persons,
            days,
            cells: vec![false; persons * days],
        }
    }

    /// Reads solver values through a variable grid.
    pub fn from_values(grid: &VarGrid, values: &[bool]) -> Self {
        let mut duty = Self::new(grid.persons(), grid.days());
        for p in 0..grid.persons() {
            for d in 0..grid.days() {
                duty.set(p, d, values.get(grid.var(p, d)).copied().unwrap_or(false));
            }
        }
        duty
    }

    /// Number of persons.
    pub fn persons(&self) -> usize {
        self.persons
    }

    /// Number of days.
    pub fn days(&self) -> usize {
        self.days
    }

    /// Whether (person, day) is on-base.
    #[inline]
    pub fn get(&self, person: usize, day: usize) -> bool {
        self.cells[person * self.days + day]
    }

    /// Sets (person, day).
    #[inline]
    pub fn set(&mut self, person: usize, day: usize, on_base: bool) {
        self.cells[person * self.days + day] = on_base;
    }

    /// A person's row.
    pub fn row(&self, person: usize) -> &[bool] {
        &self.cells[person * self.days..(person + 1) * self.days]
    }

    /// On-base days of a person.
    pub fn on_base_count(&self, person: usize) -> usize {
        self.row(person).iter().filter(|&&b| b).count()
    }

    /// On-base days of a person on flagged days.
    pub fn on_base_where(&self, person: usize, mask: &[bool]) -> usize {
        self.row(person)
            .iter()
            .zip(mask)
            .filter(|(b, m)| **b && **m)
            .count()
    }

    /// Persons on-base on a day.
    pub fn day_count(&self, day: usize) -> usize {
        (0..self.persons).filter(|&p| self.get(p, day)).count()
    }

    /// Longest run of `state` in a person's row.
    pub fn longest_run(&self, person: usize, state: bool) -> usize {
        let mut best = 0;
        let mut current = 0;
        for &b in self.row(person) {
            if b == state {
                current += 1;
                best = best.max(current);
            } else {
                current = 0;
            }
        }
        best
    }

    /// Maximal on-base blocks of a person as `(first_day, last_day)`.
    pub fn blocks(&self, person: usize) -> Vec<(usize, usize)> {
        let mut blocks = Vec::new();
        let mut start = None;
        for (d, &b) in self.row(person).iter().enumerate() {
            match (b, start) {
                (true, None) => start = Some(d),
                (false, Some(s)) => {
                    blocks.push((s, d - 1));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            blocks.push((s, self.days - 1));
        }
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_layout() {
        let mut model = BoolModel::new("t");
        model.new_vars(2); // offset
        let grid = VariableFactory::allocate(&mut model, 3, 4);
        assert_eq!(grid.len(), 12);
        assert_eq!(model.var_count(), 14);
        assert_eq!(grid.var(0, 0), 2);
        assert_eq!(grid.var(1, 2), 2 + 4 + 2);
        assert_eq!(model.branching_groups().len(), 4);
        assert_eq!(model.branching_groups()[1], vec![3, 7, 11]);
        assert!(grid.at_home(0, 1) == !grid.on_base(0, 1));
    }

    #[test]
    fn test_duty_grid_runs_and_blocks() {
        let mut duty = DutyGrid::new(1, 8);
        for d in [0, 1, 3, 4, 5, 7] {
            duty.set(0, d, true);
        }
        assert_eq!(duty.on_base_count(0), 6);
        assert_eq!(duty.longest_run(0, true), 3);
        assert_eq!(duty.longest_run(0, false), 1);
        assert_eq!(duty.blocks(0), vec![(0, 1), (3, 5), (7, 7)]);
        let mask = [false, true, false, false, false, true, false, true];
        assert_eq!(duty.on_base_where(0, &mask), 3);
    }

    #[test]
    fn test_from_values() {
        let mut model = BoolModel::new("t");
        let grid = VariableFactory::allocate(&mut model, 2, 2);
        let duty = DutyGrid::from_values(&grid, &[true, false, false, true]);
        assert!(duty.get(0, 0));
        assert!(!duty.get(0, 1));
        assert!(duty.get(1, 1));
        assert_eq!(duty.day_count(1), 1);
    }
}
