//! Date window model.
//!
//! A run covers an inclusive range of calendar days `[start, end]`.
//! Days are addressed by their zero-based offset from `start`.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    /// First day (inclusive).
    pub start: NaiveDate,
    /// Last day (inclusive).
    pub end: NaiveDate,
}

impl DateWindow {
    /// Creates a window, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        if start > end {
            return Err(EngineError::InvalidRequest(vec![format!(
                "window start {start} is after end {end}"
            )]));
        }
        Ok(Self { start, end })
    }

    /// Creates a window of `days` consecutive days starting at `start`.
    pub fn from_start(start: NaiveDate, days: u32) -> Result<Self, EngineError> {
        if days == 0 {
            return Err(EngineError::InvalidRequest(vec![
                "window must contain at least one day".to_string(),
            ]));
        }
        let end = start
            .checked_add_days(chrono::Days::new(u64::from(days - 1)))
            .ok_or_else(|| {
                EngineError::InvalidRequest(vec![format!("window from {start} overflows")])
            })?;
        Self::new(start, end)
    }

    /// Number of days in the window.
    #[inline]
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days().max(0) as usize + 1
    }

    /// Always false: a window holds at least one day.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether a date falls inside the window.
    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Zero-based offset of `date`, if inside the window.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        if self.contains(date) {
            Some((date - self.start).num_days() as usize)
        } else {
            None
        }
    }

    /// All days, in order.
    pub fn days(&self) -> Vec<NaiveDate> {
        self.start.iter_days().take(self.len()).collect()
    }

    /// Whether two windows share at least one day.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Intersection with another window, if any.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Self {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    /// Per-day weekend flags under the given weekend definition.
    pub fn weekend_mask(&self, weekend_days: &[Weekday]) -> Vec<bool> {
        self.days()
            .iter()
            .map(|d| weekend_days.contains(&d.weekday()))
            .collect()
    }
}
