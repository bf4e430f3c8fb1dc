//! Input validation for roster runs.
//!
//! Two layers run before any model is built:
//!
//! 1. [`validate_request`] checks structural integrity of the roster
//!    snapshot and window (duplicate IDs, dangling unavailability records,
//!    empty target roster, inverted window).
//! 2. [`check_feasibility`] rejects inputs that no assignment can satisfy,
//!    using counting arguments only:
//!    - a day whose floor exceeds the persons able to serve it
//!    - a person whose minimum workload exceeds their available days
//!    - a person whose total-home cap is below their unavailable days
//!
//! Both report every issue found, not just the first.

use std::collections::HashSet;

use crate::cp::ModelContext;
use crate::models::{DateWindow, PersonKind, RosterSnapshot};
use crate::params::ConstraintGroupKind;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two persons share the same ID.
    DuplicateId,
    /// A person has an empty ID.
    EmptyId,
    /// An unavailability record references a person not in the roster.
    UnknownPerson,
    /// No active person is left to schedule.
    EmptyRoster,
    /// The window ends before it starts.
    InvalidWindow,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Validates the structure of a run request.
///
/// Checks:
/// 1. The window is not inverted
/// 2. No empty or duplicate person IDs
/// 3. At least one active person
/// 4. Every unavailability record references a known person
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_request(roster: &RosterSnapshot, window: &DateWindow) -> ValidationResult {
    let mut errors = Vec::new();

    if window.start > window.end {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidWindow,
            format!("Window ends ({}) before it starts ({})", window.end, window.start),
        ));
    }

    let mut ids = HashSet::new();
    for person in &roster.persons {
        if person.id.trim().is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyId,
                "Person with empty ID",
            ));
        }
        if !ids.insert(person.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate person ID: {}", person.id),
            ));
        }
    }

    if roster.active_persons().next().is_none() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyRoster,
            "No active person to schedule",
        ));
    }

    // Report each dangling person once.
    let mut reported = HashSet::new();
    for record in &roster.unavailability {
        if !ids.contains(record.person_id.as_str()) && reported.insert(record.person_id.as_str())
        {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownPerson,
                format!(
                    "Unavailability on {} references unknown person '{}'",
                    record.date, record.person_id
                ),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Rejects trivially unsatisfiable inputs before the solver runs.
///
/// Only rules of enabled constraint groups are checked.
///
/// # Returns
/// `Ok(())` when no counting argument rules the input out, `Err(reasons)`
/// otherwise.
pub fn check_feasibility(ctx: &ModelContext) -> Result<(), Vec<String>> {
    let mut reasons = Vec::new();
    let params = &ctx.params;

    if params.group_enabled(ConstraintGroupKind::DailyStaffing) {
        for d in 0..ctx.days() {
            let able = (0..ctx.persons())
                .filter(|&p| ctx.is_available(p, d))
                .filter(|&p| ctx.person(p).kind != PersonKind::WeekendOnly || ctx.weekend[d])
                .count();
            let floor = ctx.floors[d] as usize;
            if floor > able {
                reasons.push(format!(
                    "{}: floor of {floor} but only {able} person(s) can serve",
                    ctx.dates[d]
                ));
            }
        }
    }

    for (p, entry) in ctx.entries.iter().enumerate() {
        let id = &entry.person.id;
        let available = entry.available_count() as u32;
        let plan = ctx.plan.get(p);

        let workload_group = match entry.person.kind {
            PersonKind::Standard => Some(ConstraintGroupKind::WorkloadTarget),
            PersonKind::Exceptional => Some(ConstraintGroupKind::Exceptional),
            PersonKind::WeekendOnly => None,
        };
        if let Some(group) = workload_group {
            if params.group_enabled(group) && plan.on_base_min > available {
                reasons.push(format!(
                    "{id}: needs at least {} on-base day(s) but is available on {available}",
                    plan.on_base_min
                ));
            }
        }

        if entry.person.kind == PersonKind::Standard
            && params.group_enabled(ConstraintGroupKind::WorkloadTarget)
        {
            if let Some(cap) = params.max_total_home_for(id) {
                let unavailable = entry.unavailable_count() as u32;
                if unavailable > cap {
                    reasons.push(format!(
                        "{id}: {unavailable} unavailable day(s) exceed the home cap of {cap}"
                    ));
                }
            }
        }
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(reasons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Person, Unavailability};
    use crate::params::ParameterSet;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn week() -> DateWindow {
        DateWindow::new(date(3), date(9)).unwrap()
    }

    #[test]
    fn test_valid_request() {
        let roster = RosterSnapshot::new()
            .with_person(Person::standard("A"))
            .with_person(Person::standard("B"))
            .with_unavailability(Unavailability::new("A", date(4)));
        assert!(validate_request(&roster, &week()).is_ok());
    }

    #[test]
    fn test_duplicate_person_id() {
        let roster = RosterSnapshot::new()
            .with_person(Person::standard("A"))
            .with_person(Person::exceptional("A"));
        let errors = validate_request(&roster, &week()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateId));
    }

    #[test]
    fn test_empty_roster() {
        let roster = RosterSnapshot::new().with_person(Person::standard("A").inactive());
        let errors = validate_request(&roster, &week()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::EmptyRoster));
    }

    #[test]
    fn test_unknown_person_reported_once() {
        let roster = RosterSnapshot::new()
            .with_person(Person::standard("A"))
            .with_unavailable_dates("ghost", [date(3), date(4)]);
        let errors = validate_request(&roster, &week()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::UnknownPerson);
    }

    #[test]
    fn test_inverted_window() {
        let roster = RosterSnapshot::new().with_person(Person::standard("A"));
        let window = DateWindow {
            start: date(9),
            end: date(3),
        };
        let errors = validate_request(&roster, &window).unwrap_err();
        assert_eq!(errors[0].kind, ValidationErrorKind::InvalidWindow);
    }

    #[test]
    fn test_floor_exceeds_available() {
        // One person, unavailable for the whole window.
        let roster = RosterSnapshot::new()
            .with_person(Person::standard("A"))
            .with_unavailable_dates("A", (3..=9).map(date));
        let params = ParameterSet::default()
            .with_min_required(1)
            .with_base_days_target(3);
        let ctx = ModelContext::new(&roster, week(), params);
        let reasons = check_feasibility(&ctx).unwrap_err();
        assert!(reasons.len() >= 7);
        assert!(reasons[0].contains("floor of 1"));
    }

    #[test]
    fn test_weekend_only_counts_on_weekends() {
        let roster = RosterSnapshot::new()
            .with_person(Person::standard("A"))
            .with_person(Person::weekend_only("W"));
        let params = ParameterSet::default()
            .with_min_required(2)
            .with_base_days_target(7)
            .with_consecutive_caps(7, 7);
        let ctx = ModelContext::new(&roster, week(), params);
        let reasons = check_feasibility(&ctx).unwrap_err();
        // Only the five non-weekend days are short.
        assert_eq!(reasons.len(), 5);

        let relaxed = ctx.params.clone().without_group(ConstraintGroupKind::DailyStaffing);
        let ctx = ModelContext::new(&roster, week(), relaxed);
        assert!(check_feasibility(&ctx).is_ok());
    }

    #[test]
    fn test_home_cap_below_unavailable() {
        let roster = RosterSnapshot::new()
            .with_person(Person::standard("A"))
            .with_unavailable_dates("A", (3..=5).map(date));
        let params = ParameterSet::default()
            .with_min_required(0)
            .with_weekend_coverage(false)
            .with_base_days_target(4)
            .with_max_total_home_days(2);
        let ctx = ModelContext::new(&roster, week(), params);
        let reasons = check_feasibility(&ctx).unwrap_err();
        assert!(reasons.iter().any(|r| r.contains("home cap")));
    }
}
