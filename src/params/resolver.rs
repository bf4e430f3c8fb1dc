//! Parameter resolution.
//!
//! # Algorithm
//!
//! 1. Keep events whose override flag is set and whose date range
//!    overlaps the run window.
//! 2. Sort by priority descending (ties broken by event id).
//! 3. For each event, key and covered cell, the first event to claim the
//!    (cell, key) pair wins. Day-scoped keys cover the event's days inside
//!    the window; person-scoped keys cover its targeted persons.
//! 4. Later events that claim an already-won pair with a different value
//!    are recorded as soft overrides.
//! 5. Validate the merged set.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::debug;

use super::{
    EventOverride, ParameterKey, ParameterScope, ParameterSet, PersonOverrides, ResolvedParameter,
    SoftOverride,
};
use crate::error::ConfigurationError;
use crate::models::{DateWindow, PersonId};

/// Merges global defaults with event overrides.
#[derive(Debug, Clone, Default)]
pub struct ParameterResolver {
    defaults: ParameterSet,
    events: Vec<EventOverride>,
}

impl ParameterResolver {
    /// Creates a resolver over the given global defaults.
    pub fn new(defaults: ParameterSet) -> Self {
        Self {
            defaults,
            events: Vec::new(),
        }
    }

    /// Adds an event.
    pub fn with_event(mut self, event: EventOverride) -> Self {
        self.events.push(event);
        self
    }

    /// Adds several events.
    pub fn with_events(mut self, events: impl IntoIterator<Item = EventOverride>) -> Self {
        self.events.extend(events);
        self
    }

    /// Resolves the effective parameters for a run.
    ///
    /// # Errors
    /// [`ConfigurationError`] when the merged values are inconsistent.
    pub fn resolve(
        &self,
        window: &DateWindow,
        persons: &[PersonId],
    ) -> Result<ParameterSet, ConfigurationError> {
        let mut active: Vec<&EventOverride> = self
            .events
            .iter()
            .filter(|e| e.override_active && e.span_within(window).is_some())
            .collect();
        active.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

        let mut winners: BTreeMap<(ParameterScope, ParameterKey), (u32, String)> = BTreeMap::new();
        let mut soft_overrides = Vec::new();

        for event in &active {
            let Some(span) = event.span_within(window) else {
                continue;
            };
            for key in ParameterKey::ALL {
                let Some(value) = event.overrides.get(key) else {
                    continue;
                };
                let cells: Vec<ParameterScope> = if key.is_day_scoped() {
                    span.days().into_iter().map(ParameterScope::Day).collect()
                } else {
                    persons
                        .iter()
                        .filter(|p| event.targets(p))
                        .map(|p| ParameterScope::Person(p.clone()))
                        .collect()
                };

                for scope in cells {
                    match winners.entry((scope, key)) {
                        Entry::Vacant(slot) => {
                            slot.insert((value, event.id.clone()));
                        }
                        Entry::Occupied(slot) => {
                            let (won_value, won_by) = slot.get();
                            if *won_value != value {
                                soft_overrides.push(SoftOverride {
                                    key,
                                    scope: slot.key().0.clone(),
                                    value,
                                    event_id: event.id.clone(),
                                    winner_event_id: won_by.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }

        let mut params = self.defaults.clone();
        for ((scope, key), (value, event_id)) in winners {
            match &scope {
                ParameterScope::Day(date) => {
                    params.day_overrides.insert(*date, value);
                }
                ParameterScope::Person(id) => {
                    apply_person_value(params.person_overrides.entry(id.clone()).or_default(), key, value);
                }
            }
            params.provenance.push(ResolvedParameter {
                key,
                scope,
                value,
                event_id,
            });
        }
        params.soft_overrides.extend(soft_overrides);

        debug!(
            events = active.len(),
            resolved = params.provenance.len(),
            soft = params.soft_overrides.len(),
            "parameters resolved"
        );

        params.validate(window, persons)?;
        Ok(params)
    }
}

fn apply_person_value(overrides: &mut PersonOverrides, key: ParameterKey, value: u32) {
    let slot = match key {
        ParameterKey::BaseDaysTarget => &mut overrides.base_days_target,
        ParameterKey::MaxTotalHomeDays => &mut overrides.max_total_home_days,
        ParameterKey::MaxConsecutiveBaseDays => &mut overrides.max_consecutive_base_days,
        ParameterKey::MaxConsecutiveHomeDays => &mut overrides.max_consecutive_home_days,
        ParameterKey::MinBaseBlockDays => &mut overrides.min_base_block_days,
        ParameterKey::MinRequiredPerDay => return,
    };
    *slot = Some(value);
}
