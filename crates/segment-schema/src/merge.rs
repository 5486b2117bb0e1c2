//! Composition of library and per-plan events, and its inverse.

use crate::library::flatten_libraries;
use crate::rules::{Event, RuleSet};
use std::collections::HashSet;
use tracing::{debug, info};

/// Merge per-plan events over the flattened library events.
///
/// Starting from `library`, each plan event replaces the library entry with
/// the same name in place, or is appended when no such entry exists.
pub fn merge_events(library: &[Event], plan: &[Event]) -> Vec<Event> {
    let mut merged = library.to_vec();
    for event in plan {
        match merged.iter_mut().find(|m| m.name == event.name) {
            Some(slot) => *slot = event.clone(),
            None => merged.push(event.clone()),
        }
    }
    merged
}

/// Result of splitting a remote event list back into its sources.
#[derive(Debug, Clone, PartialEq)]
pub struct Inversion {
    /// Remote events not provided by any library, in remote order.
    pub plan_events: Vec<Event>,
    /// The library snapshot with remote payloads copied over same-name events.
    pub libraries: Vec<RuleSet>,
}

/// Undo [`merge_events`] for a remote event list.
///
/// Every remote event whose name appears in the flattened libraries is treated
/// as library-owned: the remote payload replaces every library event of that
/// name in the returned snapshot. All other remote events become plan events.
pub fn invert_events(remote: &[Event], libraries: &[RuleSet]) -> Inversion {
    let library_names: HashSet<String> = flatten_libraries(libraries)
        .into_iter()
        .map(|e| e.name)
        .collect();
    debug!("searching {} library events", library_names.len());

    let mut snapshot = libraries.to_vec();
    let mut plan_events = Vec::new();
    for event in remote {
        if library_names.contains(&event.name) {
            for slot in snapshot
                .iter_mut()
                .flat_map(|lib| lib.events.iter_mut())
                .filter(|e| e.name == event.name)
            {
                *slot = event.clone();
            }
        } else {
            plan_events.push(event.clone());
        }
    }
    info!("found {} plan events", plan_events.len());

    Inversion {
        plan_events,
        libraries: snapshot,
    }
}
