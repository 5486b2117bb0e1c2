//! Process-wide map from source name to the tracking plan it is connected to.
//!
//! The Config API only lists the sources of a given plan, so resolving the
//! plan of a source means walking every plan in the workspace. That walk is
//! done once per process, on the first lookup, and the result is reused by
//! every later lookup. The reconciler's own writes do not update the cache.

use crate::CoreError;
use segment_remote::ConfigApi;
use segment_schema::{SourceName, TrackingPlanId};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

#[derive(Default)]
struct CacheState {
    populated: bool,
    by_source: BTreeMap<String, TrackingPlanId>,
}

#[derive(Default)]
pub struct ConnectionCache {
    state: Mutex<CacheState>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the plan `source` is connected to, enumerating the workspace on
    /// first use.
    ///
    /// Population happens while the lock is held, so concurrent first lookups
    /// enumerate once. A failed enumeration leaves the cache unpopulated and
    /// the next lookup tries again.
    pub fn lookup(
        &self,
        api: &dyn ConfigApi,
        source: &SourceName,
    ) -> Result<Option<TrackingPlanId>, CoreError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.populated {
            populate(&mut state, api)?;
        }
        let found = state.by_source.get(source.as_str()).cloned();
        debug!(
            "connection cache: {source} -> {}",
            found.as_ref().map_or("none", |p| p.as_str())
        );
        Ok(found)
    }

    pub fn is_populated(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .populated
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_source
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn populate(state: &mut CacheState, api: &dyn ConfigApi) -> Result<(), CoreError> {
    let plans = api.list_tracking_plans()?;
    info!("enumerating connections of {} tracking plans", plans.len());
    for plan in &plans {
        let id = match plan.id() {
            Ok(id) => id,
            Err(e) => {
                warn!("skipping tracking plan {}: {e}", plan.name);
                continue;
            }
        };
        for conn in api.list_tracking_plan_sources(&id)? {
            state.by_source.insert(conn.source().to_owned(), id.clone());
        }
    }
    state.populated = true;
    info!("connection cache holds {} sources", state.by_source.len());
    Ok(())
}
