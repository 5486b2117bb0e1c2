use super::{
    attributes, finish, json_pretty, open_state, progress, report, save_state, tracking_plan_id,
    Globals, EXIT_SUCCESS,
};
use segment_core::{CoreError, Provider};
use segment_schema::{SourceName, TrackingPlanId};
use segment_state::{ResourceKind, ResourceState, SourceAttributes, TrackingPlanAttributes};
use tracing::warn;

/// Re-read every resource in state. Resources gone from the workspace are
/// dropped from state.
pub fn run(provider: &Provider, globals: &Globals) -> Result<u8, String> {
    let (store, _lock, mut state) = open_state(globals)?;
    let pb = progress(globals.json, "refreshing state...");

    let entries: Vec<(String, ResourceState)> = state
        .resources
        .iter()
        .map(|(a, r)| (a.clone(), r.clone()))
        .collect();
    let mut refreshed = Vec::new();
    let mut removed = Vec::new();

    for (address, resource) in entries {
        match refresh_one(provider, &address, &resource) {
            Ok(updated) => {
                state.put(address.clone(), updated);
                refreshed.push(address);
            }
            Err(Refresh::Gone) => {
                warn!("{address} no longer exists, removing it from state");
                state.remove(&address);
                removed.push(address);
            }
            Err(Refresh::Failed(msg)) => {
                finish(pb.as_ref(), false, "refresh failed");
                save_state(&store, &state)?;
                return Err(msg);
            }
        }
    }
    save_state(&store, &state)?;
    finish(pb.as_ref(), true, "state refreshed");

    if globals.json {
        let payload = serde_json::json!({
            "refreshed": refreshed,
            "removed": removed,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("refreshed {} resource(s)", refreshed.len());
        for address in &removed {
            println!("removed {address} (deleted outside the provider)");
        }
    }
    Ok(EXIT_SUCCESS)
}

enum Refresh {
    Gone,
    Failed(String),
}

impl From<String> for Refresh {
    fn from(msg: String) -> Self {
        Refresh::Failed(msg)
    }
}

fn refresh_one(
    provider: &Provider,
    address: &str,
    resource: &ResourceState,
) -> Result<ResourceState, Refresh> {
    let outcome = match resource.kind {
        ResourceKind::TrackingPlan => {
            let id = tracking_plan_id(address, resource)?;
            let prior: TrackingPlanAttributes = attributes(address, resource)?;
            provider
                .read_tracking_plan(&id, prior.import_from.as_deref())
                .map(|attrs| ResourceState::new(resource.kind, Some(id.to_string()), &attrs))
        }
        ResourceKind::Source => {
            let prior: SourceAttributes = attributes(address, resource)?;
            let name = SourceName::new(&prior.source_name)
                .map_err(|e| format!("state error: {address}: {e}"))?;
            let plan = match prior.tracking_plan.as_deref().filter(|p| !p.is_empty()) {
                Some(p) => Some(
                    TrackingPlanId::parse(p).map_err(|e| format!("state error: {address}: {e}"))?,
                ),
                None => None,
            };
            provider
                .read_source(&name, plan.as_ref())
                .map(|attrs| ResourceState::new(resource.kind, Some(name.to_string()), &attrs))
        }
    };
    match outcome {
        Ok(state) => Ok(state.map_err(|e| format!("state error: {e}"))?),
        Err(CoreError::Remote(e)) if e.is_not_found() => Err(Refresh::Gone),
        Err(e) => Err(Refresh::Failed(format!("{address}: {}", report(&e)))),
    }
}
