use super::{finish, json_pretty, open_state, progress, report, save_state, Globals, EXIT_SUCCESS};
use crate::declaration::{source_address, tracking_plan_address};
use clap::ValueEnum;
use segment_core::Provider;
use segment_state::{ResourceKind, ResourceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportKind {
    TrackingPlan,
    Source,
}

/// Adopt an existing workspace resource into state under `key` (defaults to
/// the resource id).
pub fn run(
    provider: &Provider,
    globals: &Globals,
    kind: ImportKind,
    id: &str,
    key: Option<&str>,
) -> Result<u8, String> {
    let key = key.unwrap_or(id);
    let (store, _lock, mut state) = open_state(globals)?;
    let address = match kind {
        ImportKind::TrackingPlan => tracking_plan_address(key),
        ImportKind::Source => source_address(key),
    };
    if state.resources.contains_key(&address) {
        return Err(format!("state error: {address} is already managed"));
    }

    let pb = progress(globals.json, &format!("importing {id}..."));
    let resource = match kind {
        ImportKind::TrackingPlan => provider.import_tracking_plan(id).map(|(id, attrs)| {
            ResourceState::new(ResourceKind::TrackingPlan, Some(id.to_string()), &attrs)
        }),
        ImportKind::Source => provider.import_source(id).map(|attrs| {
            ResourceState::new(ResourceKind::Source, Some(attrs.source_name.clone()), &attrs)
        }),
    }
    .map_err(|e| {
        finish(pb.as_ref(), false, &format!("import of {id} failed"));
        format!("{address}: {}", report(&e))
    })?
    .map_err(|e| format!("state error: {e}"))?;

    let recorded_id = resource.id.clone().unwrap_or_default();
    state.put(address.clone(), resource);
    save_state(&store, &state)?;
    finish(pb.as_ref(), true, &format!("imported {address}"));

    if globals.json {
        let payload = serde_json::json!({
            "address": address,
            "id": recorded_id,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("imported {recorded_id} as {address}");
    }
    Ok(EXIT_SUCCESS)
}
