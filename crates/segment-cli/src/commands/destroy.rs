use super::apply::delete_resource;
use super::{
    check_interrupted, finish, json_pretty, open_state, progress, save_state, Globals,
    EXIT_SUCCESS,
};
use dialoguer::Confirm;
use segment_core::Provider;
use segment_state::{ResourceKind, ResourceState};

/// Delete every managed resource, sources before tracking plans.
pub fn run(provider: &Provider, globals: &Globals, yes: bool) -> Result<u8, String> {
    let (store, _lock, mut state) = open_state(globals)?;
    let ordered: Vec<(String, ResourceState)> = [ResourceKind::Source, ResourceKind::TrackingPlan]
        .into_iter()
        .flat_map(|kind| {
            state
                .of_kind(kind)
                .map(|(a, r)| (a.clone(), r.clone()))
                .collect::<Vec<_>>()
        })
        .collect();

    if ordered.is_empty() {
        if globals.json {
            println!("{}", json_pretty(&serde_json::json!({ "destroyed": [] }))?);
        } else {
            println!("nothing to destroy");
        }
        return Ok(EXIT_SUCCESS);
    }

    if !yes {
        let prompt = format!(
            "Destroy {} managed resource(s)? This cannot be undone",
            ordered.len()
        );
        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| format!("confirmation failed (use --yes to skip): {e}"))?;
        if !confirmed {
            println!("aborted");
            return Ok(EXIT_SUCCESS);
        }
    }

    let mut destroyed = Vec::new();
    for (address, resource) in ordered {
        if let Err(e) = check_interrupted() {
            save_state(&store, &state)?;
            return Err(e);
        }
        let pb = progress(globals.json, &format!("destroying {address}..."));
        if let Err(e) = delete_resource(provider, &address, &resource) {
            finish(pb.as_ref(), false, &address);
            save_state(&store, &state)?;
            return Err(e);
        }
        finish(pb.as_ref(), true, &format!("destroyed {address}"));
        state.remove(&address);
        destroyed.push(address);
    }
    save_state(&store, &state)?;

    if globals.json {
        println!(
            "{}",
            json_pretty(&serde_json::json!({ "destroyed": destroyed }))?
        );
    } else {
        println!("destroyed {} resource(s)", destroyed.len());
    }
    Ok(EXIT_SUCCESS)
}
