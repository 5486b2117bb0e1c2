use super::{json_pretty, EXIT_SUCCESS};
use segment_state::{migrate_state_file, StateLock, StateStore};
use std::path::Path;

pub fn run(state_path: &Path, json: bool) -> Result<u8, String> {
    let store = StateStore::new(state_path);
    let _lock =
        StateLock::acquire(&store.lock_path()).map_err(|e| format!("state lock: {e}"))?;

    if !state_path.exists() {
        report(
            json,
            &serde_json::json!({ "status": "no_state" }),
            &format!("No state file at {}. Nothing to upgrade.", state_path.display()),
        )?;
        return Ok(EXIT_SUCCESS);
    }

    match migrate_state_file(state_path).map_err(|e| format!("state error: {e}"))? {
        Some(result) => report(
            json,
            &serde_json::json!({
                "status": "migrated",
                "resources": result.resources_migrated,
                "backup": result.backup_path.display().to_string(),
            }),
            &format!(
                "Upgraded {} resource(s).\nBackup: {}",
                result.resources_migrated,
                result.backup_path.display()
            ),
        )?,
        None => report(
            json,
            &serde_json::json!({ "status": "current" }),
            "State is current. No upgrade needed.",
        )?,
    }
    Ok(EXIT_SUCCESS)
}

fn report(json: bool, payload: &serde_json::Value, human: &str) -> Result<(), String> {
    if json {
        println!("{}", json_pretty(payload)?);
    } else {
        println!("{human}");
    }
    Ok(())
}
