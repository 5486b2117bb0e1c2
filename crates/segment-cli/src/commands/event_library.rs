use super::{json_pretty, EXIT_SUCCESS};
use segment_core::read_event_library;
use std::path::Path;

/// Print the normalized form and content id of an event library file.
pub fn run(file: &Path, json: bool) -> Result<u8, String> {
    let library = read_event_library(file)
        .map_err(|e| format!("declaration error: {}: {e}", file.display()))?;
    if json {
        let payload = serde_json::json!({
            "id": library.id,
            "json": library.json,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("id:   {}", library.id);
        println!("json: {}", library.json);
    }
    Ok(EXIT_SUCCESS)
}
