//! Event library documents read from disk.

use crate::CoreError;
use segment_schema::{serialize_libraries, validate_json_object, EventLibrary};
use std::path::Path;
use tracing::debug;

/// Read and normalize a rules document into an [`EventLibrary`].
pub fn read_event_library(path: &Path) -> Result<EventLibrary, CoreError> {
    let text = std::fs::read_to_string(path)?;
    validate_json_object("rules_json_file", &text)?;
    let library = EventLibrary::from_rules(&text)?;
    debug!("read event library {} from {}", library.id, path.display());
    Ok(library)
}

/// Build an `import_from` document listing `libraries` in order.
pub fn libraries_document(libraries: &[EventLibrary]) -> Result<String, CoreError> {
    let sets = libraries
        .iter()
        .map(EventLibrary::rule_set)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(serialize_libraries(&sets)?)
}
