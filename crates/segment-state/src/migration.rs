//! Resource schema migrations.
//!
//! Tracking plan state written before schema version 2 stored `import_from`
//! as a list of JSON strings, one rule set per element. Version 2 stores a
//! single JSON array string. [`migrate_state_file`] backs up the state file
//! before rewriting it atomically.

use crate::state::{write_atomic, ResourceKind, ResourceState, StateFile, STATE_FORMAT_VERSION};
use crate::StateError;
use segment_schema::{serialize_libraries, RuleSet, SchemaError};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of a state file migration that changed something.
#[derive(Debug)]
pub struct MigrationResult {
    pub resources_migrated: usize,
    pub backup_path: PathBuf,
}

/// Rewrite a version 1 tracking plan attribute map into version 2.
///
/// - absent or null `import_from`: unchanged.
/// - a list of JSON strings: replaced by one JSON array string; an empty list
///   becomes `"[]"`.
/// - already a string: unchanged, so running the upgrade twice is harmless.
///
/// Returns whether the map was modified.
pub fn upgrade_tracking_plan_v1_to_v2(
    attributes: &mut Map<String, Value>,
) -> Result<bool, StateError> {
    let items = match attributes.get("import_from") {
        None | Some(Value::Null) => {
            debug!("import_from not set, skipping");
            return Ok(false);
        }
        Some(Value::String(_)) => {
            debug!("import_from already a JSON string, skipping");
            return Ok(false);
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(SchemaError::UnexpectedShape {
                field: "import_from".to_owned(),
                expected: "list of JSON strings",
            }
            .into())
        }
    };

    let mut libraries = Vec::with_capacity(items.len());
    for item in items {
        let text = item.as_str().ok_or_else(|| SchemaError::UnexpectedShape {
            field: "import_from".to_owned(),
            expected: "list of JSON strings",
        })?;
        let library: RuleSet = serde_json::from_str(text)
            .map_err(|e| SchemaError::InvalidLibrary(e.to_string()))?;
        libraries.push(library);
    }

    let upgraded = serialize_libraries(&libraries)?;
    attributes.insert("import_from".to_owned(), Value::String(upgraded));
    info!("upgraded import_from of {} libraries to v2", libraries.len());
    Ok(true)
}

/// Bring one resource up to the schema version of its kind.
///
/// Returns whether anything changed. A resource written by a newer provider
/// is refused.
pub fn migrate_resource(resource: &mut ResourceState) -> Result<bool, StateError> {
    let supported = resource.kind.schema_version();
    let found = resource.schema_version;
    if found > supported {
        return Err(StateError::SchemaVersionTooNew {
            kind: resource.kind,
            found,
            supported,
        });
    }
    if found == supported {
        return Ok(false);
    }

    if resource.kind == ResourceKind::TrackingPlan && found < 2 {
        upgrade_tracking_plan_v1_to_v2(&mut resource.attributes)?;
    }
    resource.schema_version = supported;
    info!("migrated {} from schema v{found} to v{supported}", resource.kind);
    Ok(true)
}

/// Migrate every resource of the state file at `path`.
///
/// - Returns `Ok(None)` if the file is missing or already current.
/// - Creates a backup at `<path>.backup.{timestamp}` before rewriting.
/// - Fails without touching the file if any resource fails to migrate.
pub fn migrate_state_file(path: &Path) -> Result<Option<MigrationResult>, StateError> {
    if !path.exists() {
        debug!("no state file at {}", path.display());
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let mut state: StateFile = serde_json::from_str(&content)?;
    if state.format_version > STATE_FORMAT_VERSION {
        return Err(StateError::VersionMismatch {
            expected: STATE_FORMAT_VERSION,
            found: state.format_version,
        });
    }

    let mut migrated = 0;
    for (address, resource) in &mut state.resources {
        match migrate_resource(resource) {
            Ok(true) => migrated += 1,
            Ok(false) => {}
            Err(e) => {
                warn!("cannot migrate {address}: {e}");
                return Err(e);
            }
        }
    }

    if migrated == 0 && state.format_version == STATE_FORMAT_VERSION {
        return Ok(None);
    }
    state.format_version = STATE_FORMAT_VERSION;

    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    let mut backup_name = path.as_os_str().to_owned();
    backup_name.push(format!(".backup.{timestamp}"));
    let backup_path = PathBuf::from(backup_name);
    fs::copy(path, &backup_path)?;
    info!("backed up state file to {}", backup_path.display());

    let new_content = serde_json::to_string_pretty(&state)?;
    write_atomic(path, new_content.as_bytes())?;
    info!("migrated {migrated} resources in {}", path.display());

    Ok(Some(MigrationResult {
        resources_migrated: migrated,
        backup_path,
    }))
}
