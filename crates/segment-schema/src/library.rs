//! Event libraries: reusable rule sets imported into tracking plans.

use crate::rules::{parse_rules, Event, RuleSet};
use crate::SchemaError;
use std::collections::HashMap;
use tracing::debug;

/// Decode the `import_from` document, a JSON array of rule sets.
///
/// Absent or blank input means no libraries.
pub fn load_libraries(import_from: Option<&str>) -> Result<Vec<RuleSet>, SchemaError> {
    let Some(text) = import_from.filter(|t| !t.trim().is_empty()) else {
        debug!("no event libraries declared");
        return Ok(Vec::new());
    };
    let libraries: Vec<RuleSet> =
        serde_json::from_str(text).map_err(|e| SchemaError::InvalidLibrary(e.to_string()))?;
    debug!("loaded {} event libraries", libraries.len());
    Ok(libraries)
}

/// Encode a library snapshot back to its `import_from` form.
pub fn serialize_libraries(libraries: &[RuleSet]) -> Result<String, SchemaError> {
    Ok(serde_json::to_string(libraries)?)
}

/// Concatenate the events of every library and sort them by name.
///
/// When several libraries define the same event name, the one appearing last
/// wins. The sort is stable.
pub fn flatten_libraries(libraries: &[RuleSet]) -> Vec<Event> {
    let mut flat: Vec<Event> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for event in libraries.iter().flat_map(|lib| lib.events.iter()) {
        match index.get(&event.name) {
            Some(&i) => flat[i] = event.clone(),
            None => {
                index.insert(event.name.clone(), flat.len());
                flat.push(event.clone());
            }
        }
    }
    flat.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("flattened {} library events", flat.len());
    flat
}

/// A normalized event library document and its content-derived id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLibrary {
    pub id: String,
    pub json: String,
}

impl EventLibrary {
    /// Normalize a rules document through the rule set model.
    ///
    /// Unknown keys are dropped and empty sections omitted, so two documents
    /// describing the same library produce the same `json` and `id`.
    pub fn from_rules(text: &str) -> Result<Self, SchemaError> {
        let rules = parse_rules(text)?;
        let json = rules.to_json()?;
        let id = blake3::hash(json.as_bytes()).to_hex().to_string();
        Ok(Self { id, json })
    }

    pub fn rule_set(&self) -> Result<RuleSet, SchemaError> {
        parse_rules(&self.json)
    }
}
