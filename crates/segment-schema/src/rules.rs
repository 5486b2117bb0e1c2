use crate::SchemaError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a tracking plan as accepted by the Config API.
///
/// `global`, `identify` and `group` are JSON schema fragments passed through
/// untouched. Only `events` is interpreted, and only by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identify: Option<Value>,
}

/// A tracked event. Two events are "the same" for merge purposes when their
/// names match; the remaining fields are payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl Event {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl RuleSet {
    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parse a per-plan rules document.
///
/// An empty (or whitespace-only) document yields an empty `RuleSet`. Anything
/// else must be a JSON object matching the rule set shape.
pub fn parse_rules(text: &str) -> Result<RuleSet, SchemaError> {
    if text.trim().is_empty() {
        return Ok(RuleSet::default());
    }
    let value: Value =
        serde_json::from_str(text).map_err(|e| SchemaError::InvalidRules(e.to_string()))?;
    if !value.is_object() {
        return Err(SchemaError::InvalidRules(
            "rules document must be a JSON object".to_owned(),
        ));
    }
    serde_json::from_value(value).map_err(|e| SchemaError::InvalidRules(e.to_string()))
}
