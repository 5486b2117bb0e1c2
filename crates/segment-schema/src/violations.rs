//! Schema-violation settings of a source connected to a tracking plan.

use crate::SchemaError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// What happens to a track call that violates the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackViolationBehaviour {
    Allow,
    OmitProperties,
    Block,
}

/// What happens to an identify or group call that violates the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraitViolationBehaviour {
    Allow,
    OmitTraits,
    Block,
}

impl TrackViolationBehaviour {
    pub const ALLOWED: &'static [&'static str] = &["ALLOW", "OMIT_PROPERTIES", "BLOCK"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::OmitProperties => "OMIT_PROPERTIES",
            Self::Block => "BLOCK",
        }
    }

    fn parse(field: &str, value: &str) -> Result<Self, SchemaError> {
        match value {
            "ALLOW" => Ok(Self::Allow),
            "OMIT_PROPERTIES" => Ok(Self::OmitProperties),
            "BLOCK" => Ok(Self::Block),
            other => Err(invalid_behaviour(field, other, Self::ALLOWED)),
        }
    }
}

impl TraitViolationBehaviour {
    pub const ALLOWED: &'static [&'static str] = &["ALLOW", "OMIT_TRAITS", "BLOCK"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::OmitTraits => "OMIT_TRAITS",
            Self::Block => "BLOCK",
        }
    }

    fn parse(field: &str, value: &str) -> Result<Self, SchemaError> {
        match value {
            "ALLOW" => Ok(Self::Allow),
            "OMIT_TRAITS" => Ok(Self::OmitTraits),
            "BLOCK" => Ok(Self::Block),
            other => Err(invalid_behaviour(field, other, Self::ALLOWED)),
        }
    }
}

impl fmt::Display for TrackViolationBehaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TraitViolationBehaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn invalid_behaviour(field: &str, value: &str, allowed: &[&str]) -> SchemaError {
    SchemaError::InvalidBehaviour {
        field: field.to_owned(),
        value: value.to_owned(),
        allowed: allowed.join(", "),
    }
}

/// Settings controlling how a source treats data that violates its plan.
///
/// `name` and `parent` are reported by the API and never sent back; they take
/// no part in change detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolationConfig {
    pub allow_unplanned_track_events: bool,
    pub allow_unplanned_identify_traits: bool,
    pub allow_unplanned_group_traits: bool,
    #[serde(default)]
    pub forwarding_blocked_events_to: String,
    pub allow_unplanned_track_event_properties: bool,
    pub allow_track_event_on_violations: bool,
    pub allow_identify_traits_on_violations: bool,
    pub allow_group_traits_on_violations: bool,
    #[serde(default)]
    pub forwarding_violations_to: String,
    pub allow_track_properties_on_violations: bool,
    pub common_track_event_on_violations: TrackViolationBehaviour,
    pub common_identify_event_on_violations: TraitViolationBehaviour,
    pub common_group_event_on_violations: TraitViolationBehaviour,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// Settings applied to a connected source that declares none.
pub const DEFAULT_SCHEMA_CONFIG: SchemaViolationConfig = SchemaViolationConfig {
    allow_unplanned_track_events: true,
    allow_unplanned_identify_traits: true,
    allow_unplanned_group_traits: true,
    forwarding_blocked_events_to: String::new(),
    allow_unplanned_track_event_properties: true,
    allow_track_event_on_violations: false,
    allow_identify_traits_on_violations: true,
    allow_group_traits_on_violations: true,
    forwarding_violations_to: String::new(),
    allow_track_properties_on_violations: true,
    common_track_event_on_violations: TrackViolationBehaviour::Allow,
    common_identify_event_on_violations: TraitViolationBehaviour::Allow,
    common_group_event_on_violations: TraitViolationBehaviour::Allow,
    name: None,
    parent: None,
};

impl Default for SchemaViolationConfig {
    fn default() -> Self {
        DEFAULT_SCHEMA_CONFIG
    }
}

const FIELDS: &[&str] = &[
    "allow_unplanned_track_events",
    "allow_unplanned_identify_traits",
    "allow_unplanned_group_traits",
    "forwarding_blocked_events_to",
    "allow_unplanned_track_event_properties",
    "allow_track_event_on_violations",
    "allow_identify_traits_on_violations",
    "allow_group_traits_on_violations",
    "forwarding_violations_to",
    "allow_track_properties_on_violations",
    "common_track_event_on_violations",
    "common_identify_event_on_violations",
    "common_group_event_on_violations",
    "name",
    "parent",
];

fn get_bool(map: &Map<String, Value>, field: &str) -> Result<bool, SchemaError> {
    map.get(field)
        .and_then(Value::as_bool)
        .ok_or_else(|| SchemaError::UnexpectedShape {
            field: field.to_owned(),
            expected: "boolean",
        })
}

fn get_string_or_empty(map: &Map<String, Value>, field: &str) -> Result<String, SchemaError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SchemaError::UnexpectedShape {
            field: field.to_owned(),
            expected: "string",
        }),
    }
}

fn get_str<'a>(map: &'a Map<String, Value>, field: &str) -> Result<&'a str, SchemaError> {
    map.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::UnexpectedShape {
            field: field.to_owned(),
            expected: "string",
        })
}

fn get_optional(map: &Map<String, Value>, field: &str) -> Option<String> {
    map.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

impl SchemaViolationConfig {
    /// Decode a settings map as declared by the user or stored in state.
    ///
    /// Booleans and behaviours are required; the forwarding targets default to
    /// the empty string. Keys outside the known settings are rejected.
    pub fn decode(map: &Map<String, Value>) -> Result<Self, SchemaError> {
        if let Some(unknown) = map.keys().find(|k| !FIELDS.contains(&k.as_str())) {
            return Err(SchemaError::UnknownField(unknown.clone()));
        }
        let track = "common_track_event_on_violations";
        let identify = "common_identify_event_on_violations";
        let group = "common_group_event_on_violations";
        Ok(Self {
            allow_unplanned_track_events: get_bool(map, "allow_unplanned_track_events")?,
            allow_unplanned_identify_traits: get_bool(map, "allow_unplanned_identify_traits")?,
            allow_unplanned_group_traits: get_bool(map, "allow_unplanned_group_traits")?,
            forwarding_blocked_events_to: get_string_or_empty(map, "forwarding_blocked_events_to")?,
            allow_unplanned_track_event_properties: get_bool(
                map,
                "allow_unplanned_track_event_properties",
            )?,
            allow_track_event_on_violations: get_bool(map, "allow_track_event_on_violations")?,
            allow_identify_traits_on_violations: get_bool(
                map,
                "allow_identify_traits_on_violations",
            )?,
            allow_group_traits_on_violations: get_bool(map, "allow_group_traits_on_violations")?,
            forwarding_violations_to: get_string_or_empty(map, "forwarding_violations_to")?,
            allow_track_properties_on_violations: get_bool(
                map,
                "allow_track_properties_on_violations",
            )?,
            common_track_event_on_violations: TrackViolationBehaviour::parse(
                track,
                get_str(map, track)?,
            )?,
            common_identify_event_on_violations: TraitViolationBehaviour::parse(
                identify,
                get_str(map, identify)?,
            )?,
            common_group_event_on_violations: TraitViolationBehaviour::parse(
                group,
                get_str(map, group)?,
            )?,
            name: get_optional(map, "name"),
            parent: get_optional(map, "parent"),
        })
    }

    /// Compare the settings themselves, ignoring `name` and `parent`.
    pub fn same_settings(&self, other: &Self) -> bool {
        self.without_identity() == other.without_identity()
    }

    pub fn is_default(&self) -> bool {
        self.same_settings(&DEFAULT_SCHEMA_CONFIG)
    }

    fn without_identity(&self) -> Self {
        Self {
            name: None,
            parent: None,
            ..self.clone()
        }
    }
}

/// Report whether the declared settings differ from the observed ones.
///
/// A missing side stands for [`DEFAULT_SCHEMA_CONFIG`], so declaring nothing
/// against a source already running the defaults is not a change.
pub fn schema_config_changed(
    declared: Option<&SchemaViolationConfig>,
    observed: Option<&SchemaViolationConfig>,
) -> bool {
    let default_config = DEFAULT_SCHEMA_CONFIG;
    let declared = declared.unwrap_or(&default_config);
    let observed = observed.unwrap_or(&default_config);
    !declared.same_settings(observed)
}
