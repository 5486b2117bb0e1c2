//! Tracking plan rules, event libraries, identifiers, and source schema settings for Segment.
//!
//! This crate defines the schema layer of the provider: the `RuleSet`/`Event`
//! model sent to the Config API, semantic JSON comparison used for diff
//! suppression (`json_equivalent`), event library loading and flattening,
//! the library/plan event merge and its inverse, the schema-violation settings
//! attached to a source, and newtype identifiers with path helpers.

pub mod compare;
pub mod library;
pub mod merge;
pub mod paths;
pub mod rules;
pub mod types;
pub mod violations;

pub use compare::{json_equivalent, validate_json_object};
pub use library::{flatten_libraries, load_libraries, serialize_libraries, EventLibrary};
pub use merge::{invert_events, merge_events, Inversion};
pub use paths::{path_to_name, source_path, tracking_plan_path};
pub use rules::{parse_rules, Event, RuleSet};
pub use types::{DestinationFilterId, DestinationId, SourceName, TrackingPlanId};
pub use violations::{
    schema_config_changed, SchemaViolationConfig, TrackViolationBehaviour,
    TraitViolationBehaviour, DEFAULT_SCHEMA_CONFIG,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid rules document: {0}")]
    InvalidRules(String),
    #[error("invalid library document: {0}")]
    InvalidLibrary(String),
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("unexpected value for '{field}': expected {expected}")]
    UnexpectedShape {
        field: String,
        expected: &'static str,
    },
    #[error("invalid value '{value}' for '{field}', expected one of: {allowed}")]
    InvalidBehaviour {
        field: String,
        value: String,
        allowed: String,
    },
    #[error("unknown setting '{0}'")]
    UnknownField(String),
    #[error("invalid {kind} identifier: '{value}'")]
    InvalidIdentifier { kind: &'static str, value: String },
}
