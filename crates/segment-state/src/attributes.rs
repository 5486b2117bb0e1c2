//! Typed views over persisted resource attributes.

use segment_schema::SchemaViolationConfig;
use serde::{Deserialize, Serialize};

/// Attributes of a tracking plan resource (schema version 2).
///
/// `rules_json_file` holds only the per-plan events after library events have
/// been factored out; `import_from` holds the library snapshot as a JSON array
/// string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingPlanAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_json_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

/// Attributes of a source resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAttributes {
    pub source_name: String,
    pub catalog_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_config: Option<SchemaViolationConfig>,
}
