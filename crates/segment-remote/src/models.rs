//! Wire models of the Config API.

use chrono::{DateTime, Utc};
use segment_schema::{path_to_name, RuleSet, SchemaError, SourceName, TrackingPlanId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingPlan {
    /// Full resource name, e.g. `workspaces/acme/tracking-plans/rs_123`.
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub rules: RuleSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

impl TrackingPlan {
    pub fn id(&self) -> Result<TrackingPlanId, SchemaError> {
        TrackingPlanId::from_resource_name(&self.name)
    }
}

/// Body of a tracking plan create or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrackingPlan {
    pub display_name: String,
    pub rules: RuleSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingPlanSourceConnection {
    /// Full source path, e.g. `workspaces/acme/sources/web`.
    pub source_name: String,
    pub tracking_plan_id: String,
}

impl TrackingPlanSourceConnection {
    pub fn source(&self) -> &str {
        path_to_name(&self.source_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub catalog_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
}

impl Source {
    pub fn source_name(&self) -> Result<SourceName, SchemaError> {
        SourceName::from_path(&self.name)
    }
}
