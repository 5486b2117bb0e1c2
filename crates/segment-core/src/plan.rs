use crate::source::SourceDeclaration;
use crate::tracking_plan::TrackingPlanDeclaration;
use crate::CoreError;
use segment_schema::schema_config_changed;
use segment_state::{SourceAttributes, TrackingPlanAttributes};
use serde::Serialize;
use std::fmt;

/// What applying a declaration over recorded state would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    /// Delete and create again; the identity changed.
    Replace,
    /// Present in state but no longer declared.
    Delete,
    Noop,
}

impl Action {
    pub fn symbol(self) -> &'static str {
        match self {
            Action::Create => "+",
            Action::Update => "~",
            Action::Replace => "-/+",
            Action::Delete => "-",
            Action::Noop => "=",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Replace => "replace",
            Action::Delete => "delete",
            Action::Noop => "no changes",
        };
        f.write_str(s)
    }
}

pub fn plan_tracking_plan(
    decl: &TrackingPlanDeclaration,
    prior: Option<&TrackingPlanAttributes>,
) -> Result<Action, CoreError> {
    match prior {
        None => Ok(Action::Create),
        Some(prior) if decl.differs_from(prior)? => Ok(Action::Update),
        Some(_) => Ok(Action::Noop),
    }
}

/// Plan a source. A declared schema config equal to the observed one, or
/// left out while the source runs the defaults, is not a change.
pub fn plan_source(decl: &SourceDeclaration, prior: Option<&SourceAttributes>) -> Action {
    let Some(prior) = prior else {
        return Action::Create;
    };
    if prior.source_name != decl.source_name.as_str() || prior.catalog_name != decl.catalog_name {
        return Action::Replace;
    }
    let recorded_plan = prior.tracking_plan.as_deref().filter(|p| !p.is_empty());
    let declared_plan = decl.tracking_plan.as_ref().map(|p| p.as_str());
    if recorded_plan != declared_plan {
        return Action::Update;
    }
    let config_changed = match declared_plan {
        Some(_) => schema_config_changed(decl.schema_config.as_ref(), prior.schema_config.as_ref()),
        None => prior.schema_config.is_some(),
    };
    if config_changed {
        Action::Update
    } else {
        Action::Noop
    }
}
