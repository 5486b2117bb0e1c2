//! Tracking plan lifecycle.
//!
//! On write, the declared per-plan events are merged over the flattened event
//! libraries and the result is sent as the plan's rules. On read, the remote
//! events are split back: events named by a library refresh the library
//! snapshot, everything else becomes the per-plan rules.

use crate::provider::Provider;
use crate::CoreError;
use chrono::{DateTime, Utc};
use segment_remote::{NewTrackingPlan, TrackingPlan};
use segment_schema::{
    flatten_libraries, invert_events, json_equivalent, load_libraries, merge_events, parse_rules,
    serialize_libraries, validate_json_object, RuleSet, TrackingPlanId,
};
use segment_state::TrackingPlanAttributes;
use tracing::{debug, info};

/// Desired state of a tracking plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingPlanDeclaration {
    pub display_name: String,
    /// Per-plan rules document, a JSON object.
    pub rules_json_file: Option<String>,
    /// Event libraries, a JSON array of rules documents.
    pub import_from: Option<String>,
}

impl TrackingPlanDeclaration {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.display_name.trim().is_empty() {
            return Err(CoreError::InvalidDeclaration(
                "display_name cannot be empty".to_owned(),
            ));
        }
        if let Some(rules) = non_blank(self.rules_json_file.as_deref()) {
            validate_json_object("rules_json_file", rules)?;
        }
        load_libraries(self.import_from.as_deref())?;
        Ok(())
    }

    /// Compose the body sent to the API: library events first (sorted by
    /// name), overridden or extended by the per-plan events.
    pub fn compose(&self) -> Result<NewTrackingPlan, CoreError> {
        let mut rules = parse_rules(self.rules_json_file.as_deref().unwrap_or_default())?;
        let libraries = load_libraries(self.import_from.as_deref())?;
        rules.events = merge_events(&flatten_libraries(&libraries), &rules.events);
        debug!(
            "composed tracking plan {} with {} events",
            self.display_name,
            rules.events.len()
        );
        Ok(NewTrackingPlan {
            display_name: self.display_name.clone(),
            rules,
        })
    }

    /// Whether applying this declaration over `prior` needs a remote update.
    pub fn differs_from(&self, prior: &TrackingPlanAttributes) -> Result<bool, CoreError> {
        if self.display_name != prior.display_name {
            return Ok(true);
        }
        // both sides in the form a read produces: empty events and
        // descriptions dropped, an absent document as `{}`
        let rules_same = json_equivalent(
            &canonical_rules(prior.rules_json_file.as_deref())?,
            &canonical_rules(self.rules_json_file.as_deref())?,
        )?;
        let libraries_same = json_equivalent(
            &canonical_libraries(prior.import_from.as_deref())?,
            &canonical_libraries(self.import_from.as_deref())?,
        )?;
        Ok(!(rules_same && libraries_same))
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

fn canonical_rules(text: Option<&str>) -> Result<String, CoreError> {
    Ok(parse_rules(text.unwrap_or_default())?.to_json()?)
}

fn canonical_libraries(text: Option<&str>) -> Result<String, CoreError> {
    match non_blank(text) {
        Some(t) => Ok(serialize_libraries(&load_libraries(Some(t))?)?),
        None => Ok(String::new()),
    }
}

fn timestamp(t: Option<DateTime<Utc>>) -> Option<String> {
    t.map(|t| t.to_rfc3339())
}

/// Split a remote plan into the attributes recorded in state.
///
/// `import_from` is the library document the plan was declared with; the
/// returned snapshot carries remote payloads for every library event.
pub fn observe_tracking_plan(
    plan: TrackingPlan,
    import_from: Option<&str>,
) -> Result<TrackingPlanAttributes, CoreError> {
    let import_from = non_blank(import_from);
    let libraries = load_libraries(import_from)?;
    let inversion = invert_events(&plan.rules.events, &libraries);
    let rules = RuleSet {
        events: inversion.plan_events,
        ..plan.rules
    };
    let snapshot = match import_from {
        Some(_) => Some(serialize_libraries(&inversion.libraries)?),
        None => None,
    };
    Ok(TrackingPlanAttributes {
        name: Some(plan.name),
        display_name: plan.display_name,
        rules_json_file: Some(rules.to_json()?),
        import_from: snapshot,
        create_time: timestamp(plan.create_time),
        update_time: timestamp(plan.update_time),
    })
}

impl Provider {
    pub fn create_tracking_plan(
        &self,
        decl: &TrackingPlanDeclaration,
    ) -> Result<(TrackingPlanId, TrackingPlanAttributes), CoreError> {
        decl.validate()?;
        let created = self.api.create_tracking_plan(&decl.compose()?)?;
        let id = created.id()?;
        info!("created tracking plan {id}");
        let attrs = self.read_tracking_plan(&id, decl.import_from.as_deref())?;
        Ok((id, attrs))
    }

    pub fn read_tracking_plan(
        &self,
        id: &TrackingPlanId,
        import_from: Option<&str>,
    ) -> Result<TrackingPlanAttributes, CoreError> {
        let plan = self.api.get_tracking_plan(id)?;
        debug!("read tracking plan {id} with {} events", plan.rules.events.len());
        observe_tracking_plan(plan, import_from)
    }

    /// Push the declaration if it differs from `prior`, then re-read.
    pub fn update_tracking_plan(
        &self,
        id: &TrackingPlanId,
        decl: &TrackingPlanDeclaration,
        prior: &TrackingPlanAttributes,
    ) -> Result<TrackingPlanAttributes, CoreError> {
        decl.validate()?;
        if !decl.differs_from(prior)? {
            debug!("tracking plan {id} unchanged");
            return Ok(prior.clone());
        }
        self.api.update_tracking_plan(id, &decl.compose()?)?;
        info!("updated tracking plan {id}");
        self.read_tracking_plan(id, decl.import_from.as_deref())
    }

    pub fn delete_tracking_plan(&self, id: &TrackingPlanId) -> Result<(), CoreError> {
        self.api.delete_tracking_plan(id)?;
        info!("deleted tracking plan {id}");
        Ok(())
    }

    /// Adopt an existing plan. With no libraries known, every remote event
    /// becomes a per-plan event.
    pub fn import_tracking_plan(
        &self,
        id: &str,
    ) -> Result<(TrackingPlanId, TrackingPlanAttributes), CoreError> {
        let id = TrackingPlanId::parse(id)?;
        let attrs = self.read_tracking_plan(&id, None)?;
        info!("imported tracking plan {id}");
        Ok((id, attrs))
    }
}
