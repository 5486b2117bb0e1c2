//! Source lifecycle and tracking plan linkage.
//!
//! A source declares at most one tracking plan. Reads confirm the declared
//! plan by listing its connections; when that fails or the source is not
//! among them, the process-wide [`ConnectionCache`](crate::ConnectionCache)
//! answers instead. The schema violation config only exists while a source is
//! linked.

use crate::linkage::{transition, LinkStep, Linkage};
use crate::provider::Provider;
use crate::CoreError;
use segment_schema::{
    schema_config_changed, SchemaViolationConfig, SourceName, TrackingPlanId,
    DEFAULT_SCHEMA_CONFIG,
};
use segment_state::SourceAttributes;
use tracing::{debug, info, warn};

/// Desired state of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDeclaration {
    pub source_name: SourceName,
    pub catalog_name: String,
    pub tracking_plan: Option<TrackingPlanId>,
    /// Only meaningful with a tracking plan. Absent means the defaults.
    pub schema_config: Option<SchemaViolationConfig>,
}

impl SourceDeclaration {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.catalog_name.trim().is_empty() {
            return Err(CoreError::InvalidDeclaration(format!(
                "source {}: catalog_name cannot be empty",
                self.source_name
            )));
        }
        if self.schema_config.is_some() && self.tracking_plan.is_none() {
            return Err(CoreError::InvalidDeclaration(format!(
                "source {}: schema_config requires tracking_plan",
                self.source_name
            )));
        }
        Ok(())
    }

    pub fn linkage(&self) -> Linkage {
        Linkage::from_plan(self.tracking_plan.clone())
    }
}

/// Linkage recorded in prior state.
pub fn recorded_linkage(attrs: &SourceAttributes) -> Result<Linkage, CoreError> {
    match attrs.tracking_plan.as_deref().filter(|p| !p.is_empty()) {
        Some(plan) => Ok(Linkage::Linked(TrackingPlanId::parse(plan)?)),
        None => Ok(Linkage::Unlinked),
    }
}

impl Provider {
    /// Create a source and bring its linkage and schema config in line.
    ///
    /// If anything after the create fails, the source is deleted again. The
    /// returned [`CoreError::PartialCreate`] records whether that cleanup
    /// succeeded.
    pub fn create_source(&self, decl: &SourceDeclaration) -> Result<SourceAttributes, CoreError> {
        decl.validate()?;
        let name = &decl.source_name;
        self.api.create_source(name, &decl.catalog_name)?;
        info!("created source {name}");

        match self.configure_source(decl, &Linkage::Unlinked, None) {
            Ok(attrs) => Ok(attrs),
            Err(cause) => {
                warn!("configuring new source {name} failed, deleting it: {cause}");
                let cleanup = match self.api.delete_source(name) {
                    Ok(()) => {
                        info!("deleted source {name}");
                        None
                    }
                    Err(e) => {
                        warn!("could not delete source {name}: {e}");
                        Some(Box::new(CoreError::from(e)))
                    }
                };
                Err(CoreError::PartialCreate {
                    source_name: name.to_string(),
                    cause: Box::new(cause),
                    cleanup,
                })
            }
        }
    }

    /// Observe a source. `declared_plan` is the plan it is expected to be
    /// linked to, if any.
    pub fn read_source(
        &self,
        name: &SourceName,
        declared_plan: Option<&TrackingPlanId>,
    ) -> Result<SourceAttributes, CoreError> {
        let linkage = self.observe_linkage(name, declared_plan)?;
        self.read_source_with(name, &linkage)
    }

    pub fn update_source(
        &self,
        decl: &SourceDeclaration,
        prior: &SourceAttributes,
    ) -> Result<SourceAttributes, CoreError> {
        decl.validate()?;
        if prior.source_name != decl.source_name.as_str() || prior.catalog_name != decl.catalog_name
        {
            return Err(CoreError::InvalidDeclaration(format!(
                "source {}: changing source_name or catalog_name requires replacement",
                decl.source_name
            )));
        }
        let from = recorded_linkage(prior)?;
        self.configure_source(decl, &from, prior.schema_config.as_ref())
    }

    pub fn delete_source(&self, name: &SourceName) -> Result<(), CoreError> {
        self.api.delete_source(name)?;
        info!("deleted source {name}");
        Ok(())
    }

    /// Adopt an existing source. Its plan, if any, comes from the cache.
    pub fn import_source(&self, name: &str) -> Result<SourceAttributes, CoreError> {
        let name = SourceName::new(name)?;
        let attrs = self.read_source(&name, None)?;
        info!("imported source {name}");
        Ok(attrs)
    }

    fn configure_source(
        &self,
        decl: &SourceDeclaration,
        from: &Linkage,
        observed_config: Option<&SchemaViolationConfig>,
    ) -> Result<SourceAttributes, CoreError> {
        let name = &decl.source_name;
        let to = decl.linkage();
        let mut observed_config = observed_config.cloned();

        for step in transition(from, &to) {
            match step {
                LinkStep::Disconnect(plan) => {
                    self.api.delete_tracking_plan_source_connection(&plan, name)?;
                    info!("disconnected source {name} from tracking plan {plan}");
                }
                LinkStep::Connect(plan) => {
                    self.api.create_tracking_plan_source_connection(&plan, name)?;
                    info!("connected source {name} to tracking plan {plan}");
                }
                LinkStep::ClearSchemaConfig => {
                    observed_config = None;
                    debug!("dropped schema config of unlinked source {name}");
                }
            }
        }

        if to.plan().is_some()
            && schema_config_changed(decl.schema_config.as_ref(), observed_config.as_ref())
        {
            let config = decl.schema_config.clone().unwrap_or(DEFAULT_SCHEMA_CONFIG);
            self.api.update_source_config(name, &config)?;
            info!("updated schema config of source {name}");
        }

        // An unlink just performed is trusted over the cache, which is not
        // updated by our own writes.
        let linkage = match &to {
            Linkage::Unlinked => Linkage::Unlinked,
            Linkage::Linked(plan) => self.observe_linkage(name, Some(plan))?,
        };
        self.read_source_with(name, &linkage)
    }

    fn observe_linkage(
        &self,
        name: &SourceName,
        declared_plan: Option<&TrackingPlanId>,
    ) -> Result<Linkage, CoreError> {
        if let Some(plan) = declared_plan {
            match self.api.list_tracking_plan_sources(plan) {
                Ok(conns) if conns.iter().any(|c| c.source() == name.as_str()) => {
                    debug!("source {name} is connected to tracking plan {plan}");
                    return Ok(Linkage::Linked(plan.clone()));
                }
                Ok(_) => debug!("source {name} is not connected to tracking plan {plan}"),
                Err(e) => warn!("could not confirm tracking plan {plan} of source {name}: {e}"),
            }
        }
        Ok(Linkage::from_plan(
            self.cache.lookup(self.api.as_ref(), name)?,
        ))
    }

    fn read_source_with(
        &self,
        name: &SourceName,
        linkage: &Linkage,
    ) -> Result<SourceAttributes, CoreError> {
        let source = self.api.get_source(name)?;
        let source_name = source.source_name()?;
        let schema_config = match linkage {
            Linkage::Linked(_) => Some(self.api.get_source_config(name)?),
            Linkage::Unlinked => None,
        };
        debug!("read source {name}: {linkage}");
        Ok(SourceAttributes {
            source_name: source_name.to_string(),
            catalog_name: source.catalog_name,
            tracking_plan: linkage.plan().map(ToString::to_string),
            schema_config,
        })
    }
}
