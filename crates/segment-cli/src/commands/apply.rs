use super::{
    attributes, check_interrupted, colorize_action, finish, json_pretty, open_state, progress,
    report, save_state, tracking_plan_id, Globals, EXIT_SUCCESS,
};
use crate::declaration::{source_address, tracking_plan_address, Declarations, PlanRef};
use segment_core::{plan_source, plan_tracking_plan, Action, Provider, SourceDeclaration};
use segment_schema::{SourceName, TrackingPlanId};
use segment_state::{ResourceKind, ResourceState, SourceAttributes, StateFile, StateStore};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Serialize)]
struct Change {
    address: String,
    action: Action,
}

struct Run<'a> {
    provider: &'a Provider,
    store: &'a StateStore,
    state: StateFile,
    json: bool,
    dry_run: bool,
    changes: Vec<Change>,
}

pub fn run(
    provider: &Provider,
    globals: &Globals,
    declaration: &Path,
    dry_run: bool,
) -> Result<u8, String> {
    let decls = Declarations::load(declaration)?;
    let (store, _lock, state) = open_state(globals)?;
    let mut run = Run {
        provider,
        store: &store,
        state,
        json: globals.json,
        dry_run,
        changes: Vec::new(),
    };

    let result = run
        .apply_tracking_plans(&decls)
        .and_then(|()| run.apply_sources(&decls))
        .and_then(|()| run.delete_undeclared(&decls));
    print_changes(&run.changes, dry_run, globals.json)?;
    result?;
    Ok(EXIT_SUCCESS)
}

impl Run<'_> {
    fn record(&mut self, address: &str, action: Action) {
        debug!("{address}: {action}");
        self.changes.push(Change {
            address: address.to_owned(),
            action,
        });
    }

    fn put(&mut self, address: &str, resource: ResourceState) -> Result<(), String> {
        self.state.put(address, resource);
        save_state(self.store, &self.state)
    }

    fn forget(&mut self, address: &str) -> Result<(), String> {
        self.state.remove(address);
        save_state(self.store, &self.state)
    }

    fn apply_tracking_plans(&mut self, decls: &Declarations) -> Result<(), String> {
        for (key, decl) in &decls.tracking_plans {
            let address = tracking_plan_address(key);
            let prior = match self
                .state
                .get(&address, ResourceKind::TrackingPlan)
                .map_err(|e| format!("state error: {e}"))?
            {
                Some(r) => Some((tracking_plan_id(&address, r)?, attributes(&address, r)?)),
                None => None,
            };
            let action = plan_tracking_plan(decl, prior.as_ref().map(|(_, a)| a))
                .map_err(|e| format!("declaration error: {address}: {e}"))?;
            self.record(&address, action);
            if self.dry_run || action == Action::Noop {
                continue;
            }
            check_interrupted()?;

            let pb = progress(self.json, &format!("{address}: {action}"));
            let result = match &prior {
                Some((id, attrs)) => self
                    .provider
                    .update_tracking_plan(id, decl, attrs)
                    .map(|a| (id.clone(), a)),
                None => self.provider.create_tracking_plan(decl),
            };
            let (id, attrs) = result.map_err(|e| {
                finish(pb.as_ref(), false, &address);
                format!("{address}: {}", report(&e))
            })?;
            finish(pb.as_ref(), true, &format!("{address} ({id})"));
            let resource = ResourceState::new(ResourceKind::TrackingPlan, Some(id.to_string()), &attrs)
                .map_err(|e| format!("state error: {e}"))?;
            self.put(&address, resource)?;
        }
        Ok(())
    }

    /// Resolve a plan reference. `Ok(None)` means the plan does not exist yet,
    /// which only happens during a dry run.
    fn resolve_plan(&self, plan: Option<&PlanRef>) -> Result<Option<Option<TrackingPlanId>>, String> {
        match plan {
            None => Ok(Some(None)),
            Some(PlanRef::Id(id)) => Ok(Some(Some(id.clone()))),
            Some(PlanRef::Key(key)) => {
                let address = tracking_plan_address(key);
                match self
                    .state
                    .get(&address, ResourceKind::TrackingPlan)
                    .map_err(|e| format!("state error: {e}"))?
                {
                    Some(r) => Ok(Some(Some(tracking_plan_id(&address, r)?))),
                    None if self.dry_run => Ok(None),
                    None => Err(format!("state error: {address} was not created")),
                }
            }
        }
    }

    fn apply_sources(&mut self, decls: &Declarations) -> Result<(), String> {
        for (key, spec) in &decls.sources {
            let address = source_address(key);
            let prior: Option<SourceAttributes> = match self
                .state
                .get(&address, ResourceKind::Source)
                .map_err(|e| format!("state error: {e}"))?
            {
                Some(r) => Some(attributes(&address, r)?),
                None => None,
            };

            let Some(tracking_plan) = self.resolve_plan(spec.tracking_plan.as_ref())? else {
                let action = if prior.is_some() {
                    Action::Update
                } else {
                    Action::Create
                };
                self.record(&address, action);
                continue;
            };
            let decl = SourceDeclaration {
                source_name: spec.source_name.clone(),
                catalog_name: spec.catalog_name.clone(),
                tracking_plan,
                schema_config: spec.schema_config.clone(),
            };
            let action = plan_source(&decl, prior.as_ref());
            self.record(&address, action);
            if self.dry_run || action == Action::Noop {
                continue;
            }
            check_interrupted()?;

            let pb = progress(self.json, &format!("{address}: {action}"));
            let result = match (action, &prior) {
                (Action::Update, Some(prior)) => self.provider.update_source(&decl, prior),
                (Action::Replace, Some(prior)) => {
                    let old = SourceName::new(&prior.source_name)
                        .map_err(|e| format!("state error: {address}: {e}"))?;
                    if let Err(e) = self.provider.delete_source(&old) {
                        finish(pb.as_ref(), false, &address);
                        return Err(format!("{address}: {}", report(&e)));
                    }
                    self.forget(&address)?;
                    self.provider.create_source(&decl)
                }
                _ => self.provider.create_source(&decl),
            };
            let attrs = result.map_err(|e| {
                finish(pb.as_ref(), false, &address);
                format!("{address}: {}", report(&e))
            })?;
            finish(pb.as_ref(), true, &address);
            let resource = ResourceState::new(
                ResourceKind::Source,
                Some(attrs.source_name.clone()),
                &attrs,
            )
            .map_err(|e| format!("state error: {e}"))?;
            self.put(&address, resource)?;
        }
        Ok(())
    }

    /// Delete resources recorded in state but no longer declared, sources
    /// before tracking plans.
    fn delete_undeclared(&mut self, decls: &Declarations) -> Result<(), String> {
        let declared: BTreeSet<String> = decls
            .sources
            .keys()
            .map(|k| source_address(k))
            .chain(decls.tracking_plans.keys().map(|k| tracking_plan_address(k)))
            .collect();

        for kind in [ResourceKind::Source, ResourceKind::TrackingPlan] {
            let stale: Vec<(String, ResourceState)> = self
                .state
                .of_kind(kind)
                .filter(|(address, _)| !declared.contains(*address))
                .map(|(a, r)| (a.clone(), r.clone()))
                .collect();
            for (address, resource) in stale {
                self.record(&address, Action::Delete);
                if self.dry_run {
                    continue;
                }
                check_interrupted()?;
                let pb = progress(self.json, &format!("{address}: delete"));
                delete_resource(self.provider, &address, &resource).map_err(|e| {
                    finish(pb.as_ref(), false, &address);
                    e
                })?;
                finish(pb.as_ref(), true, &address);
                self.forget(&address)?;
            }
        }
        Ok(())
    }
}

/// Delete the remote resource behind a state entry.
pub fn delete_resource(
    provider: &Provider,
    address: &str,
    resource: &ResourceState,
) -> Result<(), String> {
    let result = match resource.kind {
        ResourceKind::TrackingPlan => {
            let id = tracking_plan_id(address, resource)?;
            provider.delete_tracking_plan(&id)
        }
        ResourceKind::Source => {
            let attrs: SourceAttributes = attributes(address, resource)?;
            let name = SourceName::new(&attrs.source_name)
                .map_err(|e| format!("state error: {address}: {e}"))?;
            provider.delete_source(&name)
        }
    };
    result.map_err(|e| format!("{address}: {}", report(&e)))
}

fn print_changes(changes: &[Change], dry_run: bool, json: bool) -> Result<(), String> {
    if json {
        let payload = serde_json::json!({
            "dry_run": dry_run,
            "changes": changes,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(());
    }
    for change in changes.iter().filter(|c| c.action != Action::Noop) {
        println!("{}  {}", colorize_action(change.action), change.address);
    }
    let pending = changes.iter().filter(|c| c.action != Action::Noop).count();
    let verb = if dry_run { "planned" } else { "applied" };
    println!(
        "{verb} {pending} change(s), {} resource(s) unchanged",
        changes.len() - pending
    );
    Ok(())
}
