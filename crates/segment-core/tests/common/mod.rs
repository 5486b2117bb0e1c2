//! In-memory Config API for orchestration tests.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use segment_remote::{
    ConfigApi, NewTrackingPlan, RemoteError, Source, TrackingPlan, TrackingPlanSourceConnection,
};
use segment_schema::{
    source_path, tracking_plan_path, RuleSet, SchemaViolationConfig, SourceName, TrackingPlanId,
    DEFAULT_SCHEMA_CONFIG,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const WORKSPACE: &str = "acme";

#[derive(Default)]
pub struct MockApi {
    pub plans: Mutex<BTreeMap<String, TrackingPlan>>,
    /// `(plan id, source name)` pairs.
    pub connections: Mutex<Vec<(String, String)>>,
    pub sources: Mutex<BTreeMap<String, Source>>,
    pub configs: Mutex<BTreeMap<String, SchemaViolationConfig>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_delete_source: AtomicBool,
    /// Number of `list_tracking_plans` calls answered with 429 before success.
    pub rate_limit_list_plans: AtomicU32,
    pub rate_limit_create_source: AtomicU32,
    pub list_delay: Mutex<Option<Duration>>,
    next_id: AtomicU32,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(self, id: &str, events: &[&str]) -> Self {
        let rules = RuleSet {
            events: events.iter().map(|n| segment_schema::Event::named(*n)).collect(),
            ..RuleSet::default()
        };
        self.plans.lock().unwrap().insert(
            id.to_owned(),
            TrackingPlan {
                name: tracking_plan_path(WORKSPACE, id),
                display_name: id.to_owned(),
                rules,
                create_time: Some(fixed_time()),
                update_time: None,
            },
        );
        self
    }

    pub fn with_source(self, name: &str) -> Self {
        self.sources.lock().unwrap().insert(name.to_owned(), source(name));
        self
    }

    pub fn with_connection(self, plan: &str, source: &str) -> Self {
        self.connections
            .lock()
            .unwrap()
            .push((plan.to_owned(), source.to_owned()));
        self
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == op).count()
    }

    pub fn plans_of(&self, source: &str) -> Vec<String> {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| s == source)
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn has_source(&self, name: &str) -> bool {
        self.sources.lock().unwrap().contains_key(name)
    }

    fn record(&self, op: &str) {
        self.calls.lock().unwrap().push(op.to_owned());
    }

    fn take_rate_limit(counter: &AtomicU32, op: &str) -> Result<(), RemoteError> {
        let left = counter.load(Ordering::SeqCst);
        if left > 0 {
            counter.store(left - 1, Ordering::SeqCst);
            return Err(RemoteError::RateLimited(op.to_owned()));
        }
        Ok(())
    }
}

pub fn fixed_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
}

fn source(name: &str) -> Source {
    Source {
        name: source_path(WORKSPACE, name),
        catalog_name: "catalog/sources/javascript".to_owned(),
        parent: Some(format!("workspaces/{WORKSPACE}")),
        create_time: Some(fixed_time()),
    }
}

fn not_found(what: impl Into<String>) -> RemoteError {
    RemoteError::NotFound(what.into())
}

impl ConfigApi for MockApi {
    fn create_tracking_plan(&self, plan: &NewTrackingPlan) -> Result<TrackingPlan, RemoteError> {
        self.record("create_tracking_plan");
        let id = format!("rs_{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let created = TrackingPlan {
            name: tracking_plan_path(WORKSPACE, &id),
            display_name: plan.display_name.clone(),
            rules: plan.rules.clone(),
            create_time: Some(fixed_time()),
            update_time: Some(fixed_time()),
        };
        self.plans.lock().unwrap().insert(id, created.clone());
        Ok(created)
    }

    fn get_tracking_plan(&self, id: &TrackingPlanId) -> Result<TrackingPlan, RemoteError> {
        self.record("get_tracking_plan");
        self.plans
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| not_found(id.as_str()))
    }

    fn update_tracking_plan(
        &self,
        id: &TrackingPlanId,
        plan: &NewTrackingPlan,
    ) -> Result<TrackingPlan, RemoteError> {
        self.record("update_tracking_plan");
        let mut plans = self.plans.lock().unwrap();
        let existing = plans.get_mut(id.as_str()).ok_or_else(|| not_found(id.as_str()))?;
        existing.display_name = plan.display_name.clone();
        existing.rules = plan.rules.clone();
        Ok(existing.clone())
    }

    fn delete_tracking_plan(&self, id: &TrackingPlanId) -> Result<(), RemoteError> {
        self.record("delete_tracking_plan");
        self.plans
            .lock()
            .unwrap()
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| not_found(id.as_str()))
    }

    fn list_tracking_plans(&self) -> Result<Vec<TrackingPlan>, RemoteError> {
        self.record("list_tracking_plans");
        Self::take_rate_limit(&self.rate_limit_list_plans, "GET /tracking-plans")?;
        if let Some(delay) = *self.list_delay.lock().unwrap() {
            std::thread::sleep(delay);
        }
        Ok(self.plans.lock().unwrap().values().cloned().collect())
    }

    fn list_tracking_plan_sources(
        &self,
        id: &TrackingPlanId,
    ) -> Result<Vec<TrackingPlanSourceConnection>, RemoteError> {
        self.record("list_tracking_plan_sources");
        if !self.plans.lock().unwrap().contains_key(id.as_str()) {
            return Err(not_found(id.as_str()));
        }
        Ok(self
            .connections
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == id.as_str())
            .map(|(p, s)| TrackingPlanSourceConnection {
                source_name: source_path(WORKSPACE, s),
                tracking_plan_id: p.clone(),
            })
            .collect())
    }

    fn create_tracking_plan_source_connection(
        &self,
        id: &TrackingPlanId,
        source: &SourceName,
    ) -> Result<(), RemoteError> {
        self.record("create_tracking_plan_source_connection");
        if !self.plans.lock().unwrap().contains_key(id.as_str()) {
            return Err(not_found(id.as_str()));
        }
        self.connections
            .lock()
            .unwrap()
            .push((id.to_string(), source.to_string()));
        Ok(())
    }

    fn delete_tracking_plan_source_connection(
        &self,
        id: &TrackingPlanId,
        source: &SourceName,
    ) -> Result<(), RemoteError> {
        self.record("delete_tracking_plan_source_connection");
        let mut conns = self.connections.lock().unwrap();
        let before = conns.len();
        conns.retain(|(p, s)| !(p == id.as_str() && s == source.as_str()));
        if conns.len() == before {
            return Err(not_found(format!("{id}/{source}")));
        }
        Ok(())
    }

    fn create_source(&self, name: &SourceName, catalog_name: &str) -> Result<Source, RemoteError> {
        self.record("create_source");
        Self::take_rate_limit(&self.rate_limit_create_source, "POST /sources")?;
        let created = Source {
            catalog_name: catalog_name.to_owned(),
            ..source(name)
        };
        self.sources
            .lock()
            .unwrap()
            .insert(name.to_string(), created.clone());
        Ok(created)
    }

    fn get_source(&self, name: &SourceName) -> Result<Source, RemoteError> {
        self.record("get_source");
        self.sources
            .lock()
            .unwrap()
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| not_found(name.as_str()))
    }

    fn delete_source(&self, name: &SourceName) -> Result<(), RemoteError> {
        self.record("delete_source");
        if self.fail_delete_source.load(Ordering::SeqCst) {
            return Err(RemoteError::Http("HTTP 500 Internal Server Error".to_owned()));
        }
        self.sources
            .lock()
            .unwrap()
            .remove(name.as_str())
            .map(|_| ())
            .ok_or_else(|| not_found(name.as_str()))
    }

    fn get_source_config(&self, name: &SourceName) -> Result<SchemaViolationConfig, RemoteError> {
        self.record("get_source_config");
        if !self.has_source(name.as_str()) {
            return Err(not_found(name.as_str()));
        }
        let config = self
            .configs
            .lock()
            .unwrap()
            .get(name.as_str())
            .cloned()
            .unwrap_or(DEFAULT_SCHEMA_CONFIG);
        Ok(SchemaViolationConfig {
            name: Some(format!("{}/schema-config", source_path(WORKSPACE, name))),
            parent: Some(source_path(WORKSPACE, name)),
            ..config
        })
    }

    fn update_source_config(
        &self,
        name: &SourceName,
        config: &SchemaViolationConfig,
    ) -> Result<SchemaViolationConfig, RemoteError> {
        self.record("update_source_config");
        self.configs
            .lock()
            .unwrap()
            .insert(name.to_string(), config.clone());
        Ok(config.clone())
    }
}
