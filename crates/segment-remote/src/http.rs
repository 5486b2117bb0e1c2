use crate::models::{NewTrackingPlan, Source, TrackingPlan, TrackingPlanSourceConnection};
use crate::{ConfigApi, ProviderConfig, RemoteError};
use segment_schema::{source_path, SchemaViolationConfig, SourceName, TrackingPlanId};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Read;

/// Config API client over blocking HTTP.
///
/// Paths are relative to `api_url` and scoped to the configured workspace:
/// - `POST   /workspaces/{w}/tracking-plans`
/// - `GET    /workspaces/{w}/tracking-plans[/{id}]`
/// - `PUT    /workspaces/{w}/tracking-plans/{id}`
/// - `DELETE /workspaces/{w}/tracking-plans/{id}`
/// - `GET    /workspaces/{w}/tracking-plans/{id}/source-connections`
/// - `POST   /workspaces/{w}/tracking-plans/{id}/source-connections`
/// - `DELETE /workspaces/{w}/tracking-plans/{id}/source-connections/{source}`
/// - `POST   /workspaces/{w}/sources`, `GET|DELETE /workspaces/{w}/sources/{name}`
/// - `GET|PATCH /workspaces/{w}/sources/{name}/schema-config`
pub struct HttpBackend {
    config: ProviderConfig,
    agent: ureq::Agent,
}

#[derive(Clone, Copy)]
enum Verb {
    Post,
    Put,
    Patch,
}

impl Verb {
    fn as_str(self) -> &'static str {
        match self {
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
        }
    }
}

#[derive(Deserialize)]
struct TrackingPlanList {
    #[serde(default)]
    tracking_plans: Vec<TrackingPlan>,
}

#[derive(Deserialize)]
struct ConnectionList {
    #[serde(default)]
    connections: Vec<TrackingPlanSourceConnection>,
}

fn map_error(e: ureq::Error, method: &str, url: &str) -> RemoteError {
    match e {
        ureq::Error::StatusCode(404) => RemoteError::NotFound(url.to_owned()),
        ureq::Error::StatusCode(429) => RemoteError::RateLimited(format!("{method} {url}")),
        ureq::Error::StatusCode(code) => {
            RemoteError::Http(format!("HTTP {code} for {method} {url}"))
        }
        e => RemoteError::Http(e.to_string()),
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, RemoteError> {
    serde_json::from_slice(body).map_err(|e| RemoteError::Serialization(e.to_string()))
}

impl HttpBackend {
    pub fn new(config: ProviderConfig) -> Self {
        let agent = ureq::Agent::new_with_defaults();
        Self { config, agent }
    }

    pub fn workspace(&self) -> &str {
        &self.config.workspace
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/workspaces/{}/{path}",
            self.config.api_url, self.config.workspace
        )
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.config.access_token)
    }

    fn finish(
        method: &str,
        url: &str,
        result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
    ) -> Result<Vec<u8>, RemoteError> {
        // the agent reports 4xx and 5xx as `Error::StatusCode`
        let resp = result.map_err(|e| map_error(e, method, url))?;
        let mut reader = resp.into_body().into_reader();
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .map_err(|e| RemoteError::Http(e.to_string()))?;
        Ok(body)
    }

    fn do_get(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        tracing::debug!("GET {url}");
        let req = self
            .agent
            .get(url)
            .header("Accept", "application/json")
            .header("Authorization", &self.auth());
        Self::finish("GET", url, req.call())
    }

    fn do_delete(&self, url: &str) -> Result<(), RemoteError> {
        tracing::debug!("DELETE {url}");
        let req = self
            .agent
            .delete(url)
            .header("Authorization", &self.auth());
        Self::finish("DELETE", url, req.call())?;
        Ok(())
    }

    fn do_send(&self, verb: Verb, url: &str, body: &Value) -> Result<Vec<u8>, RemoteError> {
        let data =
            serde_json::to_vec(body).map_err(|e| RemoteError::Serialization(e.to_string()))?;
        tracing::debug!("{} {url} ({} bytes)", verb.as_str(), data.len());
        let req = match verb {
            Verb::Post => self.agent.post(url),
            Verb::Put => self.agent.put(url),
            Verb::Patch => self.agent.patch(url),
        };
        let req = req
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("Authorization", &self.auth());
        Self::finish(verb.as_str(), url, req.send(&data[..]))
    }

    fn plan_body(plan: &NewTrackingPlan) -> Result<Value, RemoteError> {
        serde_json::to_value(plan).map_err(|e| RemoteError::Serialization(e.to_string()))
    }
}

impl ConfigApi for HttpBackend {
    fn create_tracking_plan(&self, plan: &NewTrackingPlan) -> Result<TrackingPlan, RemoteError> {
        let url = self.url("tracking-plans");
        let plan = Self::plan_body(plan)?;
        let body = json!({ "tracking_plan": plan });
        decode(&self.do_send(Verb::Post, &url, &body)?)
    }

    fn get_tracking_plan(&self, id: &TrackingPlanId) -> Result<TrackingPlan, RemoteError> {
        let url = self.url(&format!("tracking-plans/{id}"));
        decode(&self.do_get(&url)?)
    }

    fn update_tracking_plan(
        &self,
        id: &TrackingPlanId,
        plan: &NewTrackingPlan,
    ) -> Result<TrackingPlan, RemoteError> {
        let url = self.url(&format!("tracking-plans/{id}"));
        let plan = Self::plan_body(plan)?;
        let body = json!({
            "update_mask": { "paths": ["tracking_plan.display_name", "tracking_plan.rules"] },
            "tracking_plan": plan,
        });
        decode(&self.do_send(Verb::Put, &url, &body)?)
    }

    fn delete_tracking_plan(&self, id: &TrackingPlanId) -> Result<(), RemoteError> {
        self.do_delete(&self.url(&format!("tracking-plans/{id}")))
    }

    fn list_tracking_plans(&self) -> Result<Vec<TrackingPlan>, RemoteError> {
        let list: TrackingPlanList = decode(&self.do_get(&self.url("tracking-plans"))?)?;
        Ok(list.tracking_plans)
    }

    fn list_tracking_plan_sources(
        &self,
        id: &TrackingPlanId,
    ) -> Result<Vec<TrackingPlanSourceConnection>, RemoteError> {
        let url = self.url(&format!("tracking-plans/{id}/source-connections"));
        let list: ConnectionList = decode(&self.do_get(&url)?)?;
        Ok(list.connections)
    }

    fn create_tracking_plan_source_connection(
        &self,
        id: &TrackingPlanId,
        source: &SourceName,
    ) -> Result<(), RemoteError> {
        let url = self.url(&format!("tracking-plans/{id}/source-connections"));
        let body = json!({ "source_name": source_path(self.workspace(), source) });
        self.do_send(Verb::Post, &url, &body)?;
        Ok(())
    }

    fn delete_tracking_plan_source_connection(
        &self,
        id: &TrackingPlanId,
        source: &SourceName,
    ) -> Result<(), RemoteError> {
        self.do_delete(&self.url(&format!(
            "tracking-plans/{id}/source-connections/{source}"
        )))
    }

    fn create_source(&self, name: &SourceName, catalog_name: &str) -> Result<Source, RemoteError> {
        let url = self.url("sources");
        let body = json!({
            "source": {
                "name": source_path(self.workspace(), name),
                "catalog_name": catalog_name,
            }
        });
        decode(&self.do_send(Verb::Post, &url, &body)?)
    }

    fn get_source(&self, name: &SourceName) -> Result<Source, RemoteError> {
        decode(&self.do_get(&self.url(&format!("sources/{name}")))?)
    }

    fn delete_source(&self, name: &SourceName) -> Result<(), RemoteError> {
        self.do_delete(&self.url(&format!("sources/{name}")))
    }

    fn get_source_config(&self, name: &SourceName) -> Result<SchemaViolationConfig, RemoteError> {
        decode(&self.do_get(&self.url(&format!("sources/{name}/schema-config")))?)
    }

    fn update_source_config(
        &self,
        name: &SourceName,
        config: &SchemaViolationConfig,
    ) -> Result<SchemaViolationConfig, RemoteError> {
        let url = self.url(&format!("sources/{name}/schema-config"));
        let settings = SchemaViolationConfig {
            name: None,
            parent: None,
            ..config.clone()
        };
        let body = json!({ "source_config": settings });
        decode(&self.do_send(Verb::Patch, &url, &body)?)
    }
}
