//! Segment Config API access for the provider.
//!
//! This crate defines the [`ConfigApi`] trait the orchestrators talk to, the
//! wire models exchanged with the API, a blocking `ureq` implementation
//! ([`HttpBackend`]), provider configuration resolved from file, environment and
//! explicit values, and the exponential backoff applied to rate-limited calls.

pub mod config;
pub mod http;
pub mod models;
pub mod retry;

pub use config::{ConfigOverrides, ProviderConfig, ProviderConfigFile, DEFAULT_API_URL};
pub use http::HttpBackend;
pub use models::{NewTrackingPlan, Source, TrackingPlan, TrackingPlanSourceConnection};
pub use retry::{Backoff, CancelToken, Pause, RetryingApi};

use segment_schema::{SchemaViolationConfig, SourceName, TrackingPlanId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("provider config error: {0}")]
    Config(String),
}

impl RemoteError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RemoteError::RateLimited(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

/// Operations of the Segment Config API used by the provider.
///
/// Identifiers are short names; implementations expand them to full resource
/// paths within their workspace.
pub trait ConfigApi: Send + Sync {
    fn create_tracking_plan(&self, plan: &NewTrackingPlan) -> Result<TrackingPlan, RemoteError>;

    fn get_tracking_plan(&self, id: &TrackingPlanId) -> Result<TrackingPlan, RemoteError>;

    fn update_tracking_plan(
        &self,
        id: &TrackingPlanId,
        plan: &NewTrackingPlan,
    ) -> Result<TrackingPlan, RemoteError>;

    fn delete_tracking_plan(&self, id: &TrackingPlanId) -> Result<(), RemoteError>;

    fn list_tracking_plans(&self) -> Result<Vec<TrackingPlan>, RemoteError>;

    /// List the sources connected to a plan. There is no reverse lookup.
    fn list_tracking_plan_sources(
        &self,
        id: &TrackingPlanId,
    ) -> Result<Vec<TrackingPlanSourceConnection>, RemoteError>;

    fn create_tracking_plan_source_connection(
        &self,
        id: &TrackingPlanId,
        source: &SourceName,
    ) -> Result<(), RemoteError>;

    fn delete_tracking_plan_source_connection(
        &self,
        id: &TrackingPlanId,
        source: &SourceName,
    ) -> Result<(), RemoteError>;

    fn create_source(&self, name: &SourceName, catalog_name: &str) -> Result<Source, RemoteError>;

    fn get_source(&self, name: &SourceName) -> Result<Source, RemoteError>;

    fn delete_source(&self, name: &SourceName) -> Result<(), RemoteError>;

    fn get_source_config(&self, name: &SourceName) -> Result<SchemaViolationConfig, RemoteError>;

    fn update_source_config(
        &self,
        name: &SourceName,
        config: &SchemaViolationConfig,
    ) -> Result<SchemaViolationConfig, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_classified() {
        assert!(RemoteError::RateLimited("GET /x".to_owned()).is_rate_limited());
        assert!(!RemoteError::Http("HTTP 500".to_owned()).is_rate_limited());
        assert!(RemoteError::NotFound("x".to_owned()).is_not_found());
    }

    #[test]
    fn remote_error_display() {
        let e = RemoteError::Config("access token and workspace values cannot be empty".to_owned());
        assert!(e.to_string().contains("cannot be empty"));
    }
}
