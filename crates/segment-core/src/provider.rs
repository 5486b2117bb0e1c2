use crate::cache::ConnectionCache;
use segment_remote::{Backoff, CancelToken, ConfigApi, HttpBackend, ProviderConfig, RetryingApi};
use std::sync::Arc;
use tracing::debug;

/// Entry point for resource operations against one workspace.
///
/// Tracking plan operations live in `tracking_plan.rs`, source operations in
/// `source.rs`. The connection cache is shared by every clone of the provider.
#[derive(Clone)]
pub struct Provider {
    pub(crate) api: Arc<dyn ConfigApi>,
    pub(crate) cache: Arc<ConnectionCache>,
}

impl Provider {
    pub fn new(api: Arc<dyn ConfigApi>, cache: Arc<ConnectionCache>) -> Self {
        Self { api, cache }
    }

    /// Build a provider talking HTTP to the Config API, with reads retried on
    /// rate limiting until `cancel` fires.
    pub fn connect(config: ProviderConfig, cancel: CancelToken) -> Self {
        Self::connect_with_backoff(config, Backoff::default(), cancel)
    }

    pub fn connect_with_backoff(
        config: ProviderConfig,
        backoff: Backoff,
        cancel: CancelToken,
    ) -> Self {
        debug!(
            "connecting to {} for workspace {}",
            config.api_url, config.workspace
        );
        let http: Arc<dyn ConfigApi> = Arc::new(HttpBackend::new(config));
        let api = RetryingApi::new(http, backoff, Arc::new(cancel));
        Self::new(Arc::new(api), Arc::new(ConnectionCache::new()))
    }

    pub fn api(&self) -> &dyn ConfigApi {
        self.api.as_ref()
    }

    pub fn cache(&self) -> &ConnectionCache {
        &self.cache
    }
}
