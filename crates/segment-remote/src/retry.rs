//! Exponential backoff for rate-limited Config API calls.
//!
//! The Config API answers `429 Too Many Requests` when a workspace is queried
//! too quickly, which happens routinely while enumerating every tracking plan.
//! [`Backoff::run`] retries an operation on that error only, doubling the pause
//! each time. Pauses go through a [`Pause`] implementation; the default
//! [`CancelToken`] sleeps on a condition variable so a cancellation wakes it
//! early, in which case the pending error is returned.

use crate::models::{NewTrackingPlan, Source, TrackingPlan, TrackingPlanSourceConnection};
use crate::{ConfigApi, RemoteError};
use segment_schema::{SchemaViolationConfig, SourceName, TrackingPlanId};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(75);
pub const DEFAULT_MAX_RETRIES: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial_delay: Duration,
    pub max_retries: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Waits between retries. Returns `false` if the wait was cut short by a
/// cancellation.
pub trait Pause: Send + Sync {
    fn pause(&self, delay: Duration) -> bool;
}

/// Shared cancellation flag, observed only while pausing between retries.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Pause for CancelToken {
    fn pause(&self, delay: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, delay, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        !*guard
    }
}

impl Backoff {
    /// Run `op`, retrying while it fails with [`RemoteError::RateLimited`].
    ///
    /// `op` is invoked at most `max_retries + 1` times. Any other error, or the
    /// last rate-limit error once retries are exhausted, is returned as is.
    pub fn run<T, F>(&self, pause: &dyn Pause, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Result<T, RemoteError>,
    {
        let mut delay = self.initial_delay;
        let mut remaining = self.max_retries;
        loop {
            match op() {
                Err(e) if e.is_rate_limited() && remaining > 0 => {
                    info!(
                        "backoff: rate limited, waiting {}ms before retrying, {remaining} tries left",
                        delay.as_millis()
                    );
                    if !pause.pause(delay) {
                        warn!("backoff cancelled");
                        return Err(e);
                    }
                    delay = delay.saturating_mul(2);
                    remaining -= 1;
                }
                other => return other,
            }
        }
    }
}

/// [`ConfigApi`] decorator applying a [`Backoff`] to read and delete calls.
///
/// Create and update calls are sent once, so a rate-limited write surfaces to
/// the caller instead of being replayed.
pub struct RetryingApi {
    inner: Arc<dyn ConfigApi>,
    backoff: Backoff,
    pause: Arc<dyn Pause>,
}

impl RetryingApi {
    pub fn new(inner: Arc<dyn ConfigApi>, backoff: Backoff, pause: Arc<dyn Pause>) -> Self {
        Self {
            inner,
            backoff,
            pause,
        }
    }

    fn retry<T>(&self, op: impl FnMut() -> Result<T, RemoteError>) -> Result<T, RemoteError> {
        self.backoff.run(self.pause.as_ref(), op)
    }
}

impl ConfigApi for RetryingApi {
    fn create_tracking_plan(&self, plan: &NewTrackingPlan) -> Result<TrackingPlan, RemoteError> {
        self.inner.create_tracking_plan(plan)
    }

    fn get_tracking_plan(&self, id: &TrackingPlanId) -> Result<TrackingPlan, RemoteError> {
        self.retry(|| self.inner.get_tracking_plan(id))
    }

    fn update_tracking_plan(
        &self,
        id: &TrackingPlanId,
        plan: &NewTrackingPlan,
    ) -> Result<TrackingPlan, RemoteError> {
        self.inner.update_tracking_plan(id, plan)
    }

    fn delete_tracking_plan(&self, id: &TrackingPlanId) -> Result<(), RemoteError> {
        self.retry(|| self.inner.delete_tracking_plan(id))
    }

    fn list_tracking_plans(&self) -> Result<Vec<TrackingPlan>, RemoteError> {
        self.retry(|| self.inner.list_tracking_plans())
    }

    fn list_tracking_plan_sources(
        &self,
        id: &TrackingPlanId,
    ) -> Result<Vec<TrackingPlanSourceConnection>, RemoteError> {
        self.retry(|| self.inner.list_tracking_plan_sources(id))
    }

    fn create_tracking_plan_source_connection(
        &self,
        id: &TrackingPlanId,
        source: &SourceName,
    ) -> Result<(), RemoteError> {
        self.inner.create_tracking_plan_source_connection(id, source)
    }

    fn delete_tracking_plan_source_connection(
        &self,
        id: &TrackingPlanId,
        source: &SourceName,
    ) -> Result<(), RemoteError> {
        self.retry(|| self.inner.delete_tracking_plan_source_connection(id, source))
    }

    fn create_source(&self, name: &SourceName, catalog_name: &str) -> Result<Source, RemoteError> {
        self.inner.create_source(name, catalog_name)
    }

    fn get_source(&self, name: &SourceName) -> Result<Source, RemoteError> {
        self.retry(|| self.inner.get_source(name))
    }

    fn delete_source(&self, name: &SourceName) -> Result<(), RemoteError> {
        self.retry(|| self.inner.delete_source(name))
    }

    fn get_source_config(&self, name: &SourceName) -> Result<SchemaViolationConfig, RemoteError> {
        self.retry(|| self.inner.get_source_config(name))
    }

    fn update_source_config(
        &self,
        name: &SourceName,
        config: &SchemaViolationConfig,
    ) -> Result<SchemaViolationConfig, RemoteError> {
        self.inner.update_source_config(name, config)
    }
}
