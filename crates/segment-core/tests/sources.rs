mod common;

use common::MockApi;
use segment_core::{ConnectionCache, CoreError, Provider, Severity, SourceDeclaration};
use segment_remote::{Backoff, ConfigApi, Pause, RetryingApi};
use segment_schema::{
    SchemaViolationConfig, SourceName, TrackViolationBehaviour, TrackingPlanId,
    DEFAULT_SCHEMA_CONFIG,
};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn provider(api: &Arc<MockApi>) -> Provider {
    let api: Arc<dyn ConfigApi> = api.clone();
    Provider::new(api, Arc::new(ConnectionCache::new()))
}

fn name(s: &str) -> SourceName {
    SourceName::new(s).unwrap()
}

fn plan(s: &str) -> TrackingPlanId {
    TrackingPlanId::parse(s).unwrap()
}

fn decl(source: &str, tracking_plan: Option<&str>) -> SourceDeclaration {
    SourceDeclaration {
        source_name: name(source),
        catalog_name: "catalog/sources/javascript".to_owned(),
        tracking_plan: tracking_plan.map(plan),
        schema_config: None,
    }
}

/// Three plans, seven connections; `s` is connected to `rs_xyz`.
fn workspace() -> MockApi {
    MockApi::new()
        .with_plan("rs_abc", &[])
        .with_plan("rs_def", &[])
        .with_plan("rs_xyz", &[])
        .with_source("s")
        .with_source("t")
        .with_connection("rs_abc", "a1")
        .with_connection("rs_abc", "a2")
        .with_connection("rs_def", "d1")
        .with_connection("rs_def", "d2")
        .with_connection("rs_def", "t")
        .with_connection("rs_xyz", "x1")
        .with_connection("rs_xyz", "s")
}

#[derive(Default)]
struct RecordingPause {
    delays: Mutex<Vec<Duration>>,
}

impl Pause for RecordingPause {
    fn pause(&self, delay: Duration) -> bool {
        self.delays.lock().unwrap().push(delay);
        true
    }
}

#[test]
fn import_resolves_plan_through_one_enumeration() {
    let api = Arc::new(workspace());
    let provider = provider(&api);

    let attrs = provider.import_source("s").unwrap();
    assert_eq!(attrs.tracking_plan.as_deref(), Some("rs_xyz"));
    assert_eq!(api.call_count("list_tracking_plans"), 1);
    assert_eq!(api.call_count("list_tracking_plan_sources"), 3);
    assert!(provider.cache().is_populated());
    assert_eq!(provider.cache().len(), 7);

    let other = provider.import_source("t").unwrap();
    assert_eq!(other.tracking_plan.as_deref(), Some("rs_def"));
    assert_eq!(api.call_count("list_tracking_plans"), 1);
    assert_eq!(api.call_count("list_tracking_plan_sources"), 3);
}

#[test]
fn plan_with_unexpected_name_is_skipped_during_enumeration() {
    let api = Arc::new(
        workspace()
            .with_plan("legacy-plan", &[])
            .with_connection("legacy-plan", "old"),
    );
    let provider = provider(&api);

    let attrs = provider.import_source("s").unwrap();
    assert_eq!(attrs.tracking_plan.as_deref(), Some("rs_xyz"));
    assert_eq!(api.call_count("list_tracking_plan_sources"), 3);
    assert_eq!(provider.cache().len(), 7);
}

#[test]
fn concurrent_first_lookups_enumerate_once() {
    let api = Arc::new(workspace());
    *api.list_delay.lock().unwrap() = Some(Duration::from_millis(20));
    let provider = provider(&api);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let provider = provider.clone();
            std::thread::spawn(move || {
                provider
                    .cache()
                    .lookup(provider.api(), &SourceName::new("s").unwrap())
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), "rs_xyz");
    }
    assert_eq!(api.call_count("list_tracking_plans"), 1);
}

#[test]
fn empty_workspace_is_enumerated_once() {
    let api = Arc::new(MockApi::new().with_source("lonely"));
    let provider = provider(&api);

    for _ in 0..3 {
        let attrs = provider.import_source("lonely").unwrap();
        assert!(attrs.tracking_plan.is_none());
    }
    assert_eq!(api.call_count("list_tracking_plans"), 1);
}

#[test]
fn unlinked_read_has_no_schema_config() {
    let api = Arc::new(MockApi::new().with_plan("rs_a", &[]).with_source("web"));
    let provider = provider(&api);

    let attrs = provider.read_source(&name("web"), None).unwrap();
    assert!(attrs.tracking_plan.is_none());
    assert!(attrs.schema_config.is_none());
    assert_eq!(api.call_count("get_source_config"), 0);
}

#[test]
fn confirmed_plan_skips_the_cache() {
    let api = Arc::new(workspace());
    let provider = provider(&api);

    let attrs = provider.read_source(&name("s"), Some(&plan("rs_xyz"))).unwrap();
    assert_eq!(attrs.tracking_plan.as_deref(), Some("rs_xyz"));
    assert!(attrs.schema_config.unwrap().same_settings(&DEFAULT_SCHEMA_CONFIG));
    assert_eq!(api.call_count("list_tracking_plans"), 0);
    assert!(!provider.cache().is_populated());
}

#[test]
fn unconfirmed_plan_falls_back_to_the_cache() {
    let api = Arc::new(workspace());
    let provider = provider(&api);

    // declared rs_abc, actually connected to rs_xyz
    let attrs = provider.read_source(&name("s"), Some(&plan("rs_abc"))).unwrap();
    assert_eq!(attrs.tracking_plan.as_deref(), Some("rs_xyz"));
    assert_eq!(api.call_count("list_tracking_plans"), 1);
}

#[test]
fn missing_declared_plan_falls_back_to_the_cache() {
    let api = Arc::new(workspace());
    let provider = provider(&api);

    let attrs = provider.read_source(&name("s"), Some(&plan("rs_gone"))).unwrap();
    assert_eq!(attrs.tracking_plan.as_deref(), Some("rs_xyz"));
}

#[test]
fn create_links_and_configures() {
    let api = Arc::new(MockApi::new().with_plan("rs_a", &[]));
    let provider = provider(&api);

    let blocking = SchemaViolationConfig {
        common_track_event_on_violations: TrackViolationBehaviour::Block,
        ..DEFAULT_SCHEMA_CONFIG
    };
    let d = SourceDeclaration {
        schema_config: Some(blocking.clone()),
        ..decl("web", Some("rs_a"))
    };
    let attrs = provider.create_source(&d).unwrap();

    assert_eq!(attrs.tracking_plan.as_deref(), Some("rs_a"));
    assert!(attrs.schema_config.unwrap().same_settings(&blocking));
    assert_eq!(api.plans_of("web"), ["rs_a"]);
    assert_eq!(api.call_count("update_source_config"), 1);
}

#[test]
fn create_with_default_config_sends_no_config() {
    let api = Arc::new(MockApi::new().with_plan("rs_a", &[]));
    let provider = provider(&api);

    provider.create_source(&decl("web", Some("rs_a"))).unwrap();
    assert_eq!(api.call_count("update_source_config"), 0);
}

#[test]
fn failed_link_rolls_back_the_new_source() {
    let api = Arc::new(MockApi::new());
    let provider = provider(&api);

    let err = provider.create_source(&decl("web", Some("rs_fail"))).unwrap_err();
    assert!(matches!(
        &err,
        CoreError::PartialCreate { cleanup: None, .. }
    ));
    assert!(!api.has_source("web"));
    assert_eq!(api.call_count("delete_source"), 1);

    let diags = err.diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Error);
}

#[test]
fn failed_rollback_reports_lingering_source() {
    let api = Arc::new(MockApi::new());
    api.fail_delete_source.store(true, Ordering::SeqCst);
    let provider = provider(&api);

    let err = provider.create_source(&decl("web", Some("rs_fail"))).unwrap_err();
    assert!(api.has_source("web"));

    let diags = err.diagnostics();
    assert_eq!(diags.len(), 2);
    assert_eq!(diags[0].severity, Severity::Error);
    assert_eq!(diags[1].severity, Severity::Warning);
    assert_eq!(diags[1].summary, "Lingering Segment resources");
    assert!(diags[1]
        .detail
        .starts_with("Source web could not be cleaned up because of"));
}

#[test]
fn invalid_declaration_creates_nothing() {
    let api = Arc::new(MockApi::new());
    let provider = provider(&api);

    let d = SourceDeclaration {
        schema_config: Some(DEFAULT_SCHEMA_CONFIG),
        ..decl("web", None)
    };
    assert!(matches!(
        provider.create_source(&d),
        Err(CoreError::InvalidDeclaration(_))
    ));
    assert_eq!(api.call_count("create_source"), 0);
}

#[test]
fn unlinking_leaves_no_connection_and_no_config() {
    let api = Arc::new(MockApi::new().with_plan("rs_a", &[]).with_plan("rs_b", &[]));
    let provider = provider(&api);

    let linked = provider.create_source(&decl("web", Some("rs_a"))).unwrap();
    // populate the cache while the source is still linked
    provider.import_source("web").unwrap();

    let unlinked = provider.update_source(&decl("web", None), &linked).unwrap();
    assert!(unlinked.tracking_plan.is_none());
    assert!(unlinked.schema_config.is_none());
    assert!(api.plans_of("web").is_empty());

    let relinked = provider
        .update_source(&decl("web", Some("rs_b")), &unlinked)
        .unwrap();
    assert_eq!(relinked.tracking_plan.as_deref(), Some("rs_b"));
    assert_eq!(api.plans_of("web"), ["rs_b"]);
}

#[test]
fn switching_plans_disconnects_first() {
    let api = Arc::new(MockApi::new().with_plan("rs_a", &[]).with_plan("rs_b", &[]));
    let provider = provider(&api);

    let linked = provider.create_source(&decl("web", Some("rs_a"))).unwrap();
    let moved = provider
        .update_source(&decl("web", Some("rs_b")), &linked)
        .unwrap();
    assert_eq!(moved.tracking_plan.as_deref(), Some("rs_b"));
    assert_eq!(api.plans_of("web"), ["rs_b"]);

    let calls = api.calls.lock().unwrap();
    let disconnect = calls
        .iter()
        .position(|c| c == "delete_tracking_plan_source_connection")
        .unwrap();
    let reconnect = calls
        .iter()
        .rposition(|c| c == "create_tracking_plan_source_connection")
        .unwrap();
    assert!(disconnect < reconnect);
}

#[test]
fn identity_change_is_refused_by_update() {
    let api = Arc::new(MockApi::new());
    let provider = provider(&api);

    let created = provider.create_source(&decl("web", None)).unwrap();
    let mut moved = decl("web", None);
    moved.catalog_name = "catalog/sources/ios".to_owned();
    assert!(matches!(
        provider.update_source(&moved, &created),
        Err(CoreError::InvalidDeclaration(_))
    ));
}

#[test]
fn delete_removes_the_source() {
    let api = Arc::new(MockApi::new().with_source("web"));
    let provider = provider(&api);

    provider.delete_source(&name("web")).unwrap();
    assert!(!api.has_source("web"));
    assert!(matches!(
        provider.delete_source(&name("web")),
        Err(CoreError::Remote(e)) if e.is_not_found()
    ));
}

#[test]
fn enumeration_retries_rate_limits_but_writes_do_not() {
    let mock = Arc::new(workspace());
    mock.rate_limit_list_plans.store(2, Ordering::SeqCst);
    mock.rate_limit_create_source.store(1, Ordering::SeqCst);

    let pause = Arc::new(RecordingPause::default());
    let inner: Arc<dyn ConfigApi> = mock.clone();
    let retrying = RetryingApi::new(inner, Backoff::default(), pause.clone());
    let provider = Provider::new(Arc::new(retrying), Arc::new(ConnectionCache::new()));

    let attrs = provider.import_source("s").unwrap();
    assert_eq!(attrs.tracking_plan.as_deref(), Some("rs_xyz"));
    assert_eq!(mock.call_count("list_tracking_plans"), 3);
    assert_eq!(
        *pause.delays.lock().unwrap(),
        [Duration::from_millis(75), Duration::from_millis(150)]
    );

    let err = provider.create_source(&decl("new", None)).unwrap_err();
    assert!(matches!(err, CoreError::Remote(e) if e.is_rate_limited()));
    assert_eq!(mock.call_count("create_source"), 1);
}
