mod common;

use common::MockApi;
use segment_core::{
    libraries_document, plan_tracking_plan, Action, ConnectionCache, CoreError, Provider,
    TrackingPlanDeclaration,
};
use segment_remote::ConfigApi;
use segment_schema::{json_equivalent, EventLibrary, TrackingPlanId};
use std::sync::Arc;

fn provider(api: &Arc<MockApi>) -> Provider {
    let api: Arc<dyn ConfigApi> = api.clone();
    Provider::new(api, Arc::new(ConnectionCache::new()))
}

fn remote_event_names(api: &MockApi, id: &str) -> Vec<String> {
    api.plans.lock().unwrap()[id]
        .rules
        .events
        .iter()
        .map(|e| e.name.clone())
        .collect()
}

fn web_plan() -> TrackingPlanDeclaration {
    TrackingPlanDeclaration {
        display_name: "Web".to_owned(),
        rules_json_file: Some(
            r#"{"events":[{"name":"B","description":"override"},{"name":"C"}]}"#.to_owned(),
        ),
        import_from: Some(r#"[{"events":[{"name":"A"},{"name":"B"}]}]"#.to_owned()),
    }
}

#[test]
fn create_composes_libraries_and_splits_them_back_on_read() {
    let api = Arc::new(MockApi::new());
    let provider = provider(&api);

    let (id, attrs) = provider.create_tracking_plan(&web_plan()).unwrap();
    assert_eq!(id, "rs_1");
    assert_eq!(remote_event_names(&api, "rs_1"), ["A", "B", "C"]);
    assert_eq!(
        api.plans.lock().unwrap()["rs_1"].rules.events[1].description,
        "override"
    );

    assert!(json_equivalent(
        attrs.rules_json_file.as_deref().unwrap(),
        r#"{"events":[{"name":"C"}]}"#
    )
    .unwrap());
    assert!(json_equivalent(
        attrs.import_from.as_deref().unwrap(),
        r#"[{"events":[{"name":"A"},{"name":"B","description":"override"}]}]"#
    )
    .unwrap());
    assert_eq!(attrs.name.as_deref(), Some("workspaces/acme/tracking-plans/rs_1"));
    assert_eq!(attrs.create_time.as_deref(), Some("2024-03-01T10:00:00+00:00"));
}

#[test]
fn libraries_built_from_files_compose_the_same_way() {
    let api = Arc::new(MockApi::new());
    let provider = provider(&api);

    let login = EventLibrary::from_rules(r#"{"events":[{"name":"Logged In"}]}"#).unwrap();
    let signup = EventLibrary::from_rules(r#"{"events":[{"name":"Signed Up"}]}"#).unwrap();
    let decl = TrackingPlanDeclaration {
        display_name: "Web".to_owned(),
        rules_json_file: None,
        import_from: Some(libraries_document(&[signup, login]).unwrap()),
    };
    provider.create_tracking_plan(&decl).unwrap();
    assert_eq!(remote_event_names(&api, "rs_1"), ["Logged In", "Signed Up"]);
}

#[test]
fn unchanged_declaration_is_not_pushed() {
    let api = Arc::new(MockApi::new());
    let provider = provider(&api);

    let decl = TrackingPlanDeclaration {
        display_name: "Web".to_owned(),
        rules_json_file: Some(r#"{"events":[{"name":"C"}]}"#.to_owned()),
        import_from: Some(r#"[{"events":[{"name":"A"},{"name":"B"}]}]"#.to_owned()),
    };
    let (id, attrs) = provider.create_tracking_plan(&decl).unwrap();
    assert_eq!(plan_tracking_plan(&decl, Some(&attrs)).unwrap(), Action::Noop);

    let again = provider.update_tracking_plan(&id, &decl, &attrs).unwrap();
    assert_eq!(again, attrs);
    assert_eq!(api.call_count("update_tracking_plan"), 0);
}

#[test]
fn empty_events_and_descriptions_settle_after_create() {
    for rules in [
        r#"{"events":[]}"#,
        r#"{"events":[{"name":"C","description":""}]}"#,
    ] {
        let api = Arc::new(MockApi::new());
        let provider = provider(&api);
        let decl = TrackingPlanDeclaration {
            display_name: "Web".to_owned(),
            rules_json_file: Some(rules.to_owned()),
            import_from: Some(r#"[{"events":[{"name":"A","description":""}]}]"#.to_owned()),
        };

        let (id, attrs) = provider.create_tracking_plan(&decl).unwrap();
        assert_eq!(
            plan_tracking_plan(&decl, Some(&attrs)).unwrap(),
            Action::Noop,
            "{rules}"
        );
        provider.update_tracking_plan(&id, &decl, &attrs).unwrap();
        assert_eq!(api.call_count("update_tracking_plan"), 0, "{rules}");
    }
}

#[test]
fn changed_declaration_is_pushed_and_reread() {
    let api = Arc::new(MockApi::new());
    let provider = provider(&api);

    let (id, attrs) = provider.create_tracking_plan(&web_plan()).unwrap();
    let decl = TrackingPlanDeclaration {
        display_name: "Web v2".to_owned(),
        rules_json_file: Some(r#"{"events":[{"name":"D"}]}"#.to_owned()),
        ..web_plan()
    };
    let updated = provider.update_tracking_plan(&id, &decl, &attrs).unwrap();

    assert_eq!(api.call_count("update_tracking_plan"), 1);
    assert_eq!(updated.display_name, "Web v2");
    assert_eq!(remote_event_names(&api, "rs_1"), ["A", "B", "D"]);
    assert!(json_equivalent(
        updated.rules_json_file.as_deref().unwrap(),
        r#"{"events":[{"name":"D"}]}"#
    )
    .unwrap());
}

#[test]
fn import_treats_every_event_as_plan_owned() {
    let api = Arc::new(MockApi::new().with_plan("rs_legacy", &["X", "Y"]));
    let provider = provider(&api);

    let (id, attrs) = provider.import_tracking_plan("rs_legacy").unwrap();
    assert_eq!(id, "rs_legacy");
    assert!(attrs.import_from.is_none());
    assert!(json_equivalent(
        attrs.rules_json_file.as_deref().unwrap(),
        r#"{"events":[{"name":"X"},{"name":"Y"}]}"#
    )
    .unwrap());
}

#[test]
fn import_rejects_malformed_ids() {
    let api = Arc::new(MockApi::new());
    let provider = provider(&api);
    assert!(matches!(
        provider.import_tracking_plan("not-a-plan"),
        Err(CoreError::Schema(_))
    ));
    assert_eq!(api.calls.lock().unwrap().len(), 0);
}

#[test]
fn delete_removes_the_plan() {
    let api = Arc::new(MockApi::new().with_plan("rs_old", &[]));
    let provider = provider(&api);

    let id = TrackingPlanId::parse("rs_old").unwrap();
    provider.delete_tracking_plan(&id).unwrap();
    assert!(api.plans.lock().unwrap().is_empty());
    assert!(matches!(
        provider.read_tracking_plan(&id, None),
        Err(CoreError::Remote(e)) if e.is_not_found()
    ));
}

#[test]
fn invalid_rules_are_rejected_before_any_call() {
    let api = Arc::new(MockApi::new());
    let provider = provider(&api);

    let decl = TrackingPlanDeclaration {
        rules_json_file: Some(r#"["not", "an", "object"]"#.to_owned()),
        ..web_plan()
    };
    assert!(provider.create_tracking_plan(&decl).is_err());
    assert_eq!(api.call_count("create_tracking_plan"), 0);
}
