pub mod apply;
pub mod completions;
pub mod destroy;
pub mod event_library;
pub mod import;
pub mod refresh;
pub mod upgrade_state;

use indicatif::{ProgressBar, ProgressStyle};
use segment_core::{shutdown_requested, Action, CoreError, Provider, Severity};
use segment_remote::{CancelToken, ConfigOverrides, ProviderConfig, ProviderConfigFile};
use segment_schema::TrackingPlanId;
use segment_state::{migrate_resource, ResourceState, StateFile, StateLock, StateStore};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_DECLARATION_ERROR: u8 = 2;
pub const EXIT_STATE_ERROR: u8 = 3;

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct Globals {
    pub state: PathBuf,
    pub config: Option<PathBuf>,
    pub token: Option<String>,
    pub workspace: Option<String>,
    pub api_url: Option<String>,
    pub json: bool,
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Spinner shown only for human output.
pub fn progress(json: bool, msg: &str) -> Option<ProgressBar> {
    (!json).then(|| spinner(msg))
}

pub fn finish(pb: Option<&ProgressBar>, ok: bool, msg: &str) {
    if let Some(pb) = pb {
        if ok {
            spin_ok(pb, msg);
        } else {
            spin_fail(pb, msg);
        }
    }
}

pub fn colorize_action(action: Action) -> String {
    use console::Style;
    let text = format!("{} {action}", action.symbol());
    match action {
        Action::Create => Style::new().green().apply_to(text).to_string(),
        Action::Update => Style::new().yellow().apply_to(text).to_string(),
        Action::Replace => Style::new().red().bold().apply_to(text).to_string(),
        Action::Delete => Style::new().red().apply_to(text).to_string(),
        Action::Noop => Style::new().dim().apply_to(text).to_string(),
    }
}

pub fn make_provider(globals: &Globals, cancel: CancelToken) -> Result<Provider, String> {
    let file = match &globals.config {
        Some(path) => Some(ProviderConfigFile::load(path).map_err(|e| e.to_string())?),
        None => ProviderConfigFile::load_default().map_err(|e| e.to_string())?,
    };
    let overrides = ConfigOverrides {
        access_token: globals.token.clone(),
        workspace: globals.workspace.clone(),
        api_url: globals.api_url.clone(),
    };
    let config = ProviderConfig::resolve(file, overrides).map_err(|e| e.to_string())?;
    Ok(Provider::connect(config, cancel))
}

/// Lock and load the state file, upgrading older resource schemas in memory.
pub fn open_state(globals: &Globals) -> Result<(StateStore, StateLock, StateFile), String> {
    let store = StateStore::new(&globals.state);
    let lock = StateLock::acquire(&store.lock_path()).map_err(|e| format!("state lock: {e}"))?;
    let mut state = store.load().map_err(|e| format!("state error: {e}"))?;
    for (address, resource) in &mut state.resources {
        migrate_resource(resource).map_err(|e| format!("state error: {address}: {e}"))?;
    }
    Ok((store, lock, state))
}

pub fn save_state(store: &StateStore, state: &StateFile) -> Result<(), String> {
    store.save(state).map_err(|e| format!("state error: {e}"))
}

/// Stop before the next remote change once Ctrl-C was pressed. State is
/// saved after every change, so it already holds the completed ones.
pub fn check_interrupted() -> Result<(), String> {
    if shutdown_requested() {
        return Err("interrupted, remaining changes were not applied".to_owned());
    }
    Ok(())
}

pub fn attributes<T: DeserializeOwned>(address: &str, resource: &ResourceState) -> Result<T, String> {
    resource
        .attributes_as()
        .map_err(|e| format!("state error: {address}: {e}"))
}

pub fn tracking_plan_id(address: &str, resource: &ResourceState) -> Result<TrackingPlanId, String> {
    let id = resource
        .id
        .as_deref()
        .ok_or_else(|| format!("state error: {address} has no id"))?;
    TrackingPlanId::parse(id).map_err(|e| format!("state error: {address}: {e}"))
}

/// Print warnings to stderr and return the error summaries as one message.
pub fn report(err: &CoreError) -> String {
    let mut errors = Vec::new();
    for diag in err.diagnostics() {
        match diag.severity {
            Severity::Warning => eprintln!(
                "{}",
                console::Style::new().yellow().apply_to(diag.to_string())
            ),
            Severity::Error => errors.push(diag.summary),
        }
    }
    errors.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use segment_remote::RemoteError;

    #[test]
    fn no_interrupt_lets_changes_proceed() {
        assert_eq!(check_interrupted(), Ok(()));
    }

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"address": "source.web"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"address\""));
    }

    #[test]
    fn colorize_action_keeps_label() {
        assert!(colorize_action(Action::Create).contains("create"));
        assert!(colorize_action(Action::Replace).contains("-/+"));
        assert!(colorize_action(Action::Noop).contains("no changes"));
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_DECLARATION_ERROR);
        assert_ne!(EXIT_DECLARATION_ERROR, EXIT_STATE_ERROR);
    }

    #[test]
    fn report_returns_error_summaries_only() {
        let err = CoreError::PartialCreate {
            source_name: "web".to_owned(),
            cause: Box::new(RemoteError::NotFound("rs_x".to_owned()).into()),
            cleanup: Some(Box::new(RemoteError::Http("HTTP 500".to_owned()).into())),
        };
        let msg = report(&err);
        assert!(msg.contains("rs_x"));
        assert!(!msg.contains("Lingering"));
    }

    #[test]
    fn open_state_on_fresh_path_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let globals = Globals {
            state: dir.path().join("segment.state.json"),
            config: None,
            token: None,
            workspace: None,
            api_url: None,
            json: true,
        };
        let (store, _lock, state) = open_state(&globals).unwrap();
        assert!(state.resources.is_empty());
        save_state(&store, &state).unwrap();
        assert!(globals.state.exists());
    }

    #[test]
    fn tracking_plan_id_requires_a_valid_id() {
        let mut resource = ResourceState {
            kind: segment_state::ResourceKind::TrackingPlan,
            schema_version: 2,
            id: None,
            attributes: serde_json::Map::new(),
        };
        assert!(tracking_plan_id("tracking_plan.web", &resource)
            .unwrap_err()
            .starts_with("state error:"));
        resource.id = Some("rs_1".to_owned());
        assert_eq!(tracking_plan_id("tracking_plan.web", &resource).unwrap(), "rs_1");
    }

    #[test]
    fn spinner_creates_progress_bar() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }
}
