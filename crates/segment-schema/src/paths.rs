/// Convert a Segment resource path to its trailing name.
///
/// `workspaces/acme/sources/ios-app` becomes `ios-app`. A path without `/` is
/// returned unchanged.
pub fn path_to_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Full resource path of a source: `workspaces/<workspace>/sources/<name>`.
pub fn source_path(workspace: &str, source: &str) -> String {
    format!("workspaces/{workspace}/sources/{source}")
}

/// Full resource path of a tracking plan: `workspaces/<workspace>/tracking-plans/<id>`.
pub fn tracking_plan_path(workspace: &str, plan: &str) -> String {
    format!("workspaces/{workspace}/tracking-plans/{plan}")
}
