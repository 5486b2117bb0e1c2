use crate::RemoteError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://platform.segmentapis.com/v1beta";

pub const ENV_ACCESS_TOKEN: &str = "SEGMENT_ACCESS_TOKEN";
pub const ENV_WORKSPACE: &str = "SEGMENT_WORKSPACE";

/// Provider settings as written in `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfigFile {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub unsupported_destination_config_props: BTreeSet<String>,
}

/// Values given explicitly, e.g. on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub access_token: Option<String>,
    pub workspace: Option<String>,
    pub api_url: Option<String>,
}

/// Resolved provider configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub access_token: String,
    pub workspace: String,
    pub api_url: String,
    /// Destination settings the provider leaves alone, as `<destination>/<key>`
    /// or a bare `<key>` matching every destination.
    pub unsupported_destination_config_props: BTreeSet<String>,
}

impl ProviderConfigFile {
    pub fn load(path: &Path) -> Result<Self, RemoteError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| RemoteError::Config(format!("invalid provider config: {e}")))
    }

    /// Load `~/.config/segment-provider/config.toml` if it exists.
    pub fn load_default() -> Result<Option<Self>, RemoteError> {
        let Some(path) = default_config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }
}

impl ProviderConfig {
    /// Resolve from explicit values, then the config file, then the
    /// `SEGMENT_ACCESS_TOKEN` and `SEGMENT_WORKSPACE` environment variables.
    pub fn resolve(
        file: Option<ProviderConfigFile>,
        overrides: ConfigOverrides,
    ) -> Result<Self, RemoteError> {
        Self::resolve_with_env(file, overrides, |key| std::env::var(key).ok())
    }

    pub fn resolve_with_env(
        file: Option<ProviderConfigFile>,
        overrides: ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, RemoteError> {
        let file = file.unwrap_or_default();
        let access_token = overrides
            .access_token
            .or(file.access_token)
            .or_else(|| env(ENV_ACCESS_TOKEN))
            .unwrap_or_default();
        let workspace = overrides
            .workspace
            .or(file.workspace)
            .or_else(|| env(ENV_WORKSPACE))
            .unwrap_or_default();
        if access_token.trim().is_empty() || workspace.trim().is_empty() {
            return Err(RemoteError::Config(
                "access token and workspace values cannot be empty".to_owned(),
            ));
        }
        let api_url = overrides
            .api_url
            .or(file.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();

        Ok(Self {
            access_token,
            workspace,
            api_url,
            unsupported_destination_config_props: file.unsupported_destination_config_props,
        })
    }

    /// Whether the provider manages `key` on `destination`.
    pub fn is_destination_config_prop_supported(&self, destination: &str, key: &str) -> bool {
        let scoped = format!("{destination}/{key}");
        let excluded = self.unsupported_destination_config_props.contains(&scoped)
            || self.unsupported_destination_config_props.contains(key);
        if excluded {
            debug!("excluding unsupported destination config property {scoped}");
        }
        !excluded
    }
}

fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config/segment-provider/config.toml"))
}
