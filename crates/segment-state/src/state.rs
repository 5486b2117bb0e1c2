use crate::{fsync_dir, StateError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub const STATE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    TrackingPlan,
    Source,
}

impl ResourceKind {
    /// Attribute schema version written by this build.
    pub fn schema_version(self) -> u32 {
        match self {
            ResourceKind::TrackingPlan => 2,
            ResourceKind::Source => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::TrackingPlan => "tracking_plan",
            ResourceKind::Source => "source",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One managed resource as persisted: its remote id and raw attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub kind: ResourceKind,
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ResourceState {
    pub fn new<T: Serialize>(
        kind: ResourceKind,
        id: Option<String>,
        attributes: &T,
    ) -> Result<Self, StateError> {
        let attributes = match serde_json::to_value(attributes)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(Self {
            kind,
            schema_version: kind.schema_version(),
            id,
            attributes,
        })
    }

    /// Decode the raw attributes into a typed view.
    pub fn attributes_as<T: DeserializeOwned>(&self) -> Result<T, StateError> {
        Ok(serde_json::from_value(Value::Object(self.attributes.clone()))?)
    }
}

/// The full state document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub format_version: u32,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            format_version: STATE_FORMAT_VERSION,
            resources: BTreeMap::new(),
        }
    }
}

impl StateFile {
    pub fn get(&self, address: &str, kind: ResourceKind) -> Result<Option<&ResourceState>, StateError> {
        match self.resources.get(address) {
            Some(r) if r.kind != kind => Err(StateError::KindMismatch {
                address: address.to_owned(),
                expected: kind,
                found: r.kind,
            }),
            other => Ok(other),
        }
    }

    pub fn put(&mut self, address: impl Into<String>, resource: ResourceState) {
        self.resources.insert(address.into(), resource);
    }

    pub fn remove(&mut self, address: &str) -> Option<ResourceState> {
        self.resources.remove(address)
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = (&String, &ResourceState)> {
        self.resources.iter().filter(move |(_, r)| r.kind == kind)
    }
}

/// Reads and writes a [`StateFile`] at a fixed path.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Load the state, treating a missing file as empty state.
    pub fn load(&self) -> Result<StateFile, StateError> {
        if !self.path.exists() {
            debug!("no state file at {}, starting empty", self.path.display());
            return Ok(StateFile::default());
        }
        let content = fs::read_to_string(&self.path)?;
        let state: StateFile = serde_json::from_str(&content)?;
        if state.format_version != STATE_FORMAT_VERSION {
            return Err(StateError::VersionMismatch {
                expected: STATE_FORMAT_VERSION,
                found: state.format_version,
            });
        }
        Ok(state)
    }

    pub fn save(&self, state: &StateFile) -> Result<(), StateError> {
        let content = serde_json::to_string_pretty(state)?;
        write_atomic(&self.path, content.as_bytes())?;
        debug!("wrote {} resources to {}", state.resources.len(), self.path.display());
        Ok(())
    }
}

pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StateError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StateError::Io(e.error))?;
    fsync_dir(dir)?;
    Ok(())
}
