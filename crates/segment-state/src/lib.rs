//! Host-side resource state for the Segment provider.
//!
//! This crate persists what the provider knows about each managed resource:
//! a `StateFile` of raw attribute maps keyed by resource address, typed views
//! over those maps (`TrackingPlanAttributes`, `SourceAttributes`), an
//! exclusive `StateLock` for concurrent runs, and the schema-version upgrader
//! that rewrites legacy tracking plan state.

pub mod attributes;
pub mod lock;
pub mod migration;
pub mod state;

pub use attributes::{SourceAttributes, TrackingPlanAttributes};
pub use lock::StateLock;
pub use migration::{
    migrate_resource, migrate_state_file, upgrade_tracking_plan_v1_to_v2, MigrationResult,
};
pub use state::{ResourceKind, ResourceState, StateFile, StateStore, STATE_FORMAT_VERSION};

use segment_schema::SchemaError;
use std::path::Path;
use thiserror::Error;

/// Fsync a directory so that a preceding rename is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
    #[error("state format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("{kind} schema version {found} is newer than supported version {supported}")]
    SchemaVersionTooNew {
        kind: ResourceKind,
        found: u32,
        supported: u32,
    },
    #[error("resource not found in state: {0}")]
    ResourceNotFound(String),
    #[error("resource '{address}' is a {found}, not a {expected}")]
    KindMismatch {
        address: String,
        expected: ResourceKind,
        found: ResourceKind,
    },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
