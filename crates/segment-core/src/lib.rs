//! Core orchestration for the Segment provider.
//!
//! This crate ties the schema layer and the Config API together into the
//! `Provider`: create, read, update, delete and import of tracking plans and
//! sources. Tracking plans are composed from event libraries and per-plan
//! events; sources are reconciled against their tracking plan link through a
//! process-wide `ConnectionCache`. It also provides change planning, host
//! diagnostics, and the interrupt handler that cancels pending retries.

pub mod cache;
pub mod concurrency;
pub mod diagnostics;
pub mod event_library;
pub mod linkage;
pub mod plan;
pub mod provider;
pub mod source;
pub mod tracking_plan;

pub use cache::ConnectionCache;
pub use concurrency::{install_signal_handler, shutdown_requested};
pub use diagnostics::{Diagnostic, Severity};
pub use event_library::{libraries_document, read_event_library};
pub use linkage::{transition, LinkStep, Linkage};
pub use plan::{plan_source, plan_tracking_plan, Action};
pub use provider::Provider;
pub use source::SourceDeclaration;
pub use tracking_plan::TrackingPlanDeclaration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("schema error: {0}")]
    Schema(#[from] segment_schema::SchemaError),
    #[error("state error: {0}")]
    State(#[from] segment_state::StateError),
    #[error("remote error: {0}")]
    Remote(#[from] segment_remote::RemoteError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),
    #[error("source {source_name} was created but could not be configured: {cause}")]
    PartialCreate {
        source_name: String,
        cause: Box<CoreError>,
        cleanup: Option<Box<CoreError>>,
    },
}

impl CoreError {
    /// Render the error as host diagnostics.
    ///
    /// A partial create yields the diagnostics of its cause, plus a warning
    /// naming the lingering source when the rollback itself failed.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            CoreError::PartialCreate {
                source_name,
                cause,
                cleanup,
            } => {
                let mut diags = cause.diagnostics();
                if let Some(cleanup) = cleanup {
                    diags.push(Diagnostic::warning(
                        "Lingering Segment resources",
                        format!(
                            "Source {source_name} could not be cleaned up because of {cleanup}. Check Segment for manual cleanup"
                        ),
                    ));
                }
                diags
            }
            other => vec![Diagnostic::error(other.to_string())],
        }
    }
}
