//! The TOML declaration file read by `apply`.
//!
//! ```toml
//! [tracking_plans.web]
//! display_name = "Web"
//! rules = "plans/web.json"
//! libraries = ["libraries/auth.json"]
//!
//! [sources.website]
//! catalog_name = "catalog/sources/javascript"
//! tracking_plan = "web"
//!
//! [sources.website.schema_config]
//! allow_unplanned_track_events = false
//! # ...
//! ```
//!
//! File paths are relative to the declaration file. A source's
//! `tracking_plan` is either an `rs_` id or the key of a declared plan.

use segment_core::{libraries_document, read_event_library, TrackingPlanDeclaration};
use segment_schema::{SchemaViolationConfig, SourceName, TrackingPlanId};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeclarationFile {
    #[serde(default)]
    tracking_plans: BTreeMap<String, TrackingPlanEntry>,
    #[serde(default)]
    sources: BTreeMap<String, SourceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TrackingPlanEntry {
    display_name: String,
    #[serde(default)]
    rules: Option<PathBuf>,
    #[serde(default)]
    libraries: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceEntry {
    #[serde(default)]
    source_name: Option<String>,
    catalog_name: String,
    #[serde(default)]
    tracking_plan: Option<String>,
    #[serde(default)]
    schema_config: Option<toml::Table>,
}

/// How a source names its tracking plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanRef {
    Id(TrackingPlanId),
    Key(String),
}

#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub source_name: SourceName,
    pub catalog_name: String,
    pub tracking_plan: Option<PlanRef>,
    pub schema_config: Option<SchemaViolationConfig>,
}

#[derive(Debug, Default)]
pub struct Declarations {
    pub tracking_plans: BTreeMap<String, TrackingPlanDeclaration>,
    pub sources: BTreeMap<String, SourceSpec>,
}

pub fn tracking_plan_address(key: &str) -> String {
    format!("tracking_plan.{key}")
}

pub fn source_address(key: &str) -> String {
    format!("source.{key}")
}

impl Declarations {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            format!("declaration error: failed to read {}: {e}", path.display())
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&content, base)
    }

    pub fn parse(content: &str, base: &Path) -> Result<Self, String> {
        let file: DeclarationFile =
            toml::from_str(content).map_err(|e| format!("declaration error: {e}"))?;

        let mut tracking_plans = BTreeMap::new();
        for (key, entry) in file.tracking_plans {
            let decl = tracking_plan(&entry, base)
                .map_err(|e| format!("declaration error: tracking plan {key}: {e}"))?;
            tracking_plans.insert(key, decl);
        }

        let mut sources = BTreeMap::new();
        for (key, entry) in file.sources {
            let spec = source(&key, entry, &tracking_plans)
                .map_err(|e| format!("declaration error: source {key}: {e}"))?;
            sources.insert(key, spec);
        }

        Ok(Self {
            tracking_plans,
            sources,
        })
    }
}

fn tracking_plan(entry: &TrackingPlanEntry, base: &Path) -> Result<TrackingPlanDeclaration, String> {
    let rules_json_file = match &entry.rules {
        Some(rel) => {
            let path = base.join(rel);
            Some(
                std::fs::read_to_string(&path)
                    .map_err(|e| format!("failed to read {}: {e}", path.display()))?,
            )
        }
        None => None,
    };
    let import_from = if entry.libraries.is_empty() {
        None
    } else {
        let libraries = entry
            .libraries
            .iter()
            .map(|rel| read_event_library(&base.join(rel)).map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        Some(libraries_document(&libraries).map_err(|e| e.to_string())?)
    };
    let decl = TrackingPlanDeclaration {
        display_name: entry.display_name.clone(),
        rules_json_file,
        import_from,
    };
    decl.validate().map_err(|e| e.to_string())?;
    Ok(decl)
}

fn source(
    key: &str,
    entry: SourceEntry,
    tracking_plans: &BTreeMap<String, TrackingPlanDeclaration>,
) -> Result<SourceSpec, String> {
    let source_name = SourceName::new(entry.source_name.as_deref().unwrap_or(key))
        .map_err(|e| e.to_string())?;

    let tracking_plan = match entry.tracking_plan.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(r) if tracking_plans.contains_key(r) => Some(PlanRef::Key(r.to_owned())),
        Some(r) if r.starts_with("rs_") => Some(PlanRef::Id(
            TrackingPlanId::parse(r).map_err(|e| e.to_string())?,
        )),
        Some(r) => return Err(format!("unknown tracking plan '{r}'")),
    };

    let schema_config = match entry.schema_config {
        Some(table) => {
            let value = serde_json::to_value(table).map_err(|e| e.to_string())?;
            let serde_json::Value::Object(map) = value else {
                return Err("schema_config must be a table".to_owned());
            };
            Some(SchemaViolationConfig::decode(&map).map_err(|e| e.to_string())?)
        }
        None => None,
    };
    if schema_config.is_some() && tracking_plan.is_none() {
        return Err("schema_config requires tracking_plan".to_owned());
    }

    Ok(SourceSpec {
        source_name,
        catalog_name: entry.catalog_name,
        tracking_plan,
        schema_config,
    })
}
