//! Newtype wrappers for Segment identifiers, providing compile-time type safety.
//!
//! All newtypes serialize/deserialize as plain strings so persisted state stays
//! readable by older provider versions.

use crate::paths::path_to_name;
use crate::SchemaError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::OnceLock;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

string_newtype!(
    /// Short source name, e.g. `ios-app`. Used verbatim as the source resource id.
    SourceName
);

string_newtype!(
    /// Tracking plan identifier of the form `rs_<alphanumeric>`.
    TrackingPlanId
);

impl SourceName {
    /// Create a source name, trimming surrounding whitespace.
    pub fn new(name: impl AsRef<str>) -> Result<Self, SchemaError> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() || trimmed.contains('/') {
            return Err(SchemaError::InvalidIdentifier {
                kind: "source",
                value: name.as_ref().to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Extract the source name from a remote path such as
    /// `workspaces/acme/sources/ios-app`.
    pub fn from_path(path: &str) -> Result<Self, SchemaError> {
        Self::new(path_to_name(path))
    }
}

fn tracking_plan_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^rs_[A-Za-z0-9]+$").expect("valid pattern"))
}

impl TrackingPlanId {
    pub fn parse(id: &str) -> Result<Self, SchemaError> {
        if tracking_plan_pattern().is_match(id) {
            Ok(Self(id.to_owned()))
        } else {
            Err(SchemaError::InvalidIdentifier {
                kind: "tracking plan",
                value: id.to_owned(),
            })
        }
    }

    /// Extract the id from the resource name returned by the Config API,
    /// e.g. `workspaces/acme/tracking-plans/rs_123abc`.
    pub fn from_resource_name(name: &str) -> Result<Self, SchemaError> {
        Self::parse(path_to_name(name))
    }
}

/// Identifier of a destination attached to a source: `<source>/<destination>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationId {
    pub source: SourceName,
    pub destination: String,
}

impl DestinationId {
    pub fn parse(id: &str) -> Result<Self, SchemaError> {
        let invalid = || SchemaError::InvalidIdentifier {
            kind: "destination",
            value: id.to_owned(),
        };
        let (source, destination) = id.split_once('/').ok_or_else(invalid)?;
        if destination.is_empty() || destination.contains('/') {
            return Err(invalid());
        }
        Ok(Self {
            source: SourceName::new(source).map_err(|_| invalid())?,
            destination: destination.to_owned(),
        })
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.destination)
    }
}

/// Identifier of a destination filter: `<source>/<destination>/<filter>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationFilterId {
    pub destination: DestinationId,
    pub filter: String,
}

impl DestinationFilterId {
    pub fn parse(id: &str) -> Result<Self, SchemaError> {
        let invalid = || SchemaError::InvalidIdentifier {
            kind: "destination filter",
            value: id.to_owned(),
        };
        let (destination, filter) = id.rsplit_once('/').ok_or_else(invalid)?;
        if filter.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            destination: DestinationId::parse(destination).map_err(|_| invalid())?,
            filter: filter.to_owned(),
        })
    }
}

impl fmt::Display for DestinationFilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.destination, self.filter)
    }
}
