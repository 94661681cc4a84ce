use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::ContentId;
use crate::names::{validate_container_name, validate_object_name};

/// Final address of an assembled object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "bucket_name")]
    pub container: String,
    #[serde(rename = "object_name")]
    pub name: String,
}

impl Location {
    /// Build a location after validating both components.
    pub fn new(container: impl Into<String>, name: impl Into<String>) -> Result<Self, TypeError> {
        let container = container.into();
        let name = name.into();
        validate_container_name(&container)?;
        validate_object_name(&name)?;
        Ok(Self { container, name })
    }

    /// The same location with the identifier prefixed to the final path
    /// component: `"dir/movie.mp4"` becomes `"dir/{id}_movie.mp4"`.
    ///
    /// Used when the target name is already taken by different content.
    /// Fails if the longer name no longer passes validation.
    pub fn disambiguated(&self, id: &ContentId) -> Result<Self, TypeError> {
        let name = match self.name.rsplit_once('/') {
            Some((dir, file)) => format!("{dir}/{id}_{file}"),
            None => format!("{id}_{}", self.name),
        };
        validate_object_name(&name)?;
        Ok(Self {
            container: self.container.clone(),
            name,
        })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.name)
    }
}

/// Persisted proof that a piece of content already has a final location.
///
/// Written once, as the last step of a successful assembly, and never
/// updated in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub identifier: ContentId,
    pub location: Location,
    /// Size in bytes of the assembled object.
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl DedupRecord {
    pub fn new(identifier: ContentId, location: Location, size: u64) -> Self {
        Self {
            identifier,
            location,
            size,
            created_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, TypeError> {
        serde_json::to_string(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn from_json(data: &str) -> Result<Self, TypeError> {
        serde_json::from_str(data).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
