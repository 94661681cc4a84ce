use bytes::Bytes;
use ferry_types::{ContentId, Location, SessionKey};

use crate::error::{UploadError, UploadResult};

/// One part submission as received from a caller.
///
/// Every field is optional so that missing form fields surface as a
/// [`UploadError::Validation`] rather than a decoding failure in the
/// transport layer.
#[derive(Clone, Debug, Default)]
pub struct PartSubmission {
    pub identifier: Option<String>,
    pub part_size: Option<u64>,
    pub part_index: Option<u32>,
    pub total_parts: Option<u32>,
    pub total_size: Option<u64>,
    pub container: Option<String>,
    pub name: Option<String>,
    pub data: Bytes,
}

impl PartSubmission {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn part_size(mut self, part_size: u64) -> Self {
        self.part_size = Some(part_size);
        self
    }

    /// Set the 1-based index of this part and the declared part count.
    pub fn part(mut self, index: u32, total_parts: u32) -> Self {
        self.part_index = Some(index);
        self.total_parts = Some(total_parts);
        self
    }

    pub fn total_size(mut self, total_size: u64) -> Self {
        self.total_size = Some(total_size);
        self
    }

    pub fn target(mut self, container: impl Into<String>, name: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self.name = Some(name.into());
        self
    }

    /// Check every field without touching any state.
    pub fn validate(self) -> UploadResult<ValidatedSubmission> {
        let identifier = required(self.identifier, "identifier")?;
        let id = ContentId::parse(&identifier).map_err(invalid)?;

        let part_size = required(self.part_size, "part size")?;
        let key = SessionKey::new(id, part_size).map_err(invalid)?;

        let total_parts = required(self.total_parts, "total part count")?;
        if total_parts == 0 {
            return Err(UploadError::Validation(
                "total part count must be at least 1".into(),
            ));
        }
        let index = required(self.part_index, "part index")?;
        if index == 0 || index > total_parts {
            return Err(UploadError::Validation(format!(
                "part index {index} outside 1..={total_parts}"
            )));
        }

        let total_size = required(self.total_size, "total size")?;
        let len = self.data.len() as u64;
        if len > total_size {
            return Err(UploadError::Validation(format!(
                "part of {len} bytes exceeds declared total size {total_size}"
            )));
        }

        let container = required(self.container, "container")?;
        let name = required(self.name, "object name")?;
        let target = Location::new(container, name).map_err(invalid)?;

        Ok(ValidatedSubmission {
            key,
            index,
            total_parts,
            total_size,
            target,
            data: self.data,
        })
    }
}

fn required<T>(value: Option<T>, field: &str) -> UploadResult<T> {
    value.ok_or_else(|| UploadError::Validation(format!("{field} is required")))
}

fn invalid(e: ferry_types::TypeError) -> UploadError {
    UploadError::Validation(e.to_string())
}

/// A submission whose fields have all been checked.
#[derive(Clone, Debug)]
pub struct ValidatedSubmission {
    pub key: SessionKey,
    pub index: u32,
    pub total_parts: u32,
    pub total_size: u64,
    /// Requested final location, before any disambiguation.
    pub target: Location,
    pub data: Bytes,
}

impl ValidatedSubmission {
    /// Backend name of this part.
    pub fn part_name(&self) -> String {
        self.key.part_name(self.index)
    }
}
