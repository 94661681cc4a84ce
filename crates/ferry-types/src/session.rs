use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::ContentId;

/// File suffix carried by every part object.
pub const PART_SUFFIX: &str = ".part";

/// Key of one resumable upload session.
///
/// The same content uploaded with a different chunking scheme is tracked as a
/// separate session, so the part size is part of the key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    id: ContentId,
    part_size: u64,
}

impl SessionKey {
    /// Build a session key. A zero part size is rejected.
    pub fn new(id: ContentId, part_size: u64) -> Result<Self, TypeError> {
        if part_size == 0 {
            return Err(TypeError::InvalidPartSize(part_size));
        }
        Ok(Self { id, part_size })
    }

    pub fn id(&self) -> &ContentId {
        &self.id
    }

    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    /// Prefix under which all parts of this session live: `"{id}_{size}/"`.
    pub fn part_prefix(&self) -> String {
        format!("{}_{}/", self.id, self.part_size)
    }

    /// Backend object name of one part: `"{id}_{size}/{index}.part"`.
    pub fn part_name(&self, index: u32) -> String {
        format!("{}_{}/{}{}", self.id, self.part_size, index, PART_SUFFIX)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.id, self.part_size)
    }
}

/// Parse the numeric part index out of a listed object name.
///
/// Only names directly under the session prefix whose stem is the canonical
/// decimal form of an index `>= 1` are accepted. `"01.part"`, `"x.part"`,
/// `"0.part"` and nested names are rejected so that a corrupt or foreign
/// object can never be counted twice or in the wrong position.
pub fn parse_part_index(key: &SessionKey, object_name: &str) -> Option<u32> {
    let rest = object_name.strip_prefix(&key.part_prefix())?;
    let stem = rest.strip_suffix(PART_SUFFIX)?;
    if stem.is_empty() || stem.contains('/') || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: u32 = stem.parse().ok()?;
    if index == 0 || index.to_string() != stem {
        return None;
    }
    Some(index)
}

/// Sort items by numeric part index, never by their names.
///
/// Lexicographic order would put part `10` before part `2`.
pub fn sort_parts_by_index<T, F>(items: &mut [T], index_of: F)
where
    F: Fn(&T) -> u32,
{
    items.sort_by_key(|item| index_of(item));
}
