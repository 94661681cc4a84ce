use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Shortest accepted identifier (an MD5 digest in hex).
pub const MIN_IDENTIFIER_LEN: usize = 32;

/// Longest accepted identifier (a 512-bit digest in hex).
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Caller-supplied content identifier.
///
/// Identifiers are content hashes computed by the client (typically MD5) and
/// become part of backend object names, so they are validated before use:
/// ASCII hex only, even length, between [`MIN_IDENTIFIER_LEN`] and
/// [`MAX_IDENTIFIER_LEN`] characters. The stored form is lowercase so that
/// `"ABCD..."` and `"abcd..."` name the same content.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    /// Parse and normalize an identifier.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidIdentifier {
            value: value.chars().take(MAX_IDENTIFIER_LEN).collect(),
            reason: reason.to_string(),
        };

        if value.is_empty() {
            return Err(invalid("identifier must not be empty"));
        }
        if value.len() < MIN_IDENTIFIER_LEN || value.len() > MAX_IDENTIFIER_LEN {
            return Err(invalid(&format!(
                "length must be between {MIN_IDENTIFIER_LEN} and {MAX_IDENTIFIER_LEN} characters"
            )));
        }
        if value.len() % 2 != 0 {
            return Err(invalid("hex digest must have an even length"));
        }
        if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid("identifier must be a hex digest"));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// The normalized hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 8 characters) for logs.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.short())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.0
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MD5_HEX: &str = "9e107d9d372bb6826bd81d3542a419d6";

    #[test]
    fn accepts_md5_hex() {
        let id = ContentId::parse(MD5_HEX).unwrap();
        assert_eq!(id.as_str(), MD5_HEX);
        assert_eq!(id.short(), "9e107d9d");
    }

    #[test]
    fn normalizes_to_lowercase() {
        let id = ContentId::parse(&MD5_HEX.to_uppercase()).unwrap();
        assert_eq!(id.as_str(), MD5_HEX);
    }

    #[test]
    fn accepts_blake3_hex() {
        let hex64 = "a".repeat(64);
        assert!(ContentId::parse(&hex64).is_ok());
    }

    #[test]
    fn rejects_empty() {
        let err = ContentId::parse("").unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn rejects_short_and_long() {
        assert!(ContentId::parse("abcd").is_err());
        assert!(ContentId::parse(&"a".repeat(130)).is_err());
    }

    #[test]
    fn rejects_odd_length() {
        assert!(ContentId::parse(&"a".repeat(33)).is_err());
    }

    #[test]
    fn rejects_path_injection() {
        let sneaky = format!("../../{}", &MD5_HEX[6..]);
        let err = ContentId::parse(&sneaky).unwrap_err();
        assert!(matches!(err, TypeError::InvalidIdentifier { .. }));
    }

    #[test]
    fn serde_validates_on_decode() {
        let ok: ContentId = serde_json::from_str(&format!("\"{MD5_HEX}\"")).unwrap();
        assert_eq!(ok.as_str(), MD5_HEX);
        assert!(serde_json::from_str::<ContentId>("\"not-hex\"").is_err());
    }

    #[test]
    fn display_and_debug() {
        let id = ContentId::parse(MD5_HEX).unwrap();
        assert_eq!(format!("{id}"), MD5_HEX);
        assert_eq!(format!("{id:?}"), "ContentId(9e107d9d)");
    }
}
