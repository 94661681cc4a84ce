//! Container and object name validation.
//!
//! Container names follow S3 bucket conventions:
//! - 3 to 63 characters
//! - lowercase ASCII letters, digits, `-` and `.`
//! - must start and end with a letter or digit
//! - must not contain `..`
//!
//! Object names are more permissive but are still used as storage paths:
//! - non-empty, at most 1024 bytes
//! - no leading `/`, no trailing `/`
//! - no empty, `.` or `..` path components
//! - no control characters or backslashes

use crate::error::TypeError;

/// Maximum object name length in bytes.
pub const MAX_OBJECT_NAME_LEN: usize = 1024;

/// Validate a container (bucket) name.
///
/// # Examples
///
/// ```
/// use ferry_types::validate_container_name;
///
/// assert!(validate_container_name("photos").is_ok());
/// assert!(validate_container_name("my.bucket-01").is_ok());
/// assert!(validate_container_name("UPPER").is_err());
/// assert!(validate_container_name("a").is_err());
/// ```
pub fn validate_container_name(name: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidContainerName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.len() < 3 || name.len() > 63 {
        return Err(invalid("must be between 3 and 63 characters"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err(invalid(
            "may only contain lowercase letters, digits, '-' and '.'",
        ));
    }
    let first = name.as_bytes()[0];
    let last = name.as_bytes()[name.len() - 1];
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(invalid("must start and end with a letter or digit"));
    }
    if name.contains("..") {
        return Err(invalid("must not contain '..'"));
    }
    Ok(())
}

/// Validate an object name.
///
/// # Examples
///
/// ```
/// use ferry_types::validate_object_name;
///
/// assert!(validate_object_name("movie.mp4").is_ok());
/// assert!(validate_object_name("videos/2024/movie.mp4").is_ok());
/// assert!(validate_object_name("../etc/passwd").is_err());
/// ```
pub fn validate_object_name(name: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidObjectName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_OBJECT_NAME_LEN {
        return Err(invalid("exceeds 1024 bytes"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid("must not start or end with '/'"));
    }
    if name.chars().any(|c| c.is_control() || c == '\\') {
        return Err(invalid("contains a control character or backslash"));
    }
    for component in name.split('/') {
        match component {
            "" => return Err(invalid("contains an empty path component")),
            "." | ".." => return Err(invalid("contains a relative path component")),
            _ => {}
        }
    }
    Ok(())
}
