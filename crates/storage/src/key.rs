//! Object key validation.
//!
//! Keys are `/`-separated strings relative to the backend's configured
//! prefix. This module makes sure a key can never climb out of that prefix.

use crate::error::{ErrorKind, Result};

/// Validates and normalizes an object key.
///
/// Empty segments and `.` segments are dropped, `..` pops the previous
/// segment. A key that would leave the root, contains a null byte, or is
/// empty after normalization is rejected with
/// [`InvalidKey`](crate::error::ErrorKind::InvalidKey).
///
/// # Examples
///
/// ```
/// use ossky_storage::validate_key;
/// // Valid keys
/// assert!(validate_key("github-golang/go").is_ok());
/// assert!(validate_key("a/../b").is_ok()); // (never leaves the root)
/// // Invalid keys
/// assert!(validate_key("../escape").is_err());
/// assert!(validate_key("a\0b").is_err());
/// // Keys get resolved
/// assert_eq!(validate_key("/wrong/.././right//key/").unwrap(), "right/key");
/// ```
pub fn validate(key: impl AsRef<str>) -> Result<String> {
    let key = key.as_ref();
    if key.contains('\0') {
        exn::bail!(ErrorKind::InvalidKey(key.replace('\0', "\\0")));
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in key.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidKey(key.to_string()));
                }
            },
            normal => segments.push(normal),
        }
    }
    match segments.is_empty() {
        true => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
        false => Ok(segments.join("/")),
    }
}
