//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! A cache miss is *not* an error; reads return `Ok(None)` for that.

use derive_more::{Display, Error};

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The backing object store failed; the storage error is the child.
    #[display("storage error")]
    Storage,
    /// The value handed to `set` could not be encoded as JSON.
    #[display("failed to serialize cache value for key {_0}")]
    Serialize(#[error(not(source))] String),
    /// The stored body is not valid JSON.
    #[display("failed to deserialize cache value for key {_0}")]
    Deserialize(#[error(not(source))] String),
    /// The stored body is valid JSON but not one of the supported shapes.
    #[display("unsupported cache value for key {key}: found {found}")]
    UnsupportedValue {
        key: String,
        found: &'static str,
    },
    /// An expiry timestamp could not be formatted.
    #[display("invalid expiry timestamp")]
    Timestamp,
    /// The janitor could not delete an object; the current sweep was aborted.
    #[display("failed to delete expired object ({_0})")]
    Cleanup(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Cleanup(_))
    }
}
