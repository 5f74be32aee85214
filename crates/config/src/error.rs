//! Configuration Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Every variant means the operator has to fix something before the bot can
/// start; none of them are retryable.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An explicitly requested configuration file does not exist.
    #[display("configuration file not found: {_0}")]
    FileNotFound(#[error(not(source))] String),
    /// The merged configuration could not be deserialized.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    /// A required setting is empty.
    #[display("missing required setting: {_0}")]
    Missing(#[error(not(source))] &'static str),
    /// A duration string could not be parsed.
    #[display("invalid duration: {_0:?}")]
    InvalidDuration(#[error(not(source))] String),
}
