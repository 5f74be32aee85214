//! Rich-text Error Types
//!
//! Every error here is a contract violation by the caller: the encoder is a
//! pure function and nothing it reports is worth retrying.

use derive_more::{Display, Error};

/// An encoding error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for encoding operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A draft field the encoder cannot work without is empty.
    #[display("missing required field: {_0}")]
    MissingField(#[error(not(source))] &'static str),
    /// The requested facet feature is not one the encoder produces.
    #[display("unsupported facet feature: {_0}")]
    UnsupportedFeature(#[error(not(source))] String),
    /// The assembled text does not fit in a post.
    #[display("post text is {length} bytes, limit is {limit}")]
    TooLong { length: usize, limit: usize },
}

impl ErrorKind {
    /// Always `false`; the same draft will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
