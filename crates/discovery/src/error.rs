//! Discovery Error Types

use derive_more::{Display, Error};

/// A discovery error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The search request did not get a response.
    #[display("request to the search API failed")]
    Request { transient: bool },
    /// The search API answered with an error status (including its rate
    /// limit, which GitHub reports as 403 or 429).
    #[display("search API returned {status}: {message}")]
    Api { status: u16, message: String },
    /// The search API answered with something that isn't a search result.
    #[display("invalid search response")]
    Decode,
    /// The deduplication cache failed.
    #[display("cache error")]
    Cache,
    #[display("failed to build HTTP client")]
    Client,
}

impl ErrorKind {
    /// Returns `true` if trying again later might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request { transient } => *transient,
            Self::Api { status, .. } => matches!(status, 403 | 429) || *status >= 500,
            Self::Cache => true,
            Self::Decode | Self::Client => false,
        }
    }
}
