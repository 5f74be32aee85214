//! Application Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("failed to load configuration")]
    Config,
    #[display("failed to install tracing subscriber: {_0}")]
    Telemetry(#[error(not(source))] String),
    #[display("cache storage is unavailable")]
    Storage,
    #[display("failed to set up project discovery")]
    Discovery,
    /// The provider failed; back off until the next poll.
    #[display("could not get content")]
    CouldNotContent,
    /// This project can never be posted; move on to the next one.
    #[display("post rejected; project skipped")]
    Rejected,
    /// The publisher gave up on its session.
    #[display("failed to publish")]
    Publish,
    #[display("failed to encode post")]
    Encode,
    #[display("cache cleanup failed")]
    Sweep,
}

impl ErrorKind {
    /// Returns `true` if the same session can simply try again on the next
    /// poll.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CouldNotContent | Self::Rejected)
    }
}
