//! Bluesky Error Types
//!
//! Errors are classified once, where the HTTP response (or transport failure)
//! is first seen. Everything downstream, [`settle`](crate::settle) included,
//! only ever matches on the [`ErrorKind`]; nobody re-parses messages.

use derive_more::{Display, Error};

/// A publishing error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for publishing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What the caller should do about a failed call.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is bad (invalid or too large). Retrying the same
    /// request will fail the same way.
    #[display("malformed request ({status} {code}): {message}")]
    Malformed { status: u16, code: String, message: String },
    /// The session is not (or no longer) valid. Log in again.
    #[display("not authorized ({status} {code}): {message}")]
    Unauthorized { status: u16, code: String, message: String },
    /// Slow down; the next poll is soon enough.
    #[display("rate limited ({status} {code})")]
    RateLimited { status: u16, code: String },
    /// An XRPC error this client has no specific handling for.
    #[display("unrecognized XRPC error ({status} {code}): {message}")]
    Protocol { status: u16, code: String, message: String },
    /// The request never got a response. `transient` failures (timeouts,
    /// refused connections) are expected to clear up by themselves.
    #[display("network error")]
    Network { transient: bool },
    /// The post could not be turned into a record.
    #[display("failed to encode post")]
    Encode,
    #[display("{_0}")]
    Other(#[error(not(source))] String),
}

impl ErrorKind {
    /// Error codes the PDS uses for session problems, whatever the status.
    const UNAUTHORIZED_CODES: [&str; 4] = ["AuthenticationRequired", "ExpiredToken", "InvalidToken", "AccountTakedown"];
    const MALFORMED_CODES: [&str; 2] = ["InvalidRequest", "PayloadTooLarge"];
    const RATE_LIMITED_CODE: &str = "RateLimitExceeded";

    /// Classify a non-success XRPC response.
    pub fn from_response(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();
        if status == 429 || code == Self::RATE_LIMITED_CODE {
            Self::RateLimited { status, code }
        } else if matches!(status, 401 | 403) || Self::UNAUTHORIZED_CODES.contains(&code.as_str()) {
            Self::Unauthorized { status, code, message }
        } else if status == 413 || (status == 400 && Self::MALFORMED_CODES.contains(&code.as_str())) {
            Self::Malformed { status, code, message }
        } else {
            Self::Protocol { status, code, message }
        }
    }

    /// Classify a request that failed before a response arrived.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        Self::Network { transient: err.is_timeout() || err.is_connect() }
    }

    /// Returns `true` if retrying later might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network { transient: true })
    }
}
