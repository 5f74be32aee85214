use crate::error::{ErrorKind, Result};

/// Decide what a failed publish attempt means for the caller.
///
/// Rate limiting and transient network failures are logged and swallowed:
/// the caller's regular polling interval is the back-off. Everything else is
/// logged at the level it deserves and handed back, so the caller can drop
/// the session and reconnect.
///
/// `Ok(())` therefore means "nothing for the caller to do", not "the post
/// went out".
pub fn settle(result: Result<()>) -> Result<()> {
    let Err(err) = result else {
        return Ok(());
    };
    let suppress = match &*err {
        ErrorKind::RateLimited { status, code } => {
            tracing::info!(status, code = %code, "Rate limited by Bluesky; waiting for the next poll");
            true
        },
        ErrorKind::Network { transient: true } => {
            tracing::info!(error = ?err, "Temporary network failure; waiting for the next poll");
            true
        },
        ErrorKind::Malformed { status, code, message } => {
            tracing::warn!(status, code = %code, message = %message, "Bluesky rejected the post as malformed");
            false
        },
        ErrorKind::Unauthorized { status, code, message } => {
            tracing::error!(status, code = %code, message = %message, "Bluesky session is not authorized");
            false
        },
        ErrorKind::Protocol { status, code, message } => {
            tracing::error!(status, code = %code, message = %message, "Unrecognized XRPC error");
            false
        },
        ErrorKind::Network { transient: false } | ErrorKind::Encode | ErrorKind::Other(_) => {
            tracing::error!(error = ?err, "Failed to publish post");
            false
        },
    };
    match suppress {
        true => Ok(()),
        false => Err(err),
    }
}
