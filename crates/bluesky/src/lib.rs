//! Publishing to Bluesky.
//!
//! A deliberately small slice of the AT Protocol: log in with an app
//! password, then create `app.bsky.feed.post` records. Every failure is
//! classified into an [`ErrorKind`](error::ErrorKind) at the HTTP boundary
//! and [`settle`] decides which of them the caller needs to hear about.

mod classify;
pub mod error;
mod publisher;
mod record;
mod xrpc;

pub use crate::classify::settle;
pub use crate::publisher::{Publish, Publisher};
pub use crate::record::{DEFAULT_LANGS, POST_COLLECTION, PostRecord};
pub use crate::xrpc::{Agent, DEFAULT_SERVICE, RecordRef, Session, XrpcClient};
