//! Object-store backed cache with per-entry expiry.
//!
//! Each cache entry is one object in the store: the body is the JSON-encoded
//! value and the expiry lives in the object's user metadata under
//! [`EXPIRES_AT`]. There is no separate index; the store itself is the source
//! of truth.
//!
//! # Architecture
//! - [`ExpiringStore`] implements the [`Cache`] capability and enforces
//!   expiry lazily, on read.
//! - [`Janitor`] is a background task that walks the namespace on a fixed
//!   interval and deletes expired and orphaned objects.

pub mod error;
mod expiry;
mod janitor;
mod store;
mod value;

pub use crate::expiry::EXPIRES_AT;
pub use crate::janitor::{DEFAULT_CLEANUP_INTERVAL, Janitor, JanitorHandle, SweepReport};
pub use crate::store::{DEFAULT_TTL, ExpiringStore};
pub use crate::value::CacheValue;
use async_trait::async_trait;
use std::time::Duration;

/// Cache contract consumed by content providers.
///
/// A miss, whether the key was never set or has expired, is `Ok(None)`.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Store `value` under `key` for `ttl`. A zero `ttl` means the store's
    /// default TTL.
    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> error::Result<()>;

    async fn get(&self, key: &str) -> error::Result<Option<CacheValue>>;

    /// [`get`](Self::get), with booleans rendered as `"true"`/`"false"`.
    async fn get_string(&self, key: &str) -> error::Result<Option<String>> {
        Ok(self.get(key).await?.map(CacheValue::into_string))
    }

    /// Remove `key`. Removing an absent key succeeds.
    async fn del(&self, key: &str) -> error::Result<()>;

    /// Key enumeration is not supported; this never calls `visitor`.
    async fn scan(
        &self,
        _prefix: &str,
        _visitor: &mut (dyn FnMut(&str) -> error::Result<()> + Send),
    ) -> error::Result<()> {
        Ok(())
    }
}
