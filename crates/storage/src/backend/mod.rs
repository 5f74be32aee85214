//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for key/value object storage (S3-compatible services in
//! production, an in-memory map in tests).
//!

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use crate::object::{Described, Metadata, Object, ObjectInfo};
use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt};
use std::pin::Pin;

pub type ObjectInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<ObjectInfo>> + Send + 'a>>;
pub type DescribedStream<'a> = Pin<Box<dyn Stream<Item = Result<ObjectInfo<Described>>> + Send + 'a>>;

/// Unified interface for object storage backends.
///
/// Every operation works on a single key and is expected to be atomic on its
/// own: a `write` either replaces body *and* metadata, or does nothing. There
/// are no multi-key transactions.
///
/// # Keys
/// All keys are relative to the backend's configured prefix and must be
/// validated using [`validate_key`](crate::validate_key) before use.
/// Implementations should enforce this validation.
///
/// # Examples
///
/// ```
/// use ossky_storage::{backend::StorageBackend, error::Result, Metadata};
///
/// async fn touch(backend: &dyn StorageBackend, key: &str) -> Result<()> {
///     if !backend.exists(key).await? {
///         backend.write(key, b"true", &Metadata::new()).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// List all objects matching an optional prefix.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream object listings matching an optional prefix.
    ///
    /// Listings are cheap and carry no user metadata. An error item does not
    /// necessarily end the stream; callers decide whether to stop or skip.
    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a>;

    /// Stream object listings together with their user metadata.
    ///
    /// The default implementation issues one [`stat()`](Self::stat) per
    /// listed object. Objects that vanish between listing and stat are
    /// skipped, any other failure is yielded as an error item for that
    /// object only.
    fn list_described_stream<'a>(&'a self, prefix: Option<&'a str>) -> DescribedStream<'a> {
        Box::pin(stream! {
            let mut listing = self.list_stream(prefix);
            while let Some(listed) = listing.next().await {
                let listed = match listed {
                    Ok(listed) => listed,
                    Err(e) => {
                        yield Err(e);
                        continue;
                    },
                };
                match self.stat(&listed.key).await {
                    Ok(described) => yield Ok(described),
                    Err(e) if e.is_not_found() => continue,
                    Err(e) => yield Err(e),
                }
            }
        })
    }

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Read an object's body and user metadata.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn read(&self, key: &str) -> Result<Object>;

    /// Write an object's body and user metadata in a single request.
    ///
    /// Creates a new object or overwrites an existing one. Previous metadata
    /// is replaced, not merged.
    async fn write(&self, key: &str, data: &[u8], metadata: &Metadata) -> Result<()>;

    /// Delete an object.
    ///
    /// Deleting an object that does not exist is **not** an error, matching
    /// the behaviour of S3-compatible services.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Get object details and user metadata without reading the body.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn stat(&self, key: &str) -> Result<ObjectInfo<Described>>;
}
