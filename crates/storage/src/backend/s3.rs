//! S3-compatible storage backend.
//!
//! This module provides a storage backend implementation for S3-compatible
//! services including AWS S3, Backblaze B2, Tigris (Fly.io), MinIO and others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file or
//! environment; there is no credential chain lookup.

use crate::{
    StorageBackend,
    backend::ObjectInfoStream,
    error::{ErrorKind, Result},
    object::{Described, Metadata, Object, ObjectInfo},
    validate_key,
};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, http::HttpResponse, retry::RetryConfig},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::{get_object::GetObjectError, head_object::HeadObjectError},
    primitives::{ByteStream, DateTime},
};
use exn::{OptionExt, ResultExt};
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// The bot touches a handful of keys per poll; the janitor is the only
/// caller that fans out (one HEAD per listed object).
const DEFAULT_CONCURRENT_REQUESTS: usize = 16;

/// S3-compatible storage backend.
///
/// Stores objects in an S3 bucket, optionally under a key prefix. All keys
/// are relative to the configured prefix (if any).
///
/// # Examples
///
/// ```no_run
/// use ossky_storage::backend::S3Backend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "cache",
///     "golangoss-cache-bucket",
///     None,
///     "us-east-1",
///     Some("https://s3.example.com".to_string()),
///     "access_key_id",
///     "secret_access_key",
/// ).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in display/logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - Access key ID
    /// * `key_secret` - Secret access key
    pub async fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let region = Region::new(region.into());
        let credentials = Credentials::new(key_id, key_secret, None, None, "ossky-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Use path-style addressing for better compatibility with
            // S3-compatible services (MinIO, Backblaze, etc.)
            .force_path_style(true);
        // Set custom endpoint for non-AWS services
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Self::from_client(name, Client::from_conf(config_builder.build()), bucket, prefix)
    }

    /// Wrap an already configured S3 client.
    pub fn from_client(
        name: impl Into<String>,
        client: Client,
        bucket: impl Into<String>,
        prefix: Option<String>,
    ) -> Result<Self> {
        let prefix = prefix.map(validate_key).transpose()?;
        Ok(Self {
            name: name.into(),
            client,
            bucket: bucket.into(),
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    /// Make sure the configured bucket exists, creating it if necessary.
    pub async fn ensure_bucket(&self) -> Result<()> {
        let _permit = self.acquire_permit().await;
        if self.client.head_bucket().bucket(&self.bucket).send().await.is_ok() {
            return Ok(());
        }
        tracing::info!(bucket = %self.bucket, "Bucket not found; creating it");
        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(e) if matches!(e.code(), Some("BucketAlreadyOwnedByYou" | "BucketAlreadyExists")) => Ok(()),
            Err(e) => Err(exn::Exn::from(map_sdk_error(&e, &self.bucket))),
        }
    }

    /// Construct the full S3 key from a relative key.
    fn full_key(&self, key: &str) -> Result<String> {
        let validated = validate_key(key)?;
        Ok(match &self.prefix {
            Some(prefix) => format!("{prefix}/{validated}"),
            None => validated,
        })
    }

    /// Strip the configured prefix from an S3 key to get the relative key.
    fn relative_key(&self, key: &str) -> Result<String> {
        let relative = match &self.prefix {
            Some(prefix) => key.strip_prefix(prefix.as_str()).and_then(|s| s.strip_prefix('/')).unwrap_or(key),
            None => key,
        };
        validate_key(relative)
    }

    /// Prefix used for listing: the configured prefix joined with the
    /// caller's (unvalidated, because partial key prefixes are allowed).
    fn list_prefix(&self, prefix: Option<&str>) -> Option<String> {
        match (&self.prefix, prefix) {
            (Some(root), Some(p)) => Some(format!("{root}/{}", p.trim_start_matches('/'))),
            (Some(root), None) => Some(format!("{root}/")),
            (None, Some(p)) => Some(p.trim_start_matches('/').to_string()),
            (None, None) => None,
        }
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> OwnedSemaphorePermit {
        // unwrap is safe: semaphore is never closed
        self.rate_limiter.clone().acquire_owned().await.unwrap()
    }

    /// Convert AWS DateTime to OffsetDateTime.
    fn parse_datetime(dt: &DateTime) -> Result<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos())
            .or_raise(|| ErrorKind::BackendError("S3 datetime out of range".to_string()))
    }

    fn modified(dt: Option<&DateTime>) -> Result<OffsetDateTime> {
        dt.map(Self::parse_datetime).transpose().map(|dt| dt.unwrap_or(OffsetDateTime::UNIX_EPOCH))
    }

    fn metadata(raw: Option<&HashMap<String, String>>) -> Metadata {
        raw.map(|m| m.iter().map(|(k, v)| (k.to_ascii_lowercase(), v.clone())).collect()).unwrap_or_default()
    }
}

/// Map an SDK failure onto an actionable storage error.
fn map_sdk_error<E>(err: &SdkError<E, HttpResponse>, key: &str) -> ErrorKind
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            ErrorKind::Network(DisplayErrorContext(err).to_string())
        },
        SdkError::ServiceError(service) => {
            let status = service.raw().status().as_u16();
            match (service.err().code(), status) {
                (Some("NoSuchKey" | "NotFound"), _) | (_, 404) => ErrorKind::NotFound(key.to_string()),
                (Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"), _) | (_, 401 | 403) => {
                    ErrorKind::PermissionDenied(key.to_string())
                },
                _ => ErrorKind::BackendError(DisplayErrorContext(err).to_string()),
            }
        },
        _ => ErrorKind::BackendError(DisplayErrorContext(err).to_string()),
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a> {
        let list_prefix = self.list_prefix(prefix);
        Box::pin(stream! {
            let mut pages = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_prefix(list_prefix.clone())
                .into_paginator()
                .send();
            loop {
                let page = {
                    let _permit = self.acquire_permit().await;
                    pages.next().await
                };
                let page = match page {
                    Some(Ok(page)) => page,
                    Some(Err(e)) => {
                        // A failed page can't be resumed; report it and stop.
                        yield Err(exn::Exn::from(map_sdk_error(&e, list_prefix.as_deref().unwrap_or(""))));
                        break;
                    },
                    None => break,
                };
                for object in page.contents() {
                    let Some(full_key) = object.key() else { continue };
                    let info = self.relative_key(full_key).and_then(|key| {
                        let size = u64::try_from(object.size().unwrap_or_default()).unwrap_or_default();
                        Ok(ObjectInfo::new(key, size, Self::modified(object.last_modified())?))
                    });
                    yield info;
                }
            }
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.stat(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip(self), fields(backend = %self.name))]
    async fn read(&self, key: &str) -> Result<Object> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(GetObjectError::NoSuchKey(_)) => exn::Exn::from(ErrorKind::NotFound(key.to_string())),
                _ => exn::Exn::from(map_sdk_error(&e, key)),
            })?;
        let metadata = Self::metadata(output.metadata());
        let data = output
            .body
            .collect()
            .await
            .or_raise(|| ErrorKind::Network(format!("failed to read body of {key}")))?
            .into_bytes()
            .to_vec();
        Ok(Object { data, metadata })
    }

    #[tracing::instrument(skip(self, data, metadata), fields(backend = %self.name, bytes = data.len()))]
    async fn write(&self, key: &str, data: &[u8], metadata: &Metadata) -> Result<()> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await;
        let metadata: HashMap<String, String> = metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .content_type("application/json")
            .set_metadata(Some(metadata))
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| exn::Exn::from(map_sdk_error(&e, key)))?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(backend = %self.name))]
    async fn delete(&self, key: &str) -> Result<()> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await;
        match self.client.delete_object().bucket(&self.bucket).key(&full_key).send().await {
            Ok(_) => Ok(()),
            // Some S3-compatible services answer 404 instead of 204.
            Err(e) => match map_sdk_error(&e, key) {
                ErrorKind::NotFound(_) => Ok(()),
                other => Err(exn::Exn::from(other)),
            },
        }
    }

    async fn stat(&self, key: &str) -> Result<ObjectInfo<Described>> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await;
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(HeadObjectError::NotFound(_)) => exn::Exn::from(ErrorKind::NotFound(key.to_string())),
                _ => exn::Exn::from(map_sdk_error(&e, key)),
            })?;
        let size = output.content_length().and_then(|len| u64::try_from(len).ok()).ok_or_raise(|| {
            ErrorKind::BackendError(format!("missing content length for {key}"))
        })?;
        let modified = Self::modified(output.last_modified())?;
        Ok(ObjectInfo::new(validate_key(key)?, size, modified).with_metadata(Self::metadata(output.metadata())))
    }
}
