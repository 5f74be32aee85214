use crate::Cache;
use crate::error::{ErrorKind, Result};
use crate::expiry::{self, Expiry};
use crate::value::CacheValue;
use async_trait::async_trait;
use exn::ResultExt;
use ossky_storage::BackendHandle;
use serde::Serialize;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::instrument;

/// TTL substituted when `set` is called with a zero duration.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Key/value cache stored as one object per key, expiry kept in the
/// object's `expires-at` metadata.
///
/// Expiry is enforced twice: lazily here on every read, and eventually by
/// the [`Janitor`](crate::Janitor) sweeping the whole namespace. A reader
/// never sees an expired entry, whether or not the janitor got to it yet.
#[derive(Clone)]
pub struct ExpiringStore {
    backend: BackendHandle,
    default_ttl: Duration,
}

impl ExpiringStore {
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend, default_ttl: DEFAULT_TTL }
    }

    /// Override the TTL used when `set` is given a zero duration.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Store any JSON-serializable value under `key` for `ttl` (or the
    /// default TTL when `ttl` is zero).
    ///
    /// Body and expiry metadata go out in a single write, so a failed call
    /// leaves either the previous entry or nothing.
    #[instrument(skip(self, value), fields(backend = self.backend.name()))]
    pub async fn set_json<T: Serialize + ?Sized + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let body = serde_json::to_vec(value).or_raise(|| ErrorKind::Serialize(key.to_string()))?;
        let ttl = match ttl.is_zero() {
            true => self.default_ttl,
            false => ttl,
        };
        let metadata = expiry::metadata(OffsetDateTime::now_utc() + ttl)?;
        self.backend.write(key, &body, &metadata).await.or_raise(|| ErrorKind::Storage)?;
        tracing::debug!(key, ttl_secs = ttl.as_secs(), "Cache entry stored");
        Ok(())
    }

    /// Remove an expired entry on the read path. Failure only means the
    /// janitor will have to do it later.
    async fn evict(&self, key: &str) {
        if let Err(e) = self.backend.delete(key).await {
            tracing::debug!(key, error = %e, "Failed to evict expired cache entry; leaving it for the janitor");
        }
    }
}

#[async_trait]
impl Cache for ExpiringStore {
    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()> {
        self.set_json(key, &value, ttl).await
    }

    #[instrument(skip(self), fields(backend = self.backend.name()))]
    async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        let object = match self.backend.read(key).await {
            Ok(object) => object,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Storage),
        };
        match Expiry::from_metadata(&object.metadata) {
            expiry if expiry.has_passed(OffsetDateTime::now_utc()) => {
                tracing::debug!(key, "Cache entry expired");
                self.evict(key).await;
                return Ok(None);
            },
            Expiry::Invalid(raw) => {
                tracing::warn!(key, value = %raw, "Cache entry has unparseable expiry; treating as live");
            },
            // Orphans are the janitor's problem; on the read path the value
            // is still the best answer we have.
            Expiry::Missing | Expiry::At(_) => {},
        }
        CacheValue::from_json(key, &object.data).map(Some)
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.backend.delete(key).await.or_raise(|| ErrorKind::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiry::EXPIRES_AT;
    use ossky_storage::backend::MockBackend;
    use ossky_storage::{Metadata, StorageBackend};
    use std::sync::Arc;

    fn store() -> (Arc<MockBackend>, ExpiringStore) {
        let mock = Arc::new(MockBackend::default());
        (mock.clone(), ExpiringStore::new(mock))
    }

    fn expires_at(raw: &str) -> Metadata {
        Metadata::from([(EXPIRES_AT.to_string(), raw.to_string())])
    }

    async fn expiry_of(mock: &MockBackend, key: &str) -> OffsetDateTime {
        let object = mock.read(key).await.unwrap();
        match Expiry::from_metadata(&object.metadata) {
            Expiry::At(at) => at,
            other => panic!("unexpected expiry: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (_, store) = store();
        store.set("github-golang/go", true.into(), Duration::from_secs(60)).await.unwrap();
        store.set("note", "hello".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("github-golang/go").await.unwrap(), Some(CacheValue::Bool(true)));
        assert_eq!(store.get_string("github-golang/go").await.unwrap().as_deref(), Some("true"));
        assert_eq!(store.get_string("note").await.unwrap().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_set_writes_expiry_metadata() {
        let (mock, store) = store();
        let before = OffsetDateTime::now_utc();
        store.set("key", true.into(), Duration::from_secs(3600)).await.unwrap();
        let at = expiry_of(&mock, "key").await;
        // RFC 3339 output has second precision in the common case; allow slack.
        assert!(at >= before + Duration::from_secs(3599));
        assert!(at <= OffsetDateTime::now_utc() + Duration::from_secs(3601));
    }

    #[tokio::test]
    async fn test_zero_ttl_uses_default() {
        let (mock, store) = store();
        let store = store.with_default_ttl(Duration::from_secs(7200));
        let before = OffsetDateTime::now_utc();
        store.set("key", true.into(), Duration::ZERO).await.unwrap();
        let at = expiry_of(&mock, "key").await;
        assert!(at >= before + Duration::from_secs(7199));
        assert!(at <= OffsetDateTime::now_utc() + Duration::from_secs(7201));
        assert_eq!(store.get("key").await.unwrap(), Some(CacheValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (_, store) = store();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss_and_is_removed() {
        let mock = Arc::new(MockBackend::with_objects([("old", b"true".to_vec(), expires_at("2001-01-01T00:00:00Z"))]));
        let store = ExpiringStore::new(mock.clone());
        assert_eq!(store.get("old").await.unwrap(), None);
        assert!(!mock.exists("old").await.unwrap());
    }

    #[tokio::test]
    async fn test_short_ttl_expires_without_janitor() {
        let (_, store) = store();
        store.set("blink", true.into(), Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("blink").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_eviction_is_swallowed() {
        let mock = Arc::new(MockBackend::with_objects([("old", b"true".to_vec(), expires_at("2001-01-01T00:00:00Z"))]));
        mock.fail_delete("old").await;
        let store = ExpiringStore::new(mock.clone());
        assert_eq!(store.get("old").await.unwrap(), None);
        assert!(mock.exists("old").await.unwrap());
    }

    #[tokio::test]
    async fn test_unsupported_value_fails_loudly() {
        let (_, store) = store();
        store.set_json("numbers", &[1, 2, 3], Duration::from_secs(60)).await.unwrap();
        let err = store.get("numbers").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedValue { found: "array", .. }));
    }

    #[tokio::test]
    async fn test_missing_or_invalid_metadata_still_readable() {
        let mock = Arc::new(MockBackend::with_objects([
            ("bare", b"true".to_vec(), Metadata::new()),
            ("garbled", b"\"x\"".to_vec(), expires_at("not a date")),
        ]));
        let store = ExpiringStore::new(mock);
        assert_eq!(store.get("bare").await.unwrap(), Some(CacheValue::Bool(true)));
        assert_eq!(store.get("garbled").await.unwrap(), Some(CacheValue::from("x")));
    }

    #[tokio::test]
    async fn test_del_is_idempotent() {
        let (mock, store) = store();
        store.set("key", true.into(), Duration::from_secs(60)).await.unwrap();
        store.del("key").await.unwrap();
        store.del("key").await.unwrap();
        store.del("never-existed").await.unwrap();
        assert!(mock.is_empty().await);
    }

    #[tokio::test]
    async fn test_overwrite_refreshes_expiry() {
        let mock = Arc::new(MockBackend::with_objects([("key", b"false".to_vec(), expires_at("2001-01-01T00:00:00Z"))]));
        let store = ExpiringStore::new(mock);
        store.set("key", true.into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("key").await.unwrap(), Some(CacheValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_scan_is_a_noop() {
        let (_, store) = store();
        store.set("key", true.into(), Duration::from_secs(60)).await.unwrap();
        let mut visited = 0;
        store
            .scan("", &mut |_key| {
                visited += 1;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(visited, 0);
    }
}
