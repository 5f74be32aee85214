//! In-memory storage backend for testing.

use super::ObjectInfoStream;
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::key::validate as validate_key;
use crate::object::{Described, Metadata, Object, ObjectInfo};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use time::OffsetDateTime;
use tokio::sync::RwLock;

struct Entry {
    modified: OffsetDateTime,
    data: Vec<u8>,
    metadata: Metadata,
}

/// In-memory storage backend for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Ideal
/// for unit tests that need a [`StorageBackend`] without network
/// dependencies.
///
/// Individual keys can be told to fail on `stat` or `delete`, to exercise
/// error handling in callers.
///
/// # Examples
///
/// ```
/// use ossky_storage::backend::{MockBackend, StorageBackend};
/// use ossky_storage::Metadata;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_objects([
///     ("github-golang/go", b"true", Metadata::new()),
/// ]);
/// assert!(backend.exists("github-golang/go").await?);
///
/// backend.write("github-rust-lang/rust", b"true", &Metadata::new()).await?;
/// assert!(backend.exists("github-rust-lang/rust").await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<String, Entry>>,
    failing_stat: RwLock<HashSet<String>>,
    failing_delete: RwLock<HashSet<String>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects.
    ///
    /// Panics if any key fails validation (e.g. prefix traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_objects(
        objects: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>, Metadata)>,
    ) -> Self {
        let mut map = HashMap::new();
        let now = OffsetDateTime::now_utc();
        for (key, data, metadata) in objects {
            let key = key.into();
            let Ok(validated) = validate_key(&key) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_objects: invalid key {key}");
            };
            map.insert(validated, Entry { modified: now, data: data.into(), metadata });
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            failing_stat: RwLock::default(),
            failing_delete: RwLock::default(),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every subsequent `stat` of `key` fail with a network error.
    pub async fn fail_stat(&self, key: impl Into<String>) {
        self.failing_stat.write().await.insert(key.into());
    }

    /// Make every subsequent `delete` of `key` fail with a network error.
    pub async fn fail_delete(&self, key: impl Into<String>) {
        self.failing_delete.write().await.insert(key.into());
    }

    /// Number of objects currently stored.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.storage.read().await.is_empty()
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let objects: [(&str, &[u8], Metadata); 0] = [];
        Self::with_objects(objects)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_key).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot matching entries under the read lock, then drop it
            // before yielding to avoid holding the lock across yield points.
            let mut entries: Vec<ObjectInfo> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(key, _)| match &validated_prefix {
                        Some(pfx) => key.starts_with(pfx.as_str()),
                        None => true,
                    })
                    .map(|(key, entry)| ObjectInfo::new(key.clone(), entry.data.len() as u64, entry.modified))
                    .collect()
            };
            // S3 lists in lexicographic key order; keep tests deterministic.
            entries.sort_by(|a, b| a.key.cmp(&b.key));
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let key = validate_key(key)?;
        Ok(self.storage.read().await.contains_key(&key))
    }

    async fn read(&self, key: &str) -> Result<Object> {
        let key = validate_key(key)?;
        let guard = self.storage.read().await;
        let entry = guard.get(&key).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.clone())))?;
        Ok(Object { data: entry.data.clone(), metadata: entry.metadata.clone() })
    }

    async fn write(&self, key: &str, data: &[u8], metadata: &Metadata) -> Result<()> {
        let key = validate_key(key)?;
        let entry = Entry {
            modified: OffsetDateTime::now_utc(),
            data: data.to_vec(),
            metadata: metadata.clone(),
        };
        self.storage.write().await.insert(key, entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = validate_key(key)?;
        if self.failing_delete.read().await.contains(&key) {
            exn::bail!(ErrorKind::Network(format!("injected delete failure for {key}")));
        }
        self.storage.write().await.remove(&key);
        Ok(())
    }

    async fn stat(&self, key: &str) -> Result<ObjectInfo<Described>> {
        let key = validate_key(key)?;
        if self.failing_stat.read().await.contains(&key) {
            exn::bail!(ErrorKind::Network(format!("injected stat failure for {key}")));
        }
        let guard = self.storage.read().await;
        let entry = guard.get(&key).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.clone())))?;
        Ok(ObjectInfo::new(key.clone(), entry.data.len() as u64, entry.modified).with_metadata(entry.metadata.clone()))
    }
}
