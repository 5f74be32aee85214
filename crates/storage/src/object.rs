//! Object metadata returned by storage backends.

use std::collections::BTreeMap;
use std::ops::Deref;
use time::OffsetDateTime;

/// User-defined object metadata (`x-amz-meta-*` on S3-compatible services).
///
/// Keys are always lower-case; S3 normalizes them on the way in.
pub type Metadata = BTreeMap<String, String>;

// Listing an S3 bucket never returns user metadata, getting it costs one HEAD
// request per object. The typestate keeps "did we pay for that yet?" in the
// type, so the janitor can't accidentally inspect metadata it never fetched.

/// Object details common to every listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Key relative to the backend's prefix
    pub key: String,
    /// Body size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}

mod sealed {
    pub trait Sealed {}
}
pub trait MetadataState: sealed::Sealed {
    type Metadata;
}

/// Produced by enumeration; user metadata has not been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listed;
impl sealed::Sealed for Listed {}
impl MetadataState for Listed {
    type Metadata = ();
}

/// Produced by a stat/HEAD; user metadata is present (possibly empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Described;
impl sealed::Sealed for Described {}
impl MetadataState for Described {
    type Metadata = Metadata;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo<S: MetadataState = Listed> {
    meta: ObjectMeta,
    pub metadata: S::Metadata,
}
impl<S: MetadataState> ObjectInfo<S> {
    // Explicit version of self.deref()
    pub fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    pub fn into_meta(self) -> ObjectMeta {
        self.meta
    }
}
impl<S: MetadataState> Deref for ObjectInfo<S> {
    type Target = ObjectMeta;
    fn deref(&self) -> &ObjectMeta {
        &self.meta
    }
}

impl ObjectInfo {
    /// Create a new ObjectInfo from a listing operation (no metadata yet).
    pub fn new(key: impl Into<String>, size: u64, modified: OffsetDateTime) -> Self {
        ObjectMeta { key: key.into(), size, modified }.into()
    }

    pub fn with_metadata(self, metadata: Metadata) -> ObjectInfo<Described> {
        ObjectInfo { meta: self.meta, metadata }
    }
}
impl From<ObjectMeta> for ObjectInfo<Listed> {
    fn from(meta: ObjectMeta) -> Self {
        Self { meta, metadata: () }
    }
}

impl ObjectInfo<Described> {
    /// Look up a single user metadata value.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// An object body together with its user metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub data: Vec<u8>,
    pub metadata: Metadata,
}
