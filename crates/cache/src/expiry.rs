//! The `expires-at` metadata convention.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use ossky_storage::Metadata;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// User metadata key holding each entry's RFC 3339 expiry timestamp.
pub const EXPIRES_AT: &str = "expires-at";

/// What an object's metadata says about its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expiry {
    /// No `expires-at` key at all. Every `set` writes one, so the object
    /// didn't come from us.
    Missing,
    /// The key is there but isn't RFC 3339.
    Invalid(String),
    At(OffsetDateTime),
}

impl Expiry {
    pub(crate) fn from_metadata(metadata: &Metadata) -> Self {
        match metadata.get(EXPIRES_AT) {
            None => Self::Missing,
            Some(raw) => match OffsetDateTime::parse(raw, &Rfc3339) {
                Ok(at) => Self::At(at),
                Err(_) => Self::Invalid(raw.clone()),
            },
        }
    }

    /// Only a parseable timestamp that has been reached counts as expired.
    pub(crate) fn has_passed(&self, now: OffsetDateTime) -> bool {
        matches!(self, Self::At(at) if *at <= now)
    }
}

/// Build the metadata for an entry expiring at `at`.
pub(crate) fn metadata(at: OffsetDateTime) -> Result<Metadata> {
    let formatted = at.format(&Rfc3339).or_raise(|| ErrorKind::Timestamp)?;
    Ok(Metadata::from([(EXPIRES_AT.to_string(), formatted)]))
}
