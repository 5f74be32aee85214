use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use ossky_richtext::{EncodedPost, Facet};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const POST_COLLECTION: &str = "app.bsky.feed.post";
pub const DEFAULT_LANGS: [&str; 1] = ["en-UK"];

/// An `app.bsky.feed.post` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(rename = "$type")]
    record_type: &'static str,
    pub text: String,
    pub created_at: String,
    pub langs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<Facet>,
}

impl PostRecord {
    pub fn new(post: EncodedPost, langs: &[String], created_at: OffsetDateTime) -> Result<Self> {
        Ok(Self {
            record_type: POST_COLLECTION,
            text: post.text,
            created_at: created_at.format(&Rfc3339).or_raise(|| ErrorKind::Encode)?,
            langs: langs.to_vec(),
            facets: post.facets,
        })
    }
}
