use async_trait::async_trait;

use crate::error::Result;

/// A project a provider thinks is worth announcing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Content {
    pub title: String,
    pub subtitle: String,
    pub url: String,
    /// Free-form extra lines. Providers use a few conventions the content
    /// step understands: `Author: @handle`, a line with a `⭐`, and a line
    /// of `#hashtags`.
    pub extra_data: Vec<String>,
}

/// Source of [`Content`].
///
/// Providers own their deduplication: once a project has been handed out,
/// it is not handed out again until the provider decides it may be.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// The next project to publish, or `None` when there is nothing new.
    async fn content_to_publish(&self) -> Result<Option<Content>>;
}
