/// Everything needed to announce one project.
///
/// Optional fields that are `None` or empty are left out of the post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub description: String,
    /// Canonical project link; the title is annotated as a link to it.
    pub url: String,
    /// `@handle`, linked to the matching GitHub profile.
    pub author: Option<String>,
    /// Pre-formatted display text, e.g. `"123 ⭐️"`.
    pub stargazers: Option<String>,
    /// Space-separated `#tokens`.
    pub hashtags: Option<String>,
}

impl PostDraft {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self { title: title.into(), url: url.into(), ..Self::default() }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_stargazers(mut self, stargazers: impl Into<String>) -> Self {
        self.stargazers = Some(stargazers.into());
        self
    }

    pub fn with_hashtags(mut self, hashtags: impl Into<String>) -> Self {
        self.hashtags = Some(hashtags.into());
        self
    }

    pub(crate) fn author(&self) -> Option<&str> {
        present(&self.author)
    }

    pub(crate) fn stargazers(&self) -> Option<&str> {
        present(&self.stargazers)
    }

    pub(crate) fn hashtags(&self) -> Option<&str> {
        present(&self.hashtags)
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
