//! Project discovery through the GitHub repository search API.

use crate::content::{Content, ContentProvider};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use ossky_cache::{Cache, CacheValue};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
/// How long a published project stays off the table.
pub const DEFAULT_REPUBLISH_AFTER: Duration = Duration::from_secs(30 * 24 * 60 * 60);
const CACHE_KEY_PREFIX: &str = "github-";
const PER_PAGE: u8 = 50;
const MAX_TOPICS: usize = 3;
/// Longest hashtag line; topics that would push past it are left out.
const MAX_HASHTAG_BYTES: usize = 80;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
    name: String,
    owner: Owner,
    html_url: String,
    description: Option<String>,
    stargazers_count: u64,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    fork: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Search filters for [`GithubProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubQuery {
    pub language: String,
    pub min_stars: u32,
}

impl GithubQuery {
    fn to_search(&self) -> String {
        format!("language:{} stars:>={}", self.language, self.min_stars)
    }
}

impl Default for GithubQuery {
    fn default() -> Self {
        Self { language: "go".to_string(), min_stars: 100 }
    }
}

/// Picks recently updated repositories in one language, one at a time,
/// skipping anything announced within the last `republish_after`.
pub struct GithubProvider {
    http: reqwest::Client,
    api_base: String,
    token: String,
    query: GithubQuery,
    republish_after: Duration,
    cache: Arc<dyn Cache>,
}

impl GithubProvider {
    pub fn new(token: impl Into<String>, query: GithubQuery, cache: Arc<dyn Cache>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ossky/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .or_raise(|| ErrorKind::Client)?;
        Ok(Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            query,
            republish_after: DEFAULT_REPUBLISH_AFTER,
            cache,
        })
    }

    pub fn with_api_base(mut self, api_base: impl AsRef<str>) -> Self {
        self.api_base = api_base.as_ref().trim_end_matches('/').to_string();
        self
    }

    pub fn with_republish_after(mut self, republish_after: Duration) -> Self {
        self.republish_after = republish_after;
        self
    }

    async fn search(&self) -> Result<Vec<Repository>> {
        let per_page = PER_PAGE.to_string();
        let mut request = self
            .http
            .get(format!("{}/search/repositories", self.api_base))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .query(&[
                ("q", self.query.to_search().as_str()),
                ("sort", "updated"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ]);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let transient = e.is_timeout() || e.is_connect();
                return Err(e).or_raise(|| ErrorKind::Request { transient });
            },
        };
        let status = response.status();
        if !status.is_success() {
            let error: ApiError = response.json().await.unwrap_or_default();
            exn::bail!(ErrorKind::Api { status: status.as_u16(), message: error.message });
        }
        let results: SearchResponse = response.json().await.or_raise(|| ErrorKind::Decode)?;
        Ok(results.items)
    }

    fn content(&self, repo: Repository) -> Content {
        let language = hashtag(&self.query.language);
        let topics = repo
            .topics
            .iter()
            .filter_map(|topic| hashtag(topic))
            .filter(|tag| Some(tag) != language.as_ref());
        let mut line = language.clone().unwrap_or_default();
        for tag in topics.take(MAX_TOPICS) {
            let separator = usize::from(!line.is_empty());
            if line.len() + separator + tag.len() > MAX_HASHTAG_BYTES {
                continue;
            }
            if separator == 1 {
                line.push(' ');
            }
            line.push_str(&tag);
        }

        let mut extra_data = vec![format!("Author: @{}", repo.owner.login), format!("⭐️ {}", repo.stargazers_count)];
        if !line.is_empty() {
            extra_data.push(line);
        }
        Content {
            title: repo.name,
            subtitle: repo.description.unwrap_or_default(),
            url: repo.html_url,
            extra_data,
        }
    }
}

#[async_trait]
impl ContentProvider for GithubProvider {
    #[instrument(skip(self), fields(language = %self.query.language))]
    async fn content_to_publish(&self) -> Result<Option<Content>> {
        let repositories = self.search().await?;
        tracing::debug!(candidates = repositories.len(), "Searched GitHub");
        for repo in repositories {
            if repo.archived || repo.fork {
                continue;
            }
            let key = cache_key(&repo.full_name);
            if self.cache.get(&key).await.or_raise(|| ErrorKind::Cache)?.is_some() {
                tracing::trace!(%key, "Already published");
                continue;
            }
            self.cache
                .set(&key, CacheValue::Bool(true), self.republish_after)
                .await
                .or_raise(|| ErrorKind::Cache)?;
            tracing::info!(repository = %repo.full_name, stars = repo.stargazers_count, "Found project to publish");
            return Ok(Some(self.content(repo)));
        }
        Ok(None)
    }
}

pub fn cache_key(full_name: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{full_name}")
}

/// `#word` from free text, or `None` if nothing usable is left.
fn hashtag(word: &str) -> Option<String> {
    let cleaned: String = word
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(*c, '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect();
    match cleaned.is_empty() {
        true => None,
        false => Some(format!("#{cleaned}")),
    }
}
