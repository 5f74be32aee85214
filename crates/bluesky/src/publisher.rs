use crate::classify::settle;
use crate::error::{ErrorKind, Result};
use crate::record::{DEFAULT_LANGS, POST_COLLECTION, PostRecord};
use crate::xrpc::Agent;
use async_trait::async_trait;
use exn::ResultExt;
use ossky_richtext::{EncoderOptions, PostDraft, encode};
use time::OffsetDateTime;
use tracing::instrument;

/// Something that can announce a project.
#[async_trait]
pub trait Publish: Send + Sync {
    /// Publish `draft`. Errors come back already classified (see
    /// [`settle`]): an `Err` means the session should be abandoned.
    async fn post(&self, draft: &PostDraft) -> Result<()>;
}

/// Publishes drafts as Bluesky posts through a logged-in [`Agent`].
pub struct Publisher {
    agent: Agent,
    options: EncoderOptions,
    langs: Vec<String>,
}

impl Publisher {
    pub fn new(agent: Agent) -> Self {
        Self {
            agent,
            options: EncoderOptions::default(),
            langs: DEFAULT_LANGS.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn with_options(mut self, options: EncoderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_langs(mut self, langs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.langs = langs.into_iter().map(Into::into).collect();
        self
    }

    async fn try_post(&self, draft: &PostDraft) -> Result<()> {
        let encoded = encode(draft, &self.options).or_raise(|| ErrorKind::Encode)?;
        let record = PostRecord::new(encoded, &self.langs, OffsetDateTime::now_utc())?;
        tracing::debug!(text = %record.text, facets = record.facets.len(), "Publishing post");
        let created = self.agent.create_record(POST_COLLECTION, &record).await?;
        tracing::info!(uri = %created.uri, title = %draft.title, "Published post");
        Ok(())
    }
}

#[async_trait]
impl Publish for Publisher {
    #[instrument(skip_all, fields(title = %draft.title, url = %draft.url))]
    async fn post(&self, draft: &PostDraft) -> Result<()> {
        settle(self.try_post(draft).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::tests::Captured;
    use crate::xrpc::tests::{agent, mock_login};
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CREATE_RECORD_PATH: &str = "/xrpc/com.atproto.repo.createRecord";

    fn draft() -> PostDraft {
        PostDraft::new("simple", "https://github.com/user/repo")
            .with_description("description")
            .with_author("@user")
            .with_stargazers("1 ⭐️")
            .with_hashtags("#go")
    }

    #[tokio::test]
    async fn test_post_sends_record() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(method("POST"))
            .and(path(CREATE_RECORD_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uri": "at://x/y/z", "cid": "c" })))
            .expect(1)
            .mount(&server)
            .await;

        Publisher::new(agent(&server).await).post(&draft()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let request = requests.iter().find(|r| r.url.path() == CREATE_RECORD_PATH).unwrap();
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["repo"], "did:plc:bot");
        assert_eq!(body["collection"], "app.bsky.feed.post");
        let record = &body["record"];
        assert_eq!(record["$type"], "app.bsky.feed.post");
        assert_eq!(record["text"], "simple by @user (1 ⭐️)\n\ndescription\n\n#go");
        assert_eq!(record["langs"], json!(["en-UK"]));
        assert_eq!(record["facets"].as_array().unwrap().len(), 3);
        assert!(record["createdAt"].as_str().unwrap().contains('T'));
    }

    #[tokio::test]
    async fn test_rate_limited_post_is_suppressed() {
        let logs = Captured::default();
        let _guard = logs.install();
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(path(CREATE_RECORD_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": "RateLimitExceeded",
                "message": "Rate Limit Exceeded",
            })))
            .mount(&server)
            .await;

        Publisher::new(agent(&server).await).post(&draft()).await.unwrap();
        assert!(logs.contents().contains("Rate limited"));
    }

    #[tokio::test]
    async fn test_expired_session_propagates() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(path(CREATE_RECORD_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "ExpiredToken",
                "message": "Token has expired",
            })))
            .mount(&server)
            .await;

        let err = Publisher::new(agent(&server).await).post(&draft()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unauthorized { code, .. } if code == "ExpiredToken"));
    }

    #[tokio::test]
    async fn test_unencodable_draft_is_not_sent() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(path(CREATE_RECORD_PATH)).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let draft = PostDraft::new("t".repeat(400), "https://github.com/user/repo");
        let err = Publisher::new(agent(&server).await).post(&draft).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Encode);
    }

    #[tokio::test]
    async fn test_custom_langs() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(path(CREATE_RECORD_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uri": "at://x/y/z", "cid": "c" })))
            .mount(&server)
            .await;

        Publisher::new(agent(&server).await).with_langs(["en", "de"]).post(&draft()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let request = requests.iter().find(|r| r.url.path() == CREATE_RECORD_PATH).unwrap();
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["record"]["langs"], json!(["en", "de"]));
    }
}
