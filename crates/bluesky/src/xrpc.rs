//! Just enough XRPC to log in and create records.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_SERVICE: &str = "https://bsky.social";
const CREATE_SESSION: &str = "com.atproto.server.createSession";
const CREATE_RECORD: &str = "com.atproto.repo.createRecord";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body returned by XRPC endpoints. Both fields are optional in
/// practice, so neither is required here.
#[derive(Debug, Default, Deserialize)]
struct XrpcErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct CreateSessionInput<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub did: String,
    pub handle: String,
    access_jwt: String,
}

#[derive(Serialize)]
struct CreateRecordInput<'a, R> {
    repo: &'a str,
    collection: &'a str,
    record: &'a R,
}

/// Reference to a freshly created record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordRef {
    pub uri: String,
    pub cid: String,
}

/// Unauthenticated XRPC client for one PDS.
#[derive(Debug, Clone)]
pub struct XrpcClient {
    http: reqwest::Client,
    service: String,
}

impl XrpcClient {
    pub fn new(service: impl AsRef<str>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ossky/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .or_raise(|| ErrorKind::Other("failed to build HTTP client".to_string()))?;
        Ok(Self { http, service: service.as_ref().trim_end_matches('/').to_string() })
    }

    /// Log in with an app password.
    #[instrument(skip(self, password), fields(service = %self.service))]
    pub async fn login(self, identifier: &str, password: &str) -> Result<Agent> {
        let session: Session = self.procedure(CREATE_SESSION, None, &CreateSessionInput { identifier, password }).await?;
        tracing::info!(did = %session.did, handle = %session.handle, "Logged in to Bluesky");
        Ok(Agent { xrpc: self, session })
    }

    /// Call an XRPC procedure (HTTP POST with a JSON body).
    async fn procedure<I, O>(&self, nsid: &str, token: Option<&str>, input: &I) -> Result<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let mut request = self.http.post(format!("{}/xrpc/{nsid}", self.service)).json(input);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = ErrorKind::from_transport(&e);
                return Err(e).or_raise(|| kind);
            },
        };
        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                let kind = ErrorKind::from_transport(&e);
                return Err(e).or_raise(|| kind);
            },
        };
        if !status.is_success() {
            let error: XrpcErrorBody = serde_json::from_slice(&body).unwrap_or_default();
            tracing::debug!(nsid, status = status.as_u16(), code = %error.error, "XRPC call failed");
            exn::bail!(ErrorKind::from_response(status.as_u16(), error.error, error.message));
        }
        serde_json::from_slice(&body).or_raise(|| ErrorKind::Protocol {
            status: status.as_u16(),
            code: "InvalidResponse".to_string(),
            message: format!("unexpected response body from {nsid}"),
        })
    }
}

/// A logged-in client.
///
/// Dropping it is all it takes to "disconnect"; there is no server-side state
/// worth tearing down.
#[derive(Debug, Clone)]
pub struct Agent {
    xrpc: XrpcClient,
    session: Session,
}

impl Agent {
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Create a record in the logged-in account's repository.
    #[instrument(skip(self, record), fields(did = %self.session.did))]
    pub async fn create_record<R: Serialize + Sync>(&self, collection: &str, record: &R) -> Result<RecordRef> {
        let input = CreateRecordInput { repo: &self.session.did, collection, record };
        let created: RecordRef = self.xrpc.procedure(CREATE_RECORD, Some(&self.session.access_jwt), &input).await?;
        tracing::debug!(uri = %created.uri, "Record created");
        Ok(created)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) async fn mock_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.server.createSession"))
            .and(body_json(json!({ "identifier": "bot.example.com", "password": "app-password" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "did": "did:plc:bot",
                "handle": "bot.example.com",
                "accessJwt": "access-token",
                "refreshJwt": "refresh-token",
            })))
            .mount(server)
            .await;
    }

    pub(crate) async fn agent(server: &MockServer) -> Agent {
        XrpcClient::new(server.uri()).unwrap().login("bot.example.com", "app-password").await.unwrap()
    }

    #[tokio::test]
    async fn test_login() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        let agent = agent(&server).await;
        assert_eq!(agent.session().did, "did:plc:bot");
        assert_eq!(agent.session().handle, "bot.example.com");
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;
        Mock::given(path("/xrpc/com.atproto.server.createSession"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "AuthenticationRequired",
                "message": "Invalid identifier or password",
            })))
            .mount(&server)
            .await;
        let err = XrpcClient::new(server.uri()).unwrap().login("bot.example.com", "wrong").await.unwrap_err();
        assert_eq!(
            *err,
            ErrorKind::Unauthorized {
                status: 401,
                code: "AuthenticationRequired".to_string(),
                message: "Invalid identifier or password".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_create_record_is_authenticated() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.repo.createRecord"))
            .and(header("authorization", "Bearer access-token"))
            .and(body_json(json!({
                "repo": "did:plc:bot",
                "collection": "app.bsky.feed.post",
                "record": { "text": "hi" },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uri": "at://did:plc:bot/app.bsky.feed.post/1",
                "cid": "bafy",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = agent(&server).await.create_record("app.bsky.feed.post", &json!({ "text": "hi" })).await.unwrap();
        assert_eq!(created.uri, "at://did:plc:bot/app.bsky.feed.post/1");
    }

    #[tokio::test]
    async fn test_error_without_body() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(path("/xrpc/com.atproto.repo.createRecord"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;
        let err = agent(&server).await.create_record("app.bsky.feed.post", &json!({})).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Protocol { status: 502, code, .. } if code.is_empty()));
    }

    #[tokio::test]
    async fn test_invalid_success_body() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(path("/xrpc/com.atproto.repo.createRecord"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        let err = agent(&server).await.create_record("app.bsky.feed.post", &json!({})).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Protocol { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        // Nothing listens on port 1.
        let err = XrpcClient::new("http://127.0.0.1:1").unwrap().login("a", "b").await.unwrap_err();
        assert_eq!(*err, ErrorKind::Network { transient: true });
    }
}
