//! GitHub contents API backend.
//!
//! Files travel base64-encoded inside a JSON envelope; the blob SHA is the
//! version token. Files above the API's inline limit come back without
//! content and are fetched from their `download_url` instead.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use super::{DocumentStore, StoreError, StoredFile, VersionToken};

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Connection settings for one repository.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub branch: Option<String>,
    pub api_base: String,
    pub user_agent: String,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitHubErrorBody {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GitHubContentStore {
    client: Client,
    config: GitHubConfig,
}

impl GitHubContentStore {
    pub fn new(config: GitHubConfig) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn contents_url(&self, key: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            key.trim_start_matches('/')
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(AUTHORIZATION, format!("token {}", self.config.token))
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(USER_AGENT, &self.config.user_agent)
    }

    async fn api_error(response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GitHubErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(body);
        StoreError::Api { status, message }
    }

    /// Follow `download_url` for files the contents endpoint would not inline.
    async fn download(&self, key: &str, url: Option<&str>) -> Result<Vec<u8>, StoreError> {
        let unavailable = || StoreError::ContentUnavailable {
            key: key.to_string(),
        };
        let url = url.ok_or_else(unavailable)?;

        let response = match self.authorized(self.client.get(url)).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Large content download failed");
                return Err(unavailable());
            }
        };
        if !response.status().is_success() {
            tracing::error!(key = %key, status = %response.status(), "Large content download rejected");
            return Err(unavailable());
        }
        match response.bytes().await {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Large content body unreadable");
                Err(unavailable())
            }
        }
    }
}

/// GitHub wraps base64 at 60 columns.
fn decode_base64(content: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact)
}

#[async_trait]
impl DocumentStore for GitHubContentStore {
    async fn fetch(&self, key: &str) -> Result<Option<StoredFile>, StoreError> {
        let mut request = self.authorized(self.client.get(self.contents_url(key)));
        if let Some(branch) = &self.config.branch {
            request = request.query(&[("ref", branch)]);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let err = Self::api_error(response).await;
            tracing::error!(key = %key, error = %err, "GitHub read failed");
            return Err(err);
        }

        let body: ContentsResponse = response.json().await?;
        let inline = body
            .content
            .as_deref()
            .filter(|c| !c.trim().is_empty() && body.encoding.as_deref() != Some("none"));

        let content = match inline {
            Some(encoded) => decode_base64(encoded).map_err(|e| StoreError::Undecodable {
                key: key.to_string(),
                version: VersionToken::new(body.sha.clone()),
                reason: e.to_string(),
            })?,
            None if body.size > 0 => {
                tracing::debug!(key = %key, size = body.size, "Content not inlined, downloading");
                self.download(key, body.download_url.as_deref()).await?
            }
            None => Vec::new(),
        };

        Ok(Some(StoredFile {
            content,
            version: VersionToken::new(body.sha),
        }))
    }

    async fn put(
        &self,
        key: &str,
        content: &[u8],
        version: Option<&VersionToken>,
        message: &str,
    ) -> Result<VersionToken, StoreError> {
        let body = PutRequest {
            message,
            content: STANDARD.encode(content),
            sha: version.map(VersionToken::as_str),
            branch: self.config.branch.as_deref(),
        };

        let response = self
            .authorized(self.client.put(self.contents_url(key)))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        // 422 without a sha means the file appeared after our read.
        if status == StatusCode::CONFLICT
            || (status == StatusCode::UNPROCESSABLE_ENTITY && version.is_none())
        {
            tracing::warn!(key = %key, status = %status, "GitHub rejected stale write");
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }
        if !status.is_success() {
            let err = Self::api_error(response).await;
            tracing::error!(key = %key, error = %err, "GitHub write failed");
            return Err(err);
        }

        let committed: PutResponse = response.json().await?;
        tracing::info!(key = %key, sha = %committed.content.sha, "Committed to GitHub");
        Ok(VersionToken::new(committed.content.sha))
    }

    fn name(&self) -> &str {
        "github"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOC: &str = "data/summaries.json";
    const DOC_PATH: &str = "/repos/owner/diary/contents/data/summaries.json";

    fn store_for(server: &MockServer, branch: Option<&str>) -> GitHubContentStore {
        GitHubContentStore::new(GitHubConfig {
            token: "test-token".to_string(),
            owner: "owner".to_string(),
            repo: "diary".to_string(),
            branch: branch.map(str::to_string),
            api_base: server.uri(),
            user_agent: "nikki-test".to_string(),
            timeout: Duration::from_secs(5),
        })
        .expect("client")
    }

    #[tokio::test]
    async fn fetch_returns_none_on_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOC_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "message": "Not Found"
            })))
            .mount(&server)
            .await;

        let result = store_for(&server, None).fetch(DOC).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn fetch_decodes_wrapped_base64_and_sends_auth_headers() {
        let server = MockServer::start().await;
        let encoded = STANDARD.encode(r#"{"entries":[],"checkins":[]}"#);
        let wrapped = format!("{}\n{}\n", &encoded[..10], &encoded[10..]);

        Mock::given(method("GET"))
            .and(path(DOC_PATH))
            .and(header("authorization", "token test-token"))
            .and(header("accept", GITHUB_ACCEPT))
            .and(header("user-agent", "nikki-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sha": "abc123",
                "size": 28,
                "encoding": "base64",
                "content": wrapped,
            })))
            .mount(&server)
            .await;

        let file = store_for(&server, None).fetch(DOC).await.unwrap().unwrap();
        assert_eq!(file.version.as_str(), "abc123");
        assert_eq!(file.content, br#"{"entries":[],"checkins":[]}"#);
    }

    #[tokio::test]
    async fn fetch_passes_branch_as_ref() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOC_PATH))
            .and(query_param("ref", "data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sha": "on-branch",
                "size": 2,
                "encoding": "base64",
                "content": STANDARD.encode("[]"),
            })))
            .mount(&server)
            .await;

        let file = store_for(&server, Some("data")).fetch(DOC).await.unwrap().unwrap();
        assert_eq!(file.version.as_str(), "on-branch");
    }

    #[tokio::test]
    async fn fetch_follows_download_url_for_large_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOC_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sha": "big",
                "size": 2_000_000,
                "encoding": "none",
                "content": "",
                "download_url": format!("{}/raw/summaries.json", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/raw/summaries.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let file = store_for(&server, None).fetch(DOC).await.unwrap().unwrap();
        assert_eq!(file.content, b"[]");
        assert_eq!(file.version.as_str(), "big");
    }

    #[tokio::test]
    async fn fetch_reports_content_unavailable_when_download_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOC_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sha": "big",
                "size": 2_000_000,
                "content": "",
                "download_url": format!("{}/raw/summaries.json", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/raw/summaries.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = store_for(&server, None).fetch(DOC).await.unwrap_err();
        assert!(matches!(err, StoreError::ContentUnavailable { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn fetch_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "message": "Bad credentials"
            })))
            .mount(&server)
            .await;

        match store_for(&server, None).fetch(DOC).await {
            Err(StoreError::Api { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "Bad credentials");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_reports_undecodable_content_with_its_sha() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOC_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sha": "broken-blob",
                "size": 12,
                "encoding": "base64",
                "content": "!!not base64!!",
            })))
            .mount(&server)
            .await;

        match store_for(&server, None).fetch(DOC).await {
            Err(StoreError::Undecodable { key, version, .. }) => {
                assert_eq!(key, DOC);
                assert_eq!(version.as_str(), "broken-blob");
            }
            other => panic!("Expected Undecodable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn put_sends_sha_and_base64_content() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(DOC_PATH))
            .and(body_json(serde_json::json!({
                "message": "add entry",
                "content": STANDARD.encode("[]"),
                "sha": "old-sha",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": { "sha": "new-sha" },
                "commit": { "sha": "commit-sha" }
            })))
            .mount(&server)
            .await;

        let version = store_for(&server, None)
            .put(DOC, b"[]", Some(&VersionToken::new("old-sha")), "add entry")
            .await
            .unwrap();
        assert_eq!(version.as_str(), "new-sha");
    }

    #[tokio::test]
    async fn put_without_token_omits_sha() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(DOC_PATH))
            .and(body_json(serde_json::json!({
                "message": "create",
                "content": STANDARD.encode("{}"),
                "branch": "data",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "content": { "sha": "first" }
            })))
            .mount(&server)
            .await;

        let version = store_for(&server, Some("data"))
            .put(DOC, b"{}", None, "create")
            .await
            .unwrap();
        assert_eq!(version.as_str(), "first");
    }

    #[tokio::test]
    async fn put_maps_409_to_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "message": "data/summaries.json does not match old-sha"
            })))
            .mount(&server)
            .await;

        let err = store_for(&server, None)
            .put(DOC, b"[]", Some(&VersionToken::new("old-sha")), "update")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn put_maps_422_without_token_to_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "message": "Invalid request.\n\n\"sha\" wasn't supplied."
            })))
            .mount(&server)
            .await;

        let err = store_for(&server, None)
            .put(DOC, b"[]", None, "create")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }
}
