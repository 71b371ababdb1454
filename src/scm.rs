//! Source-control access: fetching file contents from GitHub

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::endpoint::{join_segments, parse_base};
use crate::error::{SyncError, TransportError};
use crate::webhook::RepositoryName;

const USER_AGENT: &str = concat!("secure_file_sync/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait ScmClient: Send + Sync {
    /// Decoded bytes of `path` at `git_ref`.
    async fn get_content(
        &self,
        repo: &RepositoryName,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<u8>, TransportError>;
}

/// GitHub REST contents API, authenticated with a bearer token
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    api_base: Url,
    token: String,
}

#[derive(Deserialize)]
struct ContentResponse {
    content: Option<String>,
    encoding: Option<String>,
}

impl GitHubClient {
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SyncError::ConfigError(format!("Failed to build GitHub client: {}", e)))?;
        Ok(Self {
            client,
            api_base: parse_base(&api_base.into())?,
            token: token.into(),
        })
    }

    /// Contents endpoint for `path`; each path component becomes one encoded segment.
    fn contents_url(&self, repo: &RepositoryName, path: &str) -> Url {
        let head = ["repos", repo.owner.as_str(), repo.name.as_str(), "contents"];
        join_segments(
            &self.api_base,
            head.into_iter().chain(path.trim_start_matches('/').split('/')),
        )
    }
}

#[async_trait]
impl ScmClient for GitHubClient {
    async fn get_content(
        &self,
        repo: &RepositoryName,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<u8>, TransportError> {
        let url = self.contents_url(repo, path);
        debug!("GET {} (ref = {})", url, git_ref);

        let response = self
            .client
            .get(url)
            .query(&[("ref", git_ref)])
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        let payload: ContentResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        decode_content(payload)
    }
}

fn decode_content(payload: ContentResponse) -> Result<Vec<u8>, TransportError> {
    let content = payload
        .content
        .ok_or_else(|| TransportError::Decode("response has no content (is it a directory?)".to_string()))?;

    match payload.encoding.as_deref() {
        Some("base64") => {
            // GitHub wraps the base64 body at 60 columns
            let compact: String = content.split_whitespace().collect();
            STANDARD
                .decode(compact)
                .map_err(|e| TransportError::Decode(format!("invalid base64 content: {}", e)))
        }
        Some("") | None => Ok(content.into_bytes()),
        Some(other) => Err(TransportError::Decode(format!(
            "unsupported content encoding '{}'",
            other
        ))),
    }
}

/// Retrieve the current bytes of a changed file.
pub async fn fetch_artifact(
    scm: &dyn ScmClient,
    repo: &RepositoryName,
    path: &str,
    git_ref: &str,
) -> Result<Vec<u8>, SyncError> {
    let bytes = scm
        .get_content(repo, path, git_ref)
        .await
        .map_err(|source| SyncError::FetchError {
            path: path.to_string(),
            git_ref: git_ref.to_string(),
            source,
        })?;
    info!("Fetched '{}' from {} at '{}' ({} bytes)", path, repo, git_ref, bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn repo() -> RepositoryName {
        RepositoryName::parse("acme/envs").unwrap()
    }

    fn client(server: &MockServer) -> GitHubClient {
        GitHubClient::new(server.base_url(), "ghp_test", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetches_and_decodes_base64_content() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/acme/envs/contents/env/api_config.env")
                .query_param("ref", "main")
                .header("authorization", "Bearer ghp_test");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "content": "S0VZPXZh\nbHVlCg==\n",
                    "encoding": "base64"
                }));
        });

        let bytes = fetch_artifact(&client(&server), &repo(), "env/api_config.env", "main")
            .await
            .unwrap();
        mock.assert();
        assert_eq!(bytes, b"KEY=value\n");
    }

    #[test]
    fn contents_url_encodes_each_path_component() {
        let client =
            GitHubClient::new("https://api.github.com", "t", Duration::from_secs(5)).unwrap();
        let url = client.contents_url(&repo(), "/env/app#prod.env");
        assert_eq!(url.path(), "/repos/acme/envs/contents/env/app%23prod.env");
        assert_eq!(url.fragment(), None);
    }

    #[tokio::test]
    async fn reserved_characters_stay_in_the_requested_path() {
        let server = MockServer::start_async().await;
        let truncated = server.mock(|when, then| {
            when.method(GET).path("/repos/acme/envs/contents/env/app");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"content": "V1JPTkc=", "encoding": "base64"}));
        });
        let exact = server.mock(|when, then| {
            when.method(GET)
                .path_includes("prod.env")
                .query_param("ref", "main");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"content": "UklHSFQ=", "encoding": "base64"}));
        });

        let bytes = fetch_artifact(&client(&server), &repo(), "env/app#prod.env", "main")
            .await
            .unwrap();
        assert_eq!(bytes, b"RIGHT");
        exact.assert();
        truncated.assert_calls(0);
    }

    #[test]
    fn invalid_api_base_is_a_config_error() {
        let err = GitHubClient::new("::nope", "t", Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(matches!(err, SyncError::ConfigError(_)));
    }

    #[tokio::test]
    async fn missing_file_surfaces_as_fetch_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/envs/contents/gone.env");
            then.status(404).body(r#"{"message":"Not Found"}"#);
        });

        let err = fetch_artifact(&client(&server), &repo(), "gone.env", "main")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::FetchError { ref path, .. } if path == "gone.env"));
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn undecodable_content_is_fetch_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/envs/contents/bad.env");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"content": "!!!", "encoding": "base64"}));
        });

        let err = fetch_artifact(&client(&server), &repo(), "bad.env", "main")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::FetchError {
                source: TransportError::Decode(_),
                ..
            }
        ));
    }
}
