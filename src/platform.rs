//! Pipeline-platform access: Azure DevOps secure files and pipelines

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::config::AzureConfig;
use crate::endpoint::{join_segments, parse_base};
use crate::error::{SyncError, TransportError};

/// A secure file stored by the platform
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SecureFile {
    pub id: String,
    pub name: String,
}

/// A pipeline definition; read-only from our side
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Pipeline {
    pub id: i64,
    pub name: String,
}

/// Status and body of a mutating call. Callers decide which statuses count as success.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
}

impl Reply {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    pub fn into_error(self) -> TransportError {
        TransportError::Status {
            status: self.status,
            body: self.body,
        }
    }

    async fn read(response: Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self { status, body }
    }
}

/// Success statuses the platform has been seen returning for creating calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    Created,
    Ok,
}

impl Accepted {
    /// Classify a reply; anything but 201/200 is handed back as an error.
    pub fn from_reply(reply: Reply) -> Result<Self, TransportError> {
        match reply.status {
            StatusCode::CREATED => Ok(Accepted::Created),
            StatusCode::OK => Ok(Accepted::Ok),
            _ => Err(reply.into_error()),
        }
    }
}

#[async_trait]
pub trait PipelinePlatform: Send + Sync {
    async fn list_secure_files(&self, project: &str) -> Result<Vec<SecureFile>, TransportError>;

    async fn delete_secure_file(&self, project: &str, id: &str) -> Result<Reply, TransportError>;

    async fn upload_secure_file(
        &self,
        project: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<Reply, TransportError>;

    async fn list_pipelines(&self, project: &str) -> Result<Vec<Pipeline>, TransportError>;

    /// Revoke the "all pipelines" grant and authorize only `pipeline_id`.
    async fn set_secure_file_permissions(
        &self,
        project: &str,
        secure_file_id: &str,
        pipeline_id: i64,
    ) -> Result<Reply, TransportError>;

    async fn run_pipeline(&self, project: &str, pipeline_id: i64) -> Result<Reply, TransportError>;
}

#[derive(Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

/// Azure DevOps REST client using PAT basic auth
#[derive(Clone)]
pub struct AzureDevOpsClient {
    client: Client,
    api_base: Url,
    organization: String,
    pat: String,
    api_version: String,
}

impl AzureDevOpsClient {
    pub fn new(
        api_base: impl Into<String>,
        organization: impl Into<String>,
        pat: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            SyncError::ConfigError(format!("Failed to build Azure DevOps client: {}", e))
        })?;
        Ok(Self {
            client,
            api_base: parse_base(&api_base.into())?,
            organization: organization.into(),
            pat: pat.into(),
            api_version: api_version.into(),
        })
    }

    pub fn from_config(config: &AzureConfig) -> Result<Self, SyncError> {
        let organization = config
            .organization
            .clone()
            .ok_or_else(|| SyncError::ConfigError("Missing Azure organization".to_string()))?;
        let pat = config
            .pat
            .clone()
            .ok_or_else(|| SyncError::ConfigError("Missing Azure DevOps PAT".to_string()))?;
        Self::new(
            config.api_base.clone(),
            organization,
            pat,
            config.api_version.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// `{base}/{organization}/{project}/_apis/{segments..}` with every segment encoded
    fn url(&self, project: &str, segments: &[&str]) -> Url {
        let head = [self.organization.as_str(), project, "_apis"];
        join_segments(&self.api_base, head.into_iter().chain(segments.iter().copied()))
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .basic_auth("", Some(&self.pat))
            .query(&[("api-version", self.api_version.as_str())])
    }

    async fn get_list<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, TransportError> {
        debug!("GET {}", url);
        let response = self
            .authed(self.client.get(url))
            .header("Accept", "application/json")
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(Reply::read(response).await.into_error());
        }

        let list: ListResponse<T> = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(list.value)
    }
}

#[async_trait]
impl PipelinePlatform for AzureDevOpsClient {
    async fn list_secure_files(&self, project: &str) -> Result<Vec<SecureFile>, TransportError> {
        self.get_list(self.url(project, &["distributedtask", "securefiles"]))
            .await
    }

    async fn delete_secure_file(&self, project: &str, id: &str) -> Result<Reply, TransportError> {
        let url = self.url(project, &["distributedtask", "securefiles", id]);
        debug!("DELETE {}", url);
        let response = self.authed(self.client.delete(url)).send().await?;
        Ok(Reply::read(response).await)
    }

    async fn upload_secure_file(
        &self,
        project: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<Reply, TransportError> {
        let url = self.url(project, &["distributedtask", "securefiles"]);
        debug!("POST {} (name = {}, {} bytes)", url, name, content.len());
        let response = self
            .authed(self.client.post(url))
            .query(&[("name", name)])
            .header("Content-Type", "application/octet-stream")
            .body(content)
            .send()
            .await?;
        Ok(Reply::read(response).await)
    }

    async fn list_pipelines(&self, project: &str) -> Result<Vec<Pipeline>, TransportError> {
        self.get_list(self.url(project, &["pipelines"])).await
    }

    async fn set_secure_file_permissions(
        &self,
        project: &str,
        secure_file_id: &str,
        pipeline_id: i64,
    ) -> Result<Reply, TransportError> {
        let url = self.url(
            project,
            &["pipelines", "pipelinePermissions", "securefile", secure_file_id],
        );
        debug!("PATCH {} (pipeline = {})", url, pipeline_id);
        let body = json!({
            "allPipelines": { "authorized": false },
            "pipelines": [{ "id": pipeline_id, "authorized": true }]
        });
        let response = self
            .authed(self.client.patch(url))
            .json(&body)
            .send()
            .await?;
        Ok(Reply::read(response).await)
    }

    async fn run_pipeline(&self, project: &str, pipeline_id: i64) -> Result<Reply, TransportError> {
        let id = pipeline_id.to_string();
        let url = self.url(project, &["pipelines", id.as_str(), "runs"]);
        debug!("POST {}", url);
        let body = json!({ "resources": { "repositories": {} } });
        let response = self
            .authed(self.client.post(url))
            .json(&body)
            .send()
            .await?;
        Ok(Reply::read(response).await)
    }
}
