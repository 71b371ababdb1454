//! In-memory collaborators shared by unit tests

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::TransportError;
use crate::platform::{Pipeline, PipelinePlatform, Reply, SecureFile};
use crate::scm::ScmClient;
use crate::webhook::RepositoryName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetContent(String),
    ListSecureFiles(String),
    DeleteSecureFile(String, String),
    UploadSecureFile(String, String),
    ListPipelines(String),
    SetPermissions(String, String, i64),
    RunPipeline(String, i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Delete,
    Upload,
    ListPipelines,
    Permissions,
    Run,
}

#[derive(Default)]
struct PlatformState {
    files: HashMap<String, Vec<(SecureFile, Vec<u8>)>>,
    pipelines: HashMap<String, Vec<Pipeline>>,
    statuses: HashMap<Op, StatusCode>,
    permissions: HashMap<String, i64>,
    next_id: usize,
}

/// Records calls in order; `calls` is shared with [`FakeScm`] when built via [`fakes`].
pub struct FakePlatform {
    state: Mutex<PlatformState>,
    calls: std::sync::Arc<Mutex<Vec<Call>>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PlatformState::default()),
            calls: Default::default(),
        }
    }

    pub fn with_file(self, project: &str, id: &str, name: &str, content: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .entry(project.to_string())
            .or_default()
            .push((
                SecureFile {
                    id: id.to_string(),
                    name: name.to_string(),
                },
                content.to_vec(),
            ));
        self
    }

    pub fn with_pipeline(self, project: &str, id: i64, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .pipelines
            .entry(project.to_string())
            .or_default()
            .push(Pipeline {
                id,
                name: name.to_string(),
            });
        self
    }

    /// Make every call of `op` answer with `status`.
    pub fn respond(self, op: Op, status: StatusCode) -> Self {
        self.state.lock().unwrap().statuses.insert(op, status);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn files(&self, project: &str) -> Vec<(String, Vec<u8>)> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(project)
            .map(|files| {
                files
                    .iter()
                    .map(|(f, c)| (f.name.clone(), c.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn authorized_pipeline(&self, secure_file_id: &str) -> Option<i64> {
        self.state
            .lock()
            .unwrap()
            .permissions
            .get(secure_file_id)
            .copied()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn status(&self, op: Op, default: StatusCode) -> StatusCode {
        self.state
            .lock()
            .unwrap()
            .statuses
            .get(&op)
            .copied()
            .unwrap_or(default)
    }

    fn failed_list(&self, op: Op) -> Option<TransportError> {
        let status = self.status(op, StatusCode::OK);
        (status != StatusCode::OK).then(|| TransportError::Status {
            status,
            body: String::new(),
        })
    }
}

#[async_trait]
impl PipelinePlatform for FakePlatform {
    async fn list_secure_files(&self, project: &str) -> Result<Vec<SecureFile>, TransportError> {
        self.record(Call::ListSecureFiles(project.to_string()));
        if let Some(err) = self.failed_list(Op::List) {
            return Err(err);
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .files
            .get(project)
            .map(|files| files.iter().map(|(f, _)| f.clone()).collect())
            .unwrap_or_default())
    }

    async fn delete_secure_file(&self, project: &str, id: &str) -> Result<Reply, TransportError> {
        self.record(Call::DeleteSecureFile(project.to_string(), id.to_string()));
        let status = self.status(Op::Delete, StatusCode::NO_CONTENT);
        // a 404 simulates a file that vanished between listing and deleting
        if status.is_success() || status == StatusCode::NOT_FOUND {
            let mut state = self.state.lock().unwrap();
            if let Some(files) = state.files.get_mut(project) {
                files.retain(|(f, _)| f.id != id);
            }
        }
        Ok(Reply::new(status))
    }

    async fn upload_secure_file(
        &self,
        project: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<Reply, TransportError> {
        self.record(Call::UploadSecureFile(project.to_string(), name.to_string()));
        let status = self.status(Op::Upload, StatusCode::CREATED);
        if status.is_success() {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = format!("uploaded-{}", state.next_id);
            let files = state.files.entry(project.to_string()).or_default();
            if files
                .iter()
                .any(|(f, _)| f.name.to_lowercase() == name.to_lowercase())
            {
                return Ok(Reply::new(StatusCode::CONFLICT));
            }
            files.push((
                SecureFile {
                    id,
                    name: name.to_string(),
                },
                content,
            ));
        }
        Ok(Reply::new(status))
    }

    async fn list_pipelines(&self, project: &str) -> Result<Vec<Pipeline>, TransportError> {
        self.record(Call::ListPipelines(project.to_string()));
        if let Some(err) = self.failed_list(Op::ListPipelines) {
            return Err(err);
        }
        let state = self.state.lock().unwrap();
        Ok(state.pipelines.get(project).cloned().unwrap_or_default())
    }

    async fn set_secure_file_permissions(
        &self,
        project: &str,
        secure_file_id: &str,
        pipeline_id: i64,
    ) -> Result<Reply, TransportError> {
        self.record(Call::SetPermissions(
            project.to_string(),
            secure_file_id.to_string(),
            pipeline_id,
        ));
        let status = self.status(Op::Permissions, StatusCode::OK);
        if status.is_success() {
            self.state
                .lock()
                .unwrap()
                .permissions
                .insert(secure_file_id.to_string(), pipeline_id);
        }
        Ok(Reply::new(status))
    }

    async fn run_pipeline(&self, project: &str, pipeline_id: i64) -> Result<Reply, TransportError> {
        self.record(Call::RunPipeline(project.to_string(), pipeline_id));
        Ok(Reply::new(self.status(Op::Run, StatusCode::OK)))
    }
}

/// Serves fixed file contents; paths listed in `missing` answer 404.
pub struct FakeScm {
    contents: HashMap<String, Vec<u8>>,
    missing: HashSet<String>,
    calls: std::sync::Arc<Mutex<Vec<Call>>>,
}

impl FakeScm {
    pub fn with_content(mut self, path: &str, content: &[u8]) -> Self {
        self.contents.insert(path.to_string(), content.to_vec());
        self
    }

    pub fn with_missing(mut self, path: &str) -> Self {
        self.missing.insert(path.to_string());
        self
    }
}

#[async_trait]
impl ScmClient for FakeScm {
    async fn get_content(
        &self,
        _repo: &RepositoryName,
        path: &str,
        _git_ref: &str,
    ) -> Result<Vec<u8>, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::GetContent(path.to_string()));
        if self.missing.contains(path) {
            return Err(TransportError::Status {
                status: StatusCode::NOT_FOUND,
                body: "Not Found".to_string(),
            });
        }
        Ok(self
            .contents
            .get(path)
            .cloned()
            .unwrap_or_else(|| format!("content of {}", path).into_bytes()))
    }
}

/// Never answers, so only cancellation can finish a dispatch using it.
pub struct HangingScm;

#[async_trait]
impl ScmClient for HangingScm {
    async fn get_content(
        &self,
        _repo: &RepositoryName,
        _path: &str,
        _git_ref: &str,
    ) -> Result<Vec<u8>, TransportError> {
        std::future::pending().await
    }
}

/// A fake SCM and platform writing into one shared call log.
pub fn fakes() -> (FakeScm, FakePlatform) {
    let platform = FakePlatform::new();
    let scm = FakeScm {
        contents: HashMap::new(),
        missing: HashSet::new(),
        calls: platform.calls.clone(),
    };
    (scm, platform)
}
