//! Per-file sync orchestration for one webhook delivery

use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::SyncError;
use crate::matcher::{find_pipeline, match_key};
use crate::pipeline::{grant_pipeline_access, trigger_pipeline};
use crate::platform::{Pipeline, PipelinePlatform};
use crate::replacer::replace_secure_file;
use crate::resolver::{ProjectResolver, artifact_name};
use crate::scm::{ScmClient, fetch_artifact};
use crate::shutdown::Shutdown;
use crate::webhook::{PushEvent, RepositoryName};

/// Stage of the per-file chain that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Replace,
    Match,
    Grant,
    Trigger,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Replace => "replace",
            Stage::Match => "match",
            Stage::Grant => "grant",
            Stage::Trigger => "trigger",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum FileStatus {
    /// Uploaded, permissioned and the matched pipeline was started
    Triggered { pipeline: Pipeline },
    /// Uploaded, but no pipeline scored above zero
    UploadedWithoutPipeline,
    /// Dry run: nothing was called
    Planned { match_key: String },
    Failed { stage: Stage, error: SyncError },
    /// Shutdown arrived before or while this file was processed
    Cancelled,
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: String,
    pub artifact: String,
    pub project: String,
    pub status: FileStatus,
}

#[derive(Debug)]
pub struct DispatchReport {
    pub dispatch_id: Uuid,
    pub repository: String,
    pub git_ref: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<FileOutcome>,
}

impl DispatchReport {
    pub fn elapsed(&self) -> TimeDelta {
        self.finished_at - self.started_at
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, FileStatus::Failed { .. }))
            .count()
    }

    pub fn cancelled(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, FileStatus::Cancelled))
            .count()
    }
}

/// Sequences fetch, replace, match, grant and trigger for every changed file.
pub struct Dispatcher {
    scm: Arc<dyn ScmClient>,
    platform: Arc<dyn PipelinePlatform>,
    resolver: ProjectResolver,
    default_ref: String,
}

impl Dispatcher {
    pub fn new(
        scm: Arc<dyn ScmClient>,
        platform: Arc<dyn PipelinePlatform>,
        resolver: ProjectResolver,
        default_ref: impl Into<String>,
    ) -> Self {
        Self {
            scm,
            platform,
            resolver,
            default_ref: default_ref.into(),
        }
    }

    fn git_ref_for(&self, event: &PushEvent) -> String {
        event
            .branch
            .clone()
            .unwrap_or_else(|| self.default_ref.clone())
    }

    /// Process every changed file in payload order. Failures are logged per
    /// file and never stop the remaining files; nothing is retried.
    pub async fn dispatch(&self, event: &PushEvent, mut shutdown: Shutdown) -> DispatchReport {
        let dispatch_id = Uuid::now_v7();
        let span = info_span!("dispatch", %dispatch_id, repository = %event.repository);

        async move {
            let started_at = Utc::now();
            let git_ref = self.git_ref_for(event);
            let files = event.changed_files();
            info!("Dispatching {} changed file(s) at '{}'", files.len(), git_ref);

            let mut outcomes = Vec::with_capacity(files.len());
            for path in files {
                let artifact = artifact_name(&path).to_string();
                let project = self.resolver.resolve(&artifact).to_string();

                let status = if shutdown.is_cancelled() {
                    FileStatus::Cancelled
                } else {
                    info!(path = %path, project = %project, "Resolved project for '{}'", artifact);
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => {
                            warn!(path = %path, "Shutdown requested, abandoning in-flight sync");
                            FileStatus::Cancelled
                        }
                        result = self.sync_file(&event.repository, &git_ref, &path, &artifact, &project) => {
                            match result {
                                Ok(status) => status,
                                Err((stage, error)) => {
                                    error!(path = %path, stage = %stage, "Sync failed: {}", error);
                                    FileStatus::Failed { stage, error }
                                }
                            }
                        }
                    }
                };

                outcomes.push(FileOutcome {
                    path,
                    artifact,
                    project,
                    status,
                });
            }

            let report = DispatchReport {
                dispatch_id,
                repository: event.repository.full_name(),
                git_ref,
                started_at,
                finished_at: Utc::now(),
                outcomes,
            };
            info!(
                "Dispatch finished in {} ms: {} file(s), {} failed, {} cancelled",
                report.elapsed().num_milliseconds(),
                report.outcomes.len(),
                report.failed(),
                report.cancelled()
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Dry run: resolve every file without touching either remote.
    pub fn plan(&self, event: &PushEvent) -> DispatchReport {
        let dispatch_id = Uuid::now_v7();
        let started_at = Utc::now();
        let git_ref = self.git_ref_for(event);

        let outcomes = event
            .changed_files()
            .into_iter()
            .map(|path| {
                let artifact = artifact_name(&path).to_string();
                let project = self.resolver.resolve(&artifact).to_string();
                let key = match_key(&artifact).to_string();
                info!(
                    "[DRY_RUN] {} would sync '{}' from {}@{} into project '{}' (match key '{}')",
                    dispatch_id, artifact, event.repository, git_ref, project, key
                );
                FileOutcome {
                    path,
                    artifact,
                    project,
                    status: FileStatus::Planned { match_key: key },
                }
            })
            .collect();

        DispatchReport {
            dispatch_id,
            repository: event.repository.full_name(),
            git_ref,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        }
    }

    async fn sync_file(
        &self,
        repo: &RepositoryName,
        git_ref: &str,
        path: &str,
        artifact: &str,
        project: &str,
    ) -> Result<FileStatus, (Stage, SyncError)> {
        let platform = self.platform.as_ref();

        let content = fetch_artifact(self.scm.as_ref(), repo, path, git_ref)
            .await
            .map_err(|e| (Stage::Fetch, e))?;

        replace_secure_file(platform, project, artifact, content)
            .await
            .map_err(|e| (Stage::Replace, e))?;

        let key = match_key(artifact);
        let Some(pipeline) = find_pipeline(platform, project, key)
            .await
            .map_err(|e| (Stage::Match, e))?
        else {
            info!(path = %path, "No matching pipeline, skipping permission and trigger");
            return Ok(FileStatus::UploadedWithoutPipeline);
        };

        // The run is denied access to the secure file unless it is authorized first
        grant_pipeline_access(platform, project, artifact, pipeline.id)
            .await
            .map_err(|e| (Stage::Grant, e))?;

        trigger_pipeline(platform, project, pipeline.id)
            .await
            .map_err(|e| (Stage::Trigger, e))?;

        Ok(FileStatus::Triggered { pipeline })
    }
}
