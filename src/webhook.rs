//! Push webhook payload parsing

use serde::Deserialize;
use std::fmt;

use crate::error::SyncError;

/// `owner/repo` identity of the pushed repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryName {
    pub owner: String,
    pub name: String,
}

impl RepositoryName {
    pub fn parse(full_name: &str) -> Result<Self, SyncError> {
        match full_name.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(SyncError::MalformedPayloadError(format!(
                "repository.full_name '{}' is not in 'owner/repo' form",
                full_name
            ))),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub modified: Vec<String>,
}

/// A verified push event, alive only for the duration of one dispatch
#[derive(Debug, Clone)]
pub struct PushEvent {
    pub repository: RepositoryName,
    /// Branch name with `refs/heads/` stripped, if the payload carried a ref
    pub branch: Option<String>,
    pub commits: Vec<Commit>,
}

impl PushEvent {
    /// Modified paths across all commits, in payload order. Duplicates are kept.
    pub fn changed_files(&self) -> Vec<String> {
        self.commits
            .iter()
            .flat_map(|c| c.modified.iter().cloned())
            .collect()
    }
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    repository: RawRepository,
    commits: Vec<RawCommit>,
}

#[derive(Deserialize)]
struct RawRepository {
    full_name: String,
}

#[derive(Deserialize)]
struct RawCommit {
    modified: Vec<String>,
}

/// Parse a verified webhook body into a [`PushEvent`].
pub fn parse_push_event(body: &[u8]) -> Result<PushEvent, SyncError> {
    let raw: RawPayload = serde_json::from_slice(body)
        .map_err(|e| SyncError::MalformedPayloadError(e.to_string()))?;

    let repository = RepositoryName::parse(&raw.repository.full_name)?;
    let branch = raw
        .git_ref
        .filter(|r| !r.is_empty())
        .map(|r| r.strip_prefix("refs/heads/").unwrap_or(&r).to_string());

    Ok(PushEvent {
        repository,
        branch,
        commits: raw
            .commits
            .into_iter()
            .map(|c| Commit {
                modified: c.modified,
            })
            .collect(),
    })
}
