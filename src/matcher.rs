//! Fuzzy association of changed files with build pipelines

use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::SyncError;
use crate::platform::{Pipeline, PipelinePlatform};

/// The part of a file name after its last `.`, or the whole name when there is none.
pub fn match_key(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => file_name,
    }
}

/// Number of distinct key characters that occur anywhere in `pipeline_name`, ignoring case.
pub fn match_score(key: &str, pipeline_name: &str) -> usize {
    let name = pipeline_name.to_lowercase();
    let distinct: HashSet<char> = key.to_lowercase().chars().collect();
    distinct.into_iter().filter(|c| name.contains(*c)).count()
}

/// Best-scoring pipeline; ties go to the first listed, a zero score matches nothing.
pub fn best_match<'a>(key: &str, pipelines: &'a [Pipeline]) -> Option<(&'a Pipeline, usize)> {
    let mut best: Option<(&Pipeline, usize)> = None;
    for pipeline in pipelines {
        let score = match_score(key, &pipeline.name);
        debug!("Pipeline '{}' scored {} for key '{}'", pipeline.name, score, key);
        if score > 0 && best.is_none_or(|(_, top)| score > top) {
            best = Some((pipeline, score));
        }
    }
    best
}

/// List `project`'s pipelines and pick the one matching `key`.
pub async fn find_pipeline(
    platform: &dyn PipelinePlatform,
    project: &str,
    key: &str,
) -> Result<Option<Pipeline>, SyncError> {
    let pipelines = platform
        .list_pipelines(project)
        .await
        .map_err(|source| SyncError::PipelineListError {
            project: project.to_string(),
            source,
        })?;

    match best_match(key, &pipelines) {
        Some((pipeline, score)) => {
            info!(
                "Matched pipeline '{}' (ID: {}) with score {} for key '{}'",
                pipeline.name, pipeline.id, score, key
            );
            Ok(Some(pipeline.clone()))
        }
        None => {
            info!(
                "No pipeline in project '{}' matches key '{}' ({} candidates)",
                project,
                key,
                pipelines.len()
            );
            Ok(None)
        }
    }
}
