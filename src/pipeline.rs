//! Granting a pipeline access to a secure file, then running it

use tracing::info;

use crate::error::SyncError;
use crate::platform::{Accepted, PipelinePlatform};
use crate::replacer::find_by_name;

/// Authorize exactly `pipeline_id` to use the secure file `name`, revoking the
/// blanket "all pipelines" grant. Returns the secure file id.
pub async fn grant_pipeline_access(
    platform: &dyn PipelinePlatform,
    project: &str,
    name: &str,
    pipeline_id: i64,
) -> Result<String, SyncError> {
    let files = platform
        .list_secure_files(project)
        .await
        .map_err(|source| SyncError::ArtifactListError {
            project: project.to_string(),
            source,
        })?;

    let secure_file_id = find_by_name(&files, name)
        .map(|f| f.id.clone())
        .ok_or_else(|| SyncError::ArtifactLookupError {
            project: project.to_string(),
            name: name.to_string(),
        })?;

    let permission_error = |source| SyncError::PermissionError {
        name: name.to_string(),
        pipeline_id,
        source,
    };
    let reply = platform
        .set_secure_file_permissions(project, &secure_file_id, pipeline_id)
        .await
        .map_err(permission_error)?;
    if !reply.status.is_success() {
        return Err(permission_error(reply.into_error()));
    }

    info!(
        "Authorized pipeline {} for secure file '{}' (ID: {})",
        pipeline_id, name, secure_file_id
    );
    Ok(secure_file_id)
}

/// Start a run of `pipeline_id` with no resource overrides.
pub async fn trigger_pipeline(
    platform: &dyn PipelinePlatform,
    project: &str,
    pipeline_id: i64,
) -> Result<Accepted, SyncError> {
    let trigger_error = |source| SyncError::TriggerError {
        pipeline_id,
        source,
    };
    let reply = platform
        .run_pipeline(project, pipeline_id)
        .await
        .map_err(trigger_error)?;
    let accepted = Accepted::from_reply(reply).map_err(trigger_error)?;

    info!(
        "Triggered pipeline {} in project '{}' ({:?})",
        pipeline_id, project, accepted
    );
    Ok(accepted)
}
