//! Delete-then-upload replacement of secure files

use reqwest::StatusCode;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::platform::{Accepted, PipelinePlatform, SecureFile};

/// Result of removing the previous copy of a secure file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deletion {
    /// No file with that name existed
    NotPresent,
    Deleted { id: String },
    /// The platform reported 404 for a file it had just listed
    AlreadyAbsent { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub deletion: Deletion,
    pub upload: Accepted,
}

/// Secure-file names are unique per project ignoring case.
pub fn find_by_name<'a>(files: &'a [SecureFile], name: &str) -> Option<&'a SecureFile> {
    let wanted = name.to_lowercase();
    files.iter().find(|f| f.name.to_lowercase() == wanted)
}

/// Make the secure file `name` in `project` hold `content`.
///
/// Any existing copy is deleted before the upload, never concurrently. If the
/// upload fails after a successful delete the file stays absent.
pub async fn replace_secure_file(
    platform: &dyn PipelinePlatform,
    project: &str,
    name: &str,
    content: Vec<u8>,
) -> Result<Replacement, SyncError> {
    let files = platform
        .list_secure_files(project)
        .await
        .map_err(|source| SyncError::ArtifactListError {
            project: project.to_string(),
            source,
        })?;

    let deletion = match find_by_name(&files, name) {
        Some(existing) => delete_existing(platform, project, existing).await?,
        None => {
            info!("No existing secure file '{}' in project '{}'", name, project);
            Deletion::NotPresent
        }
    };

    let reply = platform
        .upload_secure_file(project, name, content)
        .await
        .map_err(|source| SyncError::ArtifactUploadError {
            name: name.to_string(),
            source,
        })?;
    let upload = Accepted::from_reply(reply).map_err(|source| SyncError::ArtifactUploadError {
        name: name.to_string(),
        source,
    })?;

    info!(
        "Uploaded secure file '{}' to project '{}' ({:?})",
        name, project, upload
    );
    Ok(Replacement { deletion, upload })
}

async fn delete_existing(
    platform: &dyn PipelinePlatform,
    project: &str,
    existing: &SecureFile,
) -> Result<Deletion, SyncError> {
    let delete_error = |source| SyncError::ArtifactDeleteError {
        name: existing.name.clone(),
        id: existing.id.clone(),
        source,
    };

    let reply = platform
        .delete_secure_file(project, &existing.id)
        .await
        .map_err(delete_error)?;

    match reply.status {
        StatusCode::NO_CONTENT | StatusCode::OK => {
            info!(
                "Deleted secure file '{}' (ID: {}) from project '{}'",
                existing.name, existing.id, project
            );
            Ok(Deletion::Deleted {
                id: existing.id.clone(),
            })
        }
        StatusCode::NOT_FOUND => {
            warn!(
                "Secure file '{}' (ID: {}) was already gone, continuing with upload",
                existing.name, existing.id
            );
            Ok(Deletion::AlreadyAbsent {
                id: existing.id.clone(),
            })
        }
        _ => Err(delete_error(reply.into_error())),
    }
}
