use reqwest::StatusCode;

/// Failure of a single call against the SCM host or the pipeline platform
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Could not decode response: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Request(e) => e.status(),
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Decode(_) => None,
        }
    }
}

/// Custom error type for secure_file_sync operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Signature verification failed")]
    AuthError,

    #[error("Malformed webhook payload: {0}")]
    MalformedPayloadError(String),

    #[error("Failed to fetch '{path}' at '{git_ref}': {source}")]
    FetchError {
        path: String,
        git_ref: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to list secure files in project '{project}': {source}")]
    ArtifactListError {
        project: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to delete secure file '{name}' ({id}): {source}")]
    ArtifactDeleteError {
        name: String,
        id: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to upload secure file '{name}': {source}")]
    ArtifactUploadError {
        name: String,
        #[source]
        source: TransportError,
    },

    #[error("Secure file '{name}' not found in project '{project}'")]
    ArtifactLookupError { project: String, name: String },

    #[error("Failed to list pipelines in project '{project}': {source}")]
    PipelineListError {
        project: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to authorize pipeline {pipeline_id} for secure file '{name}': {source}")]
    PermissionError {
        name: String,
        pipeline_id: i64,
        #[source]
        source: TransportError,
    },

    #[error("Failed to trigger pipeline {pipeline_id}: {source}")]
    TriggerError {
        pipeline_id: i64,
        #[source]
        source: TransportError,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SyncError {
    /// HTTP status reported by the remote side, when the failure carried one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SyncError::FetchError { source, .. }
            | SyncError::ArtifactListError { source, .. }
            | SyncError::ArtifactDeleteError { source, .. }
            | SyncError::ArtifactUploadError { source, .. }
            | SyncError::PipelineListError { source, .. }
            | SyncError::PermissionError { source, .. }
            | SyncError::TriggerError { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Helper type for Results that use SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_carried_through_wrapping_errors() {
        let err = SyncError::ArtifactUploadError {
            name: "api.env".to_string(),
            source: TransportError::Status {
                status: StatusCode::CONFLICT,
                body: "duplicate".to_string(),
            },
        };
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert!(err.to_string().contains("api.env"));
        assert_eq!(SyncError::AuthError.status(), None);
    }
}
