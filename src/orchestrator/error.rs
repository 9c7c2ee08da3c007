use crate::blobs::BlobError;
use crate::contracts::SchemaViolation;
use crate::events::EventLogError;
use crate::index::IndexError;
use crate::runtime::RuntimeError;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("unknown agent `{agent}`")]
    UnknownAgent { agent: String },
    #[error("request for `{agent}` rejected: {source}")]
    InvalidRequest {
        agent: String,
        #[source]
        source: SchemaViolation,
    },
    #[error("invalid task id `{task_id}`: {reason}")]
    InvalidTaskId { task_id: String, reason: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Events(#[from] EventLogError),
    #[error(transparent)]
    Blob(#[from] BlobError),
}

impl OrchestratorError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn json(path: &std::path::Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.display().to_string(),
            source,
        }
    }
}
