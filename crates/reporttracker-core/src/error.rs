use thiserror::Error;

use crate::evidence::EvidenceError;
use crate::repository::RepositoryError;

/// Failure taxonomy for flag workflow operations. The first four variants
/// carry the message shown to the caller; `Evidence` and `Repository` wrap
/// collaborator failures and surface as server errors.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Evidence storage failed: {0}")]
    Evidence(#[from] EvidenceError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
