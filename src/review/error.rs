use thiserror::Error;
use uuid::Uuid;

use super::version::VersionStatus;
use crate::store::StoreError;

pub type ReviewResult<T> = Result<T, ReviewError>;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("concurrent update on {0}")]
    Conflict(String),
    #[error("document {document_id} is already locked by {holder}")]
    AlreadyLocked { document_id: Uuid, holder: String },
    #[error("document {document_id} is not under review (status {status})")]
    NotLocked {
        document_id: Uuid,
        status: VersionStatus,
    },
    #[error("document {document_id} is not pending (status {status})")]
    NotPending {
        document_id: Uuid,
        status: VersionStatus,
    },
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ReviewError {
    /// Stable machine-readable identifier for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            ReviewError::Conflict(_) => "conflict",
            ReviewError::AlreadyLocked { .. } => "already_locked",
            ReviewError::NotLocked { .. } => "not_locked",
            ReviewError::NotPending { .. } => "not_pending",
            ReviewError::UnknownRole(_) => "unknown_role",
            ReviewError::NotFound(_) => "not_found",
            ReviewError::InvalidInput(_) => "invalid_input",
            ReviewError::Storage(_) => "storage",
        }
    }
}
