//! Persistence seams consumed by the review engine.
//!
//! Mutating methods are conditional: they compare the stored state with the
//! caller's observation and fail with [`StoreError::PreconditionFailed`]
//! instead of overwriting.

pub mod memory;
pub mod postgres;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use diesel::result::DatabaseErrorKind;
use thiserror::Error;
use uuid::Uuid;

use crate::review::{
    AssignmentStatus, DocumentKey, DocumentVersion, ExplicitAssignment, UserProfile,
    VersionPatch,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(diesel::result::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<diesel::result::Error> for StoreError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => StoreError::NotFound,
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::PreconditionFailed(info.message().to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

pub trait DocumentStore: Send + Sync {
    fn find(&self, document_id: Uuid) -> StoreResult<Option<DocumentVersion>>;

    fn latest(&self, key: &DocumentKey) -> StoreResult<Option<DocumentVersion>>;

    /// All versions of one chain, newest first.
    fn versions(&self, key: &DocumentKey) -> StoreResult<Vec<DocumentVersion>>;

    fn versions_for_type(
        &self,
        land_id: &str,
        document_type: &str,
    ) -> StoreResult<Vec<DocumentVersion>>;

    fn versions_for_land(&self, land_id: &str) -> StoreResult<Vec<DocumentVersion>>;

    /// Appends `version` as the new latest of its chain, provided the chain's
    /// current latest number still equals `observed_latest`.
    fn append(
        &self,
        observed_latest: Option<i32>,
        version: &DocumentVersion,
    ) -> StoreResult<DocumentVersion>;

    /// Writes `patch` if the record still matches its expected status and holder.
    fn apply_transition(
        &self,
        document_id: Uuid,
        patch: &VersionPatch,
    ) -> StoreResult<DocumentVersion>;
}

pub trait AssignmentStore: Send + Sync {
    fn assignments_for_land(&self, land_id: &str) -> StoreResult<Vec<ExplicitAssignment>>;

    fn assignments_for_document(&self, document_id: Uuid)
        -> StoreResult<Vec<ExplicitAssignment>>;

    fn insert_assignment(&self, assignment: &ExplicitAssignment)
        -> StoreResult<ExplicitAssignment>;

    fn update_assignment_status(
        &self,
        assignment_id: Uuid,
        status: AssignmentStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<ExplicitAssignment>;
}

/// Identity collaborator: who holds which reviewer roles.
pub trait UserDirectory: Send + Sync {
    fn role_set_of(&self, user_id: &str) -> StoreResult<BTreeSet<String>>;

    fn profile_of(&self, user_id: &str) -> StoreResult<Option<UserProfile>>;
}

/// Project configuration: which roles review a document type.
pub trait RoleMappings: Send + Sync {
    /// Ordered role keys for the land, falling back to the system default mapping.
    fn role_mapping_for(&self, land_id: &str, document_type: &str) -> StoreResult<Vec<String>>;
}
