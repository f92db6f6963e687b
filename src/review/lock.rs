use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ReviewError, ReviewResult};
use super::version::{DocumentVersion, VersionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn status(&self) -> VersionStatus {
        match self {
            Decision::Approve => VersionStatus::Approved,
            Decision::Reject => VersionStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockCommand {
    Lock,
    Unlock,
    Decide(Decision),
}

impl LockCommand {
    pub fn label(&self) -> &'static str {
        match self {
            LockCommand::Lock => "lock",
            LockCommand::Unlock => "unlock",
            LockCommand::Decide(Decision::Approve) => "approve",
            LockCommand::Decide(Decision::Reject) => "reject",
        }
    }
}

/// Conditional write produced by [`plan_transition`].
///
/// The store applies the new field values only while the record still has
/// `expected_status` and `expected_holder`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPatch {
    pub expected_status: VersionStatus,
    pub expected_holder: Option<String>,
    pub version_status: VersionStatus,
    pub review_locked_by: Option<String>,
    pub review_locked_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl VersionPatch {
    pub fn matches(&self, current: &DocumentVersion) -> bool {
        current.version_status == self.expected_status
            && current.review_locked_by == self.expected_holder
    }

    pub fn apply(&self, version: &mut DocumentVersion) {
        version.version_status = self.version_status;
        version.review_locked_by = self.review_locked_by.clone();
        version.review_locked_at = self.review_locked_at;
        version.approved_by = self.approved_by.clone();
        version.approved_at = self.approved_at;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Same actor re-locking a version it already holds.
    Unchanged,
    Apply(VersionPatch),
}

pub fn plan_transition(
    current: &DocumentVersion,
    command: LockCommand,
    actor: &str,
    now: DateTime<Utc>,
) -> ReviewResult<Transition> {
    let document_id = current.document_id;
    let status = current.version_status;

    match command {
        LockCommand::Lock => match status {
            VersionStatus::Pending => Ok(Transition::Apply(VersionPatch {
                expected_status: status,
                expected_holder: current.review_locked_by.clone(),
                version_status: VersionStatus::UnderReview,
                review_locked_by: Some(actor.to_string()),
                review_locked_at: Some(now),
                approved_by: current.approved_by.clone(),
                approved_at: current.approved_at,
            })),
            VersionStatus::UnderReview => match current.lock_holder() {
                Some(holder) if holder == actor => Ok(Transition::Unchanged),
                Some(holder) => Err(ReviewError::AlreadyLocked {
                    document_id,
                    holder: holder.to_string(),
                }),
                // under review without a holder: treat the claim as a fresh lock
                None => Ok(Transition::Apply(VersionPatch {
                    expected_status: status,
                    expected_holder: None,
                    version_status: VersionStatus::UnderReview,
                    review_locked_by: Some(actor.to_string()),
                    review_locked_at: Some(now),
                    approved_by: current.approved_by.clone(),
                    approved_at: current.approved_at,
                })),
            },
            VersionStatus::Approved | VersionStatus::Rejected => {
                Err(ReviewError::NotPending {
                    document_id,
                    status,
                })
            }
        },
        LockCommand::Unlock => {
            if status != VersionStatus::UnderReview {
                return Err(ReviewError::NotLocked {
                    document_id,
                    status,
                });
            }
            Ok(Transition::Apply(VersionPatch {
                expected_status: status,
                expected_holder: current.review_locked_by.clone(),
                version_status: VersionStatus::Pending,
                review_locked_by: None,
                review_locked_at: None,
                approved_by: current.approved_by.clone(),
                approved_at: current.approved_at,
            }))
        }
        LockCommand::Decide(decision) => {
            if status != VersionStatus::UnderReview {
                return Err(ReviewError::NotLocked {
                    document_id,
                    status,
                });
            }
            Ok(Transition::Apply(VersionPatch {
                expected_status: status,
                expected_holder: current.review_locked_by.clone(),
                version_status: decision.status(),
                review_locked_by: None,
                review_locked_at: None,
                approved_by: Some(actor.to_string()),
                approved_at: Some(now),
            }))
        }
    }
}
