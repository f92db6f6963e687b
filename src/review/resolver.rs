use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::assignment::{prevailing, Assignment, AssignmentStatus, ExplicitAssignment};
use super::version::{DocumentVersion, VersionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Pending,
    Assigned,
    InProgress,
    UnderReview,
    Completed,
    Approved,
    Rejected,
}

impl From<AssignmentStatus> for ReviewState {
    fn from(value: AssignmentStatus) -> Self {
        match value {
            AssignmentStatus::Completed => ReviewState::Completed,
            AssignmentStatus::InProgress => ReviewState::InProgress,
            AssignmentStatus::Assigned => ReviewState::Assigned,
        }
    }
}

/// Review state of one role on one version. Derived on every read, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleStatus {
    pub status: ReviewState,
    pub actor: Option<String>,
    pub at: Option<DateTime<Utc>>,
}

impl RoleStatus {
    fn unengaged() -> Self {
        Self {
            status: ReviewState::Pending,
            actor: None,
            at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleStatusEntry {
    pub role_key: String,
    pub document_id: Uuid,
    pub version_number: i32,
    #[serde(flatten)]
    pub status: RoleStatus,
}

/// Projects `version_status` onto a single reviewer role.
///
/// `locker_roles` is the role set of `version.review_locked_by`, empty when the
/// version is not locked. Decisions are type-wide: every role reports the
/// deciding actor regardless of which role they hold.
pub fn resolve(
    version: &DocumentVersion,
    role_key: &str,
    assignments: &[Assignment],
    locker_roles: &BTreeSet<String>,
) -> RoleStatus {
    match version.version_status {
        VersionStatus::Approved => decided(version, ReviewState::Approved),
        VersionStatus::Rejected => decided(version, ReviewState::Rejected),
        VersionStatus::UnderReview => {
            if let Some(holder) = version.lock_holder() {
                if locker_roles.contains(role_key) {
                    return RoleStatus {
                        status: ReviewState::UnderReview,
                        actor: Some(holder.to_string()),
                        at: version.review_locked_at,
                    };
                }
            }
            from_assignment(version, role_key, assignments).unwrap_or_else(RoleStatus::unengaged)
        }
        VersionStatus::Pending => {
            from_assignment(version, role_key, assignments).unwrap_or_else(RoleStatus::unengaged)
        }
    }
}

/// Resolves every mapped role, preserving the mapping order.
pub fn resolve_all(
    version: &DocumentVersion,
    role_keys: &[String],
    assignments: &[Assignment],
    locker_roles: &BTreeSet<String>,
) -> Vec<RoleStatusEntry> {
    role_keys
        .iter()
        .map(|role_key| RoleStatusEntry {
            role_key: role_key.clone(),
            document_id: version.document_id,
            version_number: version.version_number,
            status: resolve(version, role_key, assignments, locker_roles),
        })
        .collect()
}

fn decided(version: &DocumentVersion, status: ReviewState) -> RoleStatus {
    RoleStatus {
        status,
        actor: version.approved_by.clone(),
        at: version.approved_at,
    }
}

fn from_assignment(
    version: &DocumentVersion,
    role_key: &str,
    assignments: &[Assignment],
) -> Option<RoleStatus> {
    let explicit = prevailing(
        assignments
            .iter()
            .filter_map(Assignment::as_explicit)
            .filter(|assignment| {
                assignment.document_id == version.document_id
                    && assignment.reviewer_role.as_deref() == Some(role_key)
            }),
    )?;

    Some(assignment_status(explicit))
}

fn assignment_status(assignment: &ExplicitAssignment) -> RoleStatus {
    RoleStatus {
        status: assignment.assignment_status.into(),
        actor: Some(assignment.assigned_to.clone()),
        at: Some(assignment.updated_at),
    }
}
