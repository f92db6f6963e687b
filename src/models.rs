use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::review::{
    normalize_slot, AssignmentStatus, DocumentVersion, ExplicitAssignment, FileMeta,
    UserProfile, VersionStatus,
};
use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = document_versions)]
#[diesel(primary_key(document_id))]
pub struct DocumentVersionRow {
    pub document_id: Uuid,
    pub land_id: String,
    pub document_type: String,
    pub doc_slot: String,
    pub version_number: i32,
    pub is_latest: bool,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_by: String,
    pub created_at: NaiveDateTime,
    pub version_status: Option<String>,
    pub status: Option<String>,
    pub review_locked_by: Option<String>,
    pub review_locked_at: Option<NaiveDateTime>,
    pub approved_by: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
    pub subtask_id: Option<Uuid>,
}

impl From<DocumentVersionRow> for DocumentVersion {
    fn from(row: DocumentVersionRow) -> Self {
        // the legacy `status` column only speaks when `version_status` is unset
        let version_status =
            VersionStatus::parse_lenient(row.version_status.as_deref().or(row.status.as_deref()));

        DocumentVersion {
            document_id: row.document_id,
            land_id: row.land_id,
            document_type: row.document_type,
            slot: normalize_slot(&row.doc_slot),
            version_number: row.version_number,
            is_latest: row.is_latest,
            file: FileMeta {
                file_name: row.file_name,
                size_bytes: row.file_size,
                mime_type: row.mime_type,
            },
            uploaded_by: row.uploaded_by,
            created_at: row.created_at.and_utc(),
            version_status,
            review_locked_by: row.review_locked_by,
            review_locked_at: row.review_locked_at.map(|at| at.and_utc()),
            approved_by: row.approved_by,
            approved_at: row.approved_at.map(|at| at.and_utc()),
            subtask_id: row.subtask_id,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_versions)]
pub struct NewDocumentVersion {
    pub document_id: Uuid,
    pub land_id: String,
    pub document_type: String,
    pub doc_slot: String,
    pub version_number: i32,
    pub is_latest: bool,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_by: String,
    pub created_at: NaiveDateTime,
    pub version_status: Option<String>,
    pub subtask_id: Option<Uuid>,
}

impl From<&DocumentVersion> for NewDocumentVersion {
    fn from(version: &DocumentVersion) -> Self {
        Self {
            document_id: version.document_id,
            land_id: version.land_id.clone(),
            document_type: version.document_type.clone(),
            doc_slot: version.slot_key(),
            version_number: version.version_number,
            is_latest: version.is_latest,
            file_name: version.file.file_name.clone(),
            file_size: version.file.size_bytes,
            mime_type: version.file.mime_type.clone(),
            uploaded_by: version.uploaded_by.clone(),
            created_at: version.created_at.naive_utc(),
            version_status: Some(version.version_status.as_str().to_string()),
            subtask_id: version.subtask_id,
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = review_assignments)]
#[diesel(primary_key(assignment_id))]
pub struct ReviewAssignmentRow {
    pub assignment_id: Uuid,
    pub document_id: Uuid,
    pub assigned_to: String,
    pub reviewer_role: Option<String>,
    pub assignment_status: String,
    pub assigned_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<ReviewAssignmentRow> for ExplicitAssignment {
    fn from(row: ReviewAssignmentRow) -> Self {
        ExplicitAssignment {
            assignment_id: row.assignment_id,
            document_id: row.document_id,
            assigned_to: row.assigned_to,
            reviewer_role: row.reviewer_role,
            assignment_status: AssignmentStatus::parse_lenient(&row.assignment_status),
            assigned_at: row.assigned_at.and_utc(),
            updated_at: row.updated_at.and_utc(),
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = review_assignments)]
pub struct NewReviewAssignment {
    pub assignment_id: Uuid,
    pub document_id: Uuid,
    pub assigned_to: String,
    pub reviewer_role: Option<String>,
    pub assignment_status: String,
    pub assigned_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<&ExplicitAssignment> for NewReviewAssignment {
    fn from(assignment: &ExplicitAssignment) -> Self {
        Self {
            assignment_id: assignment.assignment_id,
            document_id: assignment.document_id,
            assigned_to: assignment.assigned_to.clone(),
            reviewer_role: assignment.reviewer_role.clone(),
            assignment_status: assignment.assignment_status.as_str().to_string(),
            assigned_at: assignment.assigned_at.naive_utc(),
            updated_at: assignment.updated_at.naive_utc(),
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = role_mappings)]
pub struct NewRoleMapping {
    pub land_id: Option<String>,
    pub document_type: String,
    pub role_key: String,
    pub position: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_roles)]
pub struct NewUserRole {
    pub user_id: String,
    pub role_key: String,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = user_profiles)]
pub struct UserProfileRow {
    pub user_id: String,
    pub full_name: Option<String>,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl From<UserProfileRow> for UserProfile {
    fn from(row: UserProfileRow) -> Self {
        UserProfile {
            user_id: row.user_id,
            full_name: row.full_name,
            display_name: row.display_name,
            username: row.username,
            email: row.email,
        }
    }
}

impl From<&UserProfile> for UserProfileRow {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.user_id.clone(),
            full_name: profile.full_name.clone(),
            display_name: profile.display_name.clone(),
            username: profile.username.clone(),
            email: profile.email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(version_status: Option<&str>, status: Option<&str>) -> DocumentVersionRow {
        let at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        DocumentVersionRow {
            document_id: Uuid::new_v4(),
            land_id: "land-1".into(),
            document_type: "survey".into(),
            doc_slot: " d2".into(),
            version_number: 1,
            is_latest: true,
            file_name: "survey.pdf".into(),
            file_size: 3,
            mime_type: "application/pdf".into(),
            uploaded_by: "owner".into(),
            created_at: at,
            version_status: version_status.map(str::to_string),
            status: status.map(str::to_string),
            review_locked_by: None,
            review_locked_at: None,
            approved_by: None,
            approved_at: None,
            subtask_id: None,
        }
    }

    #[test]
    fn version_status_is_authoritative() {
        let version: DocumentVersion = row(Some("approved"), Some("pending")).into();
        assert_eq!(version.version_status, VersionStatus::Approved);
        assert_eq!(version.slot, "D2");
    }

    #[test]
    fn legacy_status_only_fills_missing_version_status() {
        let version: DocumentVersion = row(None, Some("under_review")).into();
        assert_eq!(version.version_status, VersionStatus::UnderReview);

        let version: DocumentVersion = row(None, None).into();
        assert_eq!(version.version_status, VersionStatus::Pending);
    }
}
