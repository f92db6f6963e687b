use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_SLOT: &str = "D1";

/// Review lifecycle of a single uploaded version.
///
/// `Pending -> UnderReview -> {Approved | Rejected}` with `UnderReview -> Pending`
/// as the only backward edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    #[default]
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Pending => "pending",
            VersionStatus::UnderReview => "under_review",
            VersionStatus::Approved => "approved",
            VersionStatus::Rejected => "rejected",
        }
    }

    /// Parses a stored status, treating anything missing or unrecognised as pending.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("under_review") => VersionStatus::UnderReview,
            Some("approved") => VersionStatus::Approved,
            Some("rejected") => VersionStatus::Rejected,
            _ => VersionStatus::Pending,
        }
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trims and upper-cases a slot key; blank or missing keys collapse to `D1`.
pub fn normalize_slot(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        DEFAULT_SLOT.to_string()
    } else {
        trimmed.to_ascii_uppercase()
    }
}

/// Identity of one version chain: a slot of a document type on a land.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentKey {
    pub land_id: String,
    pub document_type: String,
    pub slot: String,
}

impl DocumentKey {
    pub fn new(
        land_id: impl Into<String>,
        document_type: impl Into<String>,
        slot: impl AsRef<str>,
    ) -> Self {
        Self {
            land_id: land_id.into(),
            document_type: document_type.into(),
            slot: normalize_slot(slot.as_ref()),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.land_id, self.document_type, self.slot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub file_name: String,
    pub size_bytes: i64,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub document_id: Uuid,
    pub land_id: String,
    pub document_type: String,
    #[serde(rename = "doc_slot")]
    pub slot: String,
    pub version_number: i32,
    pub is_latest: bool,
    pub file: FileMeta,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version_status: VersionStatus,
    pub review_locked_by: Option<String>,
    pub review_locked_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub subtask_id: Option<Uuid>,
}

impl DocumentVersion {
    pub fn key(&self) -> DocumentKey {
        DocumentKey::new(&self.land_id, &self.document_type, &self.slot)
    }

    /// Slot key with the `D1` fallback applied.
    pub fn slot_key(&self) -> String {
        normalize_slot(&self.slot)
    }

    pub fn lock_holder(&self) -> Option<&str> {
        self.review_locked_by.as_deref()
    }

    /// Under review with a recorded lock holder.
    pub fn is_locked(&self) -> bool {
        self.version_status == VersionStatus::UnderReview && self.review_locked_by.is_some()
    }
}
