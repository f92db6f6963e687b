use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::error::{ReviewError, ReviewResult};
use super::version::{DocumentKey, DocumentVersion, FileMeta, VersionStatus};

/// An upload as handed over by the transport layer. The file bytes themselves
/// live in external storage; only their metadata reaches the ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    pub key: DocumentKey,
    pub uploaded_by: String,
    pub file_name: String,
    pub size_bytes: i64,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Version number the uploader based this upload on; `0` means "no prior version".
    #[serde(default)]
    pub expected_latest: Option<i32>,
    #[serde(default)]
    pub subtask_id: Option<Uuid>,
}

/// New version plus the latest version number it was computed against.
#[derive(Debug, Clone)]
pub struct AppendPlan {
    pub observed_latest: Option<i32>,
    pub version: DocumentVersion,
}

pub fn build_file_meta(
    file_name: &str,
    size_bytes: i64,
    mime_type: Option<&str>,
) -> ReviewResult<FileMeta> {
    let file_name = file_name.trim();
    if file_name.is_empty() {
        return Err(ReviewError::InvalidInput("file name is required".into()));
    }
    if size_bytes < 0 {
        return Err(ReviewError::InvalidInput(
            "file size must not be negative".into(),
        ));
    }

    let mime_type = match mime_type.map(str::trim).filter(|mime| !mime.is_empty()) {
        Some(mime) => mime.to_string(),
        None => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    };

    Ok(FileMeta {
        file_name: file_name.to_string(),
        size_bytes,
        mime_type,
    })
}

/// Computes the next version in a chain.
///
/// `prior` is the current latest version for the request's key as observed by
/// the caller. The store must only accept the plan if that observation still
/// holds at write time.
pub fn plan_append(
    prior: Option<&DocumentVersion>,
    request: &UploadRequest,
    document_id: Uuid,
    now: DateTime<Utc>,
) -> ReviewResult<AppendPlan> {
    let key = DocumentKey::new(
        request.key.land_id.trim(),
        request.key.document_type.trim(),
        &request.key.slot,
    );
    if key.land_id.is_empty() {
        return Err(ReviewError::InvalidInput("land id is required".into()));
    }
    if key.document_type.is_empty() {
        return Err(ReviewError::InvalidInput("document type is required".into()));
    }
    let uploaded_by = request.uploaded_by.trim();
    if uploaded_by.is_empty() {
        return Err(ReviewError::InvalidInput("uploader is required".into()));
    }

    let observed_latest = prior.map(|version| version.version_number);
    if let Some(expected) = request.expected_latest {
        let expected = (expected > 0).then_some(expected);
        if expected != observed_latest {
            return Err(ReviewError::Conflict(format!(
                "{key}: upload based on version {} but latest is {}",
                expected.unwrap_or(0),
                observed_latest.unwrap_or(0)
            )));
        }
    }

    let file = build_file_meta(
        &request.file_name,
        request.size_bytes,
        request.mime_type.as_deref(),
    )?;

    let version = DocumentVersion {
        document_id,
        land_id: key.land_id,
        document_type: key.document_type,
        slot: key.slot,
        version_number: observed_latest.map_or(1, |number| number + 1),
        is_latest: true,
        file,
        uploaded_by: uploaded_by.to_string(),
        created_at: now,
        version_status: VersionStatus::Pending,
        review_locked_by: None,
        review_locked_at: None,
        approved_by: None,
        approved_at: None,
        subtask_id: request.subtask_id,
    };

    Ok(AppendPlan {
        observed_latest,
        version,
    })
}
