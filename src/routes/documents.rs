use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::StatusScope;
use crate::error::{AppError, AppResult};
use crate::identity::Actor;
use crate::profiles::ProfileCache;
use crate::review::{
    Decision, DocumentKey, DocumentVersion, ExplicitAssignment, RoleStatusEntry, TypeSummary,
    UploadRequest,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UploadPayload {
    pub file_name: String,
    #[serde(default)]
    pub size_bytes: i64,
    pub mime_type: Option<String>,
    pub expected_latest: Option<i32>,
    pub subtask_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct RoleStatusQuery {
    #[serde(default)]
    pub scope: StatusScope,
}

#[derive(Deserialize)]
pub struct DecisionPayload {
    pub decision: Decision,
}

#[derive(Deserialize)]
pub struct AssignPayload {
    pub assigned_to: String,
    pub reviewer_role: Option<String>,
}

#[derive(Serialize)]
pub struct VersionResponse {
    #[serde(flatten)]
    pub version: DocumentVersion,
    pub uploaded_by_name: String,
}

fn to_version_responses(
    state: &AppState,
    versions: Vec<DocumentVersion>,
) -> AppResult<Vec<VersionResponse>> {
    let mut profiles = ProfileCache::new(state.engine.directory());
    versions
        .into_iter()
        .map(|version| -> AppResult<VersionResponse> {
            let uploaded_by_name = profiles.display_name(&version.uploaded_by)?;
            Ok(VersionResponse {
                version,
                uploaded_by_name,
            })
        })
        .collect()
}

fn to_version_response(state: &AppState, version: DocumentVersion) -> AppResult<VersionResponse> {
    let mut responses = to_version_responses(state, vec![version])?;
    responses.pop().ok_or_else(AppError::not_found)
}

pub async fn list_versions(
    State(state): State<AppState>,
    Path((land_id, document_type, slot)): Path<(String, String, String)>,
) -> AppResult<Json<Vec<VersionResponse>>> {
    let key = DocumentKey::new(land_id, document_type, slot);
    let versions = state.engine.list_versions(&key)?;
    Ok(Json(to_version_responses(&state, versions)?))
}

pub async fn latest_version(
    State(state): State<AppState>,
    Path((land_id, document_type, slot)): Path<(String, String, String)>,
) -> AppResult<Json<VersionResponse>> {
    let key = DocumentKey::new(land_id, document_type, slot);
    let version = state.engine.get_latest(&key)?;
    Ok(Json(to_version_response(&state, version)?))
}

pub async fn upload_version(
    State(state): State<AppState>,
    Path((land_id, document_type, slot)): Path<(String, String, String)>,
    actor: Actor,
    Json(payload): Json<UploadPayload>,
) -> AppResult<(StatusCode, Json<VersionResponse>)> {
    let request = UploadRequest {
        key: DocumentKey::new(land_id, document_type, slot),
        uploaded_by: actor.user_id,
        file_name: payload.file_name,
        size_bytes: payload.size_bytes,
        mime_type: payload.mime_type,
        expected_latest: payload.expected_latest,
        subtask_id: payload.subtask_id,
    };
    let key = request.key.clone();

    let version = match state.engine.record_upload(request) {
        Ok(version) => version,
        Err(err) => {
            error!(error = %err, %key, "document upload failed");
            return Err(err.into());
        }
    };
    info!(
        document_id = %version.document_id,
        version_number = version.version_number,
        "document upload succeeded"
    );

    Ok((StatusCode::CREATED, Json(to_version_response(&state, version)?)))
}

pub async fn role_statuses(
    State(state): State<AppState>,
    Path((land_id, document_type, slot)): Path<(String, String, String)>,
    Query(query): Query<RoleStatusQuery>,
) -> AppResult<Json<Vec<RoleStatusEntry>>> {
    let key = DocumentKey::new(land_id, document_type, slot);
    Ok(Json(state.engine.role_statuses(&key, query.scope)?))
}

pub async fn slot_summary(
    State(state): State<AppState>,
    Path((land_id, document_type)): Path<(String, String)>,
) -> AppResult<Json<TypeSummary>> {
    Ok(Json(state.engine.slot_summary(&land_id, &document_type)?))
}

pub async fn lock_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    actor: Actor,
) -> AppResult<Json<VersionResponse>> {
    let version = state.engine.lock(document_id, &actor.user_id)?;
    Ok(Json(to_version_response(&state, version)?))
}

pub async fn unlock_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    actor: Actor,
) -> AppResult<Json<VersionResponse>> {
    let version = state.engine.unlock(document_id, &actor.user_id)?;
    Ok(Json(to_version_response(&state, version)?))
}

pub async fn decide_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    actor: Actor,
    Json(payload): Json<DecisionPayload>,
) -> AppResult<Json<VersionResponse>> {
    let version = state
        .engine
        .decide(document_id, &actor.user_id, payload.decision)?;
    Ok(Json(to_version_response(&state, version)?))
}

pub async fn assign_reviewer(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<AssignPayload>,
) -> AppResult<(StatusCode, Json<ExplicitAssignment>)> {
    let assignment = state.engine.assign_reviewer(
        document_id,
        &payload.assigned_to,
        payload.reviewer_role.as_deref(),
    )?;
    Ok((StatusCode::CREATED, Json(assignment)))
}
