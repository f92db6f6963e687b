use axum::extract::{Json, Path, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::review::{AssignmentStatus, ExplicitAssignment, ReconciledAssignment};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AssignmentStatusPayload {
    pub assignment_status: AssignmentStatus,
}

pub async fn list_land_assignments(
    State(state): State<AppState>,
    Path(land_id): Path<String>,
) -> AppResult<Json<Vec<ReconciledAssignment>>> {
    Ok(Json(state.engine.reconcile_assignments(&land_id)?))
}

pub async fn update_assignment(
    State(state): State<AppState>,
    Path(assignment_id): Path<Uuid>,
    Json(payload): Json<AssignmentStatusPayload>,
) -> AppResult<Json<ExplicitAssignment>> {
    let updated = state
        .engine
        .update_assignment_status(assignment_id, payload.assignment_status)?;
    Ok(Json(updated))
}
