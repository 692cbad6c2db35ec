//! Student goals.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use tutorly_common::{ApiResult, GoalStatus, NotificationKind};
use tutorly_db::{Goal, GoalProgress, NewGoal};

use crate::auth::CurrentUser;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct GoalQuery {
    pub status: Option<GoalStatus>,
    pub student_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct GoalPatch {
    pub status: GoalStatus,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    #[serde(default = "one")]
    pub delta: i32,
}

fn one() -> i32 { 1 }

async fn own_goal(state: &SharedState, current: &CurrentUser, id: Uuid) -> ApiResult<Goal> {
    let goal = state.goals.get(id).await?;
    current.ensure_self(goal.student_id)?;
    Ok(goal)
}

// === API Endpoints ===

/// GET /api/goals
pub async fn list_goals(
    State(state): State<SharedState>,
    current: CurrentUser,
    Query(query): Query<GoalQuery>,
) -> ApiResult<Json<Vec<Goal>>> {
    let student_id = current.resolve_student(&state, query.student_id).await?;
    Ok(Json(state.goals.list(student_id, query.status).await?))
}

/// POST /api/goals
pub async fn create_goal(
    State(state): State<SharedState>,
    current: CurrentUser,
    Json(new): Json<NewGoal>,
) -> ApiResult<impl IntoResponse> {
    current.require_student()?;
    let goal = state.goals.create(current.id(), &new).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

/// PATCH /api/goals/{id} - Change status (e.g. abandon)
pub async fn update_goal(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<GoalPatch>,
) -> ApiResult<Json<Goal>> {
    own_goal(&state, &current, id).await?;
    Ok(Json(state.goals.update_status(id, patch.status).await?))
}

/// DELETE /api/goals/{id}
pub async fn delete_goal(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    own_goal(&state, &current, id).await?;
    state.goals.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/goals/{id}/progress - Advance a goal; notifies on completion
pub async fn goal_progress(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ProgressRequest>,
) -> ApiResult<Json<GoalProgress>> {
    own_goal(&state, &current, id).await?;
    let progress = state.goals.update_progress(id, req.delta).await?;

    if progress.just_completed {
        state
            .notifier
            .notify_quietly(
                current.id(),
                NotificationKind::GoalCompleted,
                json!({
                    "goal_id": progress.goal.id,
                    "title": progress.goal.title,
                    "target": progress.goal.target_value,
                }),
            )
            .await;
    }
    Ok(Json(progress))
}
