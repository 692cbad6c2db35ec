//! Role dashboards and saved widget layouts.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tutorly_common::{ApiResult, Role};
use tutorly_db::{DashboardPreferences, ParentOverview, StudentOverview, TeacherOverview};

use crate::auth::CurrentUser;
use crate::handlers::StudentQuery;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct LayoutView {
    pub layout: Value,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SaveLayout {
    pub layout: Value,
}

// === API Endpoints ===

/// GET /api/dashboard/student - Overview for a student (or a linked viewer)
pub async fn student_dashboard(
    State(state): State<SharedState>,
    current: CurrentUser,
    Query(query): Query<StudentQuery>,
) -> ApiResult<Json<StudentOverview>> {
    let student_id = current.resolve_student(&state, query.student_id).await?;
    let today = Utc::now().date_naive();
    Ok(Json(state.dashboards.student_overview(student_id, today).await?))
}

/// GET /api/dashboard/teacher - Class overview with engagement flags
pub async fn teacher_dashboard(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> ApiResult<Json<TeacherOverview>> {
    current.require_role(&[Role::Teacher])?;
    let today = Utc::now().date_naive();
    Ok(Json(state.dashboards.teacher_overview(current.id(), today).await?))
}

/// GET /api/dashboard/parent - Linked children at a glance
pub async fn parent_dashboard(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> ApiResult<Json<ParentOverview>> {
    current.require_role(&[Role::Parent])?;
    let today = Utc::now().date_naive();
    Ok(Json(state.dashboards.parent_overview(current.id(), today).await?))
}

/// GET /api/dashboard/preferences - Saved layout, `{}` when none
pub async fn get_preferences(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> ApiResult<Json<LayoutView>> {
    let view = match state.dashboards.get_preferences(current.id()).await? {
        Some(prefs) => LayoutView { layout: prefs.layout, updated_at: Some(prefs.updated_at) },
        None => LayoutView { layout: Value::Object(Default::default()), updated_at: None },
    };
    Ok(Json(view))
}

/// PUT /api/dashboard/preferences - Replace the saved layout
pub async fn save_preferences(
    State(state): State<SharedState>,
    current: CurrentUser,
    Json(body): Json<SaveLayout>,
) -> ApiResult<Json<DashboardPreferences>> {
    Ok(Json(state.dashboards.save_preferences(current.id(), &body.layout).await?))
}
