//! Achievement catalogue and the caller's earned badges.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;

use tutorly_common::ApiResult;
use tutorly_db::{Achievement, EarnedAchievement};

use crate::auth::CurrentUser;
use crate::handlers::StudentQuery;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct AchievementsView {
    pub catalogue: Vec<Achievement>,
    pub earned: Vec<EarnedAchievement>,
    pub total_points: i32,
}

/// GET /api/achievements
pub async fn list_achievements(
    State(state): State<SharedState>,
    current: CurrentUser,
    Query(query): Query<StudentQuery>,
) -> ApiResult<Json<AchievementsView>> {
    let student_id = current.resolve_student(&state, query.student_id).await?;
    Ok(Json(AchievementsView {
        catalogue: state.achievements.catalogue().await?,
        earned: state.achievements.list_for_student(student_id).await?,
        total_points: state.users.total_points(student_id).await?,
    }))
}
