//! Guided problem-solving sessions, difficulty recommendation and
//! session analytics.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use tutorly_adapt::analytics::DEFAULT_ANOMALY_Z;
use tutorly_adapt::streak::is_milestone;
use tutorly_adapt::{anomalies, calculate_session_progress, trend, Anomaly, SessionProgress, StreakState, Trend};
use tutorly_common::{ApiError, ApiResult, NotificationKind, SessionStatus};
use tutorly_db::{
    Achievement, CachedRecommendation, CompleteSession, NewSession, NewStep, PerformanceProfile,
    ProblemSession, RecommendationOutcome, ScorePoint, SessionCompletion, SessionFilter, SessionStep,
};

use crate::auth::CurrentUser;
use crate::state::SharedState;

const DEFAULT_ANALYTICS_SESSIONS: i64 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct SessionListQuery {
    pub student_id: Option<Uuid>,
    pub subject: Option<String>,
    pub status: Option<SessionStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SubjectQuery {
    pub subject: String,
    pub student_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub subject: Option<String>,
    pub student_id: Option<Uuid>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SessionDetail {
    pub session: ProblemSession,
    pub steps: Vec<SessionStep>,
    pub progress: SessionProgress,
}

#[derive(Debug, Serialize)]
pub struct StepRecorded {
    pub session: ProblemSession,
    pub step: SessionStep,
    pub progress: SessionProgress,
}

#[derive(Debug, Serialize)]
pub struct HintGranted {
    pub session: ProblemSession,
    pub hint_level: i32,
    pub hints_remaining: i32,
}

/// Everything that changed because a session was completed.
#[derive(Debug, Serialize)]
pub struct CompletionResult {
    pub session: ProblemSession,
    pub progress: SessionProgress,
    pub profile: PerformanceProfile,
    pub streak: StreakState,
    pub recommendation: CachedRecommendation,
    pub difficulty_changed: bool,
    pub achievements: Vec<Achievement>,
}

#[derive(Debug, Serialize)]
pub struct SessionAnalytics {
    pub subject: Option<String>,
    pub points: Vec<ScorePoint>,
    pub trend: Trend,
    pub anomalies: Vec<Anomaly>,
}

fn progress_of(session: &ProblemSession) -> SessionProgress {
    calculate_session_progress(session.total_steps, session.completed_steps, session.status)
}

fn percent(ratio: f64) -> f64 {
    (ratio * 1000.0).round() / 10.0
}

/// Load a session the caller is about to change.
async fn own_session(state: &SharedState, current: &CurrentUser, id: Uuid) -> ApiResult<ProblemSession> {
    let session = state.sessions.get(id).await?;
    current.ensure_self(session.student_id)?;
    Ok(session)
}

// === API Endpoints ===

/// GET /api/problems/sessions - List sessions, newest first
pub async fn list_sessions(
    State(state): State<SharedState>,
    current: CurrentUser,
    Query(query): Query<SessionListQuery>,
) -> ApiResult<Json<Vec<ProblemSession>>> {
    let student_id = current.resolve_student(&state, query.student_id).await?;
    let filter = SessionFilter {
        subject: query.subject,
        status: query.status,
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(state.sessions.list(student_id, &filter).await?))
}

/// POST /api/problems/sessions - Start a session
///
/// Without an explicit difficulty the cached recommendation for the
/// subject is used, falling back to medium.
pub async fn start_session(
    State(state): State<SharedState>,
    current: CurrentUser,
    Json(new): Json<NewSession>,
) -> ApiResult<impl IntoResponse> {
    current.require_student()?;

    let difficulty = match new.difficulty {
        Some(d) => d,
        None => state
            .profiles
            .cached_recommendation(current.id(), &new.subject)
            .await?
            .map(|r| r.recommended)
            .unwrap_or_default(),
    };

    let session = state.sessions.start(current.id(), &new, difficulty).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/problems/sessions/{id} - Session with its step log and progress
pub async fn get_session(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionDetail>> {
    let session = state.sessions.get(id).await?;
    current.ensure_can_view(&state, session.student_id).await?;

    let steps = state.sessions.steps(id).await?;
    Ok(Json(SessionDetail { progress: progress_of(&session), session, steps }))
}

/// POST /api/problems/sessions/{id}/steps - Record a step attempt
pub async fn record_step(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(step): Json<NewStep>,
) -> ApiResult<impl IntoResponse> {
    own_session(&state, &current, id).await?;
    let (session, step) = state.sessions.record_step(id, &step).await?;
    Ok((
        StatusCode::CREATED,
        Json(StepRecorded { progress: progress_of(&session), session, step }),
    ))
}

/// POST /api/problems/sessions/{id}/hint - Consume one scaffolding hint
pub async fn use_hint(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HintGranted>> {
    own_session(&state, &current, id).await?;
    let max_hints = state.params.max_hints;
    let session = state.sessions.use_hint(id, max_hints).await?;
    Ok(Json(HintGranted {
        hint_level: session.hints_used,
        hints_remaining: (max_hints as i32 - session.hints_used).max(0),
        session,
    }))
}

/// POST /api/problems/sessions/{id}/complete - Finish a session
///
/// The repository commits the session together with its profile, streak,
/// recommendation and achievement changes. Notifications go out only after
/// that commit.
pub async fn complete_session(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CompleteSession>,
) -> ApiResult<Json<CompletionResult>> {
    own_session(&state, &current, id).await?;
    let student_id = current.id();

    let SessionCompletion { session, profile, streak, recommendation: outcome, achievements } =
        state.sessions.complete(id, &body, &state.params, Utc::now()).await?;
    let subject = session.subject.clone();

    let days = streak.state.current_streak;
    if streak.changed && is_milestone(days) {
        state
            .notifier
            .notify_quietly(student_id, NotificationKind::StreakMilestone, json!({ "days": days }))
            .await;
    }

    let difficulty_changed = outcome.changed();
    if let (true, Some(previous)) = (difficulty_changed, outcome.previous) {
        state
            .notifier
            .notify_quietly(
                student_id,
                NotificationKind::DifficultyChanged,
                json!({
                    "subject": subject,
                    "previous": previous,
                    "current": outcome.current.recommended,
                }),
            )
            .await;
    }

    for achievement in &achievements {
        state
            .notifier
            .notify_quietly(
                student_id,
                NotificationKind::AchievementUnlocked,
                json!({
                    "achievement_id": achievement.id,
                    "name": achievement.name,
                    "description": achievement.description,
                    "points": achievement.points,
                }),
            )
            .await;
    }

    state
        .notifier
        .notify_quietly(
            student_id,
            NotificationKind::SessionCompleted,
            json!({
                "session_id": session.id,
                "subject": subject,
                "accuracy": percent(session.accuracy.unwrap_or(0.0)),
                "score": percent(session.composite_score.unwrap_or(0.0)),
            }),
        )
        .await;

    info!(
        %student_id,
        session_id = %session.id,
        subject = %subject,
        recommended = %outcome.current.recommended,
        awarded = achievements.len(),
        "Session completed"
    );

    Ok(Json(CompletionResult {
        progress: progress_of(&session),
        session,
        profile,
        streak: streak.state,
        recommendation: outcome.current,
        difficulty_changed,
        achievements,
    }))
}

/// POST /api/problems/sessions/{id}/abandon
pub async fn abandon_session(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProblemSession>> {
    own_session(&state, &current, id).await?;
    Ok(Json(state.sessions.abandon(id).await?))
}

/// GET /api/problems/recommendation?subject= - Recommended difficulty
pub async fn recommendation(
    State(state): State<SharedState>,
    current: CurrentUser,
    Query(query): Query<SubjectQuery>,
) -> ApiResult<Json<RecommendationOutcome>> {
    let student_id = current.resolve_student(&state, query.student_id).await?;
    if query.subject.trim().is_empty() {
        return Err(ApiError::BadRequest("subject is required".into()));
    }
    let outcome = state
        .profiles
        .recommend_optimal_difficulty(student_id, &query.subject, &state.params, Utc::now())
        .await?;
    Ok(Json(outcome))
}

/// GET /api/problems/analytics?subject= - Score trend and outliers
pub async fn analytics(
    State(state): State<SharedState>,
    current: CurrentUser,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<SessionAnalytics>> {
    let student_id = current.resolve_student(&state, query.student_id).await?;
    let limit = query.limit.unwrap_or(DEFAULT_ANALYTICS_SESSIONS);
    let subject = query.subject.filter(|s| !s.trim().is_empty());

    let points = state.sessions.score_history(student_id, subject.as_deref(), limit).await?;
    let scores: Vec<f64> = points.iter().map(|p| p.composite_score).collect();

    Ok(Json(SessionAnalytics {
        subject,
        trend: trend(&scores),
        anomalies: anomalies(&scores, DEFAULT_ANOMALY_Z),
        points,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounds_to_one_decimal() {
        assert_eq!(percent(0.8333), 83.3);
        assert_eq!(percent(1.0), 100.0);
        assert_eq!(percent(0.0), 0.0);
    }
}
