//! Student journal.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use tutorly_common::{ApiError, ApiResult};
use tutorly_db::{JournalEntry, JournalQuery, JournalUpdate, MoodCount, NewJournalEntry};

use crate::auth::CurrentUser;
use crate::state::SharedState;

const DEFAULT_SUGGESTIONS: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MoodQuery {
    pub days: Option<i32>,
}

/// Load an entry and hide it from anyone but its author.
async fn owned_entry(state: &SharedState, current: &CurrentUser, id: Uuid) -> ApiResult<JournalEntry> {
    let entry = state.journal.get(id).await?;
    if entry.student_id != current.id() {
        return Err(ApiError::NotFound("Journal entry not found".into()));
    }
    Ok(entry)
}

// === API Endpoints ===

/// GET /api/journal/entries - List the caller's entries
pub async fn list_entries(
    State(state): State<SharedState>,
    current: CurrentUser,
    Query(query): Query<JournalQuery>,
) -> ApiResult<Json<Vec<JournalEntry>>> {
    current.require_student()?;
    Ok(Json(state.journal.list(current.id(), &query).await?))
}

/// POST /api/journal/entries - Write a new entry
pub async fn create_entry(
    State(state): State<SharedState>,
    current: CurrentUser,
    Json(new): Json<NewJournalEntry>,
) -> ApiResult<impl IntoResponse> {
    current.require_student()?;
    let entry = state.journal.create(current.id(), &new).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /api/journal/entries/{id}
pub async fn get_entry(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JournalEntry>> {
    Ok(Json(owned_entry(&state, &current, id).await?))
}

/// PUT /api/journal/entries/{id} - Partial update
pub async fn update_entry(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(update): Json<JournalUpdate>,
) -> ApiResult<Json<JournalEntry>> {
    owned_entry(&state, &current, id).await?;
    Ok(Json(state.journal.update(id, &update).await?))
}

/// DELETE /api/journal/entries/{id}
pub async fn delete_entry(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    owned_entry(&state, &current, id).await?;
    state.journal.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/journal/tags/suggestions?q= - Never fails; errors yield `[]`
pub async fn tag_suggestions(
    State(state): State<SharedState>,
    current: CurrentUser,
    Query(query): Query<SuggestionQuery>,
) -> Json<Vec<String>> {
    let limit = query.limit.unwrap_or(DEFAULT_SUGGESTIONS);
    let tags = state
        .journal
        .tag_suggestions(current.id(), &query.q, limit)
        .await
        .unwrap_or_else(|e| {
            warn!(user_id = %current.id(), error = %e, "tag suggestions failed");
            Vec::new()
        });
    Json(tags)
}

/// GET /api/journal/search/suggestions?q= - Never fails; errors yield `[]`
pub async fn search_suggestions(
    State(state): State<SharedState>,
    current: CurrentUser,
    Query(query): Query<SuggestionQuery>,
) -> Json<Vec<String>> {
    let limit = query.limit.unwrap_or(DEFAULT_SUGGESTIONS);
    let titles = state
        .journal
        .search_suggestions(current.id(), &query.q, limit)
        .await
        .unwrap_or_else(|e| {
            warn!(user_id = %current.id(), error = %e, "search suggestions failed");
            Vec::new()
        });
    Json(titles)
}

/// GET /api/journal/mood-summary?days= - Mood counts over the last N days
pub async fn mood_summary(
    State(state): State<SharedState>,
    current: CurrentUser,
    Query(query): Query<MoodQuery>,
) -> ApiResult<Json<Vec<MoodCount>>> {
    current.require_student()?;
    let days = query.days.unwrap_or(30).clamp(1, 365);
    Ok(Json(state.journal.mood_summary(current.id(), days).await?))
}
