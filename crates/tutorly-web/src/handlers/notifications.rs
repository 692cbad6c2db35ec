//! Stored notifications, delivery preferences and teacher messages.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use tutorly_common::{ApiError, ApiResult, NotificationKind, Role};
use tutorly_db::{Notification, NotificationPreference};

use crate::auth::CurrentUser;
use crate::state::SharedState;
use crate::ws::ServerMessage;

const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResult {
    pub notification_id: Uuid,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkAllResult {
    pub updated: u64,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub student_id: Uuid,
    pub message: String,
}

/// Tell the user's open sockets about a changed unread count.
async fn push_unread_count(state: &SharedState, user_id: Uuid) {
    if let Err(e) = state.notifier.publish_unread_count(user_id).await {
        warn!(%user_id, error = %e, "could not publish unread count");
    }
}

// === API Endpoints ===

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<SharedState>,
    current: CurrentUser,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let notifications = state
        .notifications
        .list(current.id(), query.unread_only, query.limit.unwrap_or(20), query.offset.unwrap_or(0))
        .await?;
    Ok(Json(notifications))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> ApiResult<Json<UnreadCount>> {
    Ok(Json(UnreadCount { count: state.notifications.unread_count(current.id()).await? }))
}

/// POST /api/notifications/{id}/read
pub async fn mark_read(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MarkReadResult>> {
    let success = state.notifications.mark_read(current.id(), id).await?;
    if success {
        push_unread_count(&state, current.id()).await;
    }
    Ok(Json(MarkReadResult { notification_id: id, success }))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> ApiResult<Json<MarkAllResult>> {
    let updated = state.notifications.mark_all_read(current.id()).await?;
    if updated > 0 {
        state.notifier.publish(current.id(), ServerMessage::UnreadCount { count: 0 });
    }
    Ok(Json(MarkAllResult { updated }))
}

/// DELETE /api/notifications/{id}
pub async fn delete_notification(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.notifications.delete(current.id(), id).await?;
    push_unread_count(&state, current.id()).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/notifications/preferences - One entry per kind
pub async fn get_preferences(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<NotificationPreference>>> {
    Ok(Json(state.notifications.preferences(current.id()).await?))
}

/// PUT /api/notifications/preferences - Set any subset of kinds
pub async fn set_preferences(
    State(state): State<SharedState>,
    current: CurrentUser,
    Json(prefs): Json<Vec<NotificationPreference>>,
) -> ApiResult<Json<Vec<NotificationPreference>>> {
    for pref in &prefs {
        state.notifications.set_preference(current.id(), pref.kind, pref.enabled).await?;
    }
    Ok(Json(state.notifications.preferences(current.id()).await?))
}

/// POST /api/notifications/messages - A teacher or parent writes to a student
pub async fn send_message(
    State(state): State<SharedState>,
    current: CurrentUser,
    Json(req): Json<MessageRequest>,
) -> ApiResult<(StatusCode, Json<Option<Notification>>)> {
    current.require_role(&[Role::Teacher, Role::Parent])?;
    current.ensure_can_view(&state, req.student_id).await?;

    let message = req.message.trim();
    if message.is_empty() || message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "message must be between 1 and {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let delivered = state
        .notifier
        .notify(
            req.student_id,
            NotificationKind::TeacherMessage,
            json!({
                "sender_id": current.id(),
                "sender": current.user.display_name,
                "message": message,
            }),
        )
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((StatusCode::CREATED, Json(delivered)))
}
