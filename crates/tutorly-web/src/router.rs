//! Axum router — maps all URL paths to handlers.

use axum::{
    http::HeaderValue,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::handlers::{achievements, auth, dashboard, goals, journal, notifications, sessions, system};
use crate::state::SharedState;
use crate::ws::ws_handler;

/// Build and return the full Axum router.
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/students", get(auth::linked_students).post(auth::link_student))
        .route("/api/auth/link-codes", post(auth::issue_link_code))

        // Journal
        .route("/api/journal/entries", get(journal::list_entries).post(journal::create_entry))
        .route(
            "/api/journal/entries/{id}",
            get(journal::get_entry).put(journal::update_entry).delete(journal::delete_entry),
        )
        .route("/api/journal/tags/suggestions", get(journal::tag_suggestions))
        .route("/api/journal/search/suggestions", get(journal::search_suggestions))
        .route("/api/journal/mood-summary", get(journal::mood_summary))

        // Problem sessions
        .route("/api/problems/sessions", get(sessions::list_sessions).post(sessions::start_session))
        .route("/api/problems/sessions/{id}", get(sessions::get_session))
        .route("/api/problems/sessions/{id}/steps", post(sessions::record_step))
        .route("/api/problems/sessions/{id}/hint", post(sessions::use_hint))
        .route("/api/problems/sessions/{id}/complete", post(sessions::complete_session))
        .route("/api/problems/sessions/{id}/abandon", post(sessions::abandon_session))
        .route("/api/problems/recommendation", get(sessions::recommendation))
        .route("/api/problems/analytics", get(sessions::analytics))

        // Dashboards
        .route("/api/dashboard/student", get(dashboard::student_dashboard))
        .route("/api/dashboard/teacher", get(dashboard::teacher_dashboard))
        .route("/api/dashboard/parent", get(dashboard::parent_dashboard))
        .route(
            "/api/dashboard/preferences",
            get(dashboard::get_preferences).put(dashboard::save_preferences),
        )

        // Goals & achievements
        .route("/api/goals", get(goals::list_goals).post(goals::create_goal))
        .route("/api/goals/{id}", patch(goals::update_goal).delete(goals::delete_goal))
        .route("/api/goals/{id}/progress", post(goals::goal_progress))
        .route("/api/achievements", get(achievements::list_achievements))

        // Notifications
        .route("/api/notifications", get(notifications::list_notifications))
        .route("/api/notifications/unread-count", get(notifications::unread_count))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route(
            "/api/notifications/preferences",
            get(notifications::get_preferences).put(notifications::set_preferences),
        )
        .route("/api/notifications/messages", post(notifications::send_message))
        .route("/api/notifications/{id}", delete(notifications::delete_notification))
        .route("/api/notifications/{id}/read", post(notifications::mark_read))

        // System
        .route("/api/health", get(system::health))
        .route("/api/system/stats", get(system::stats))

        // WebSocket push
        .route("/ws/notifications", get(ws_handler))

        // Middleware
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Permissive with no configured origins, otherwise only the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
