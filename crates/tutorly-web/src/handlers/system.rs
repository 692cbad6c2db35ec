//! Liveness and database status.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;

use tutorly_common::{ApiResult, Role};
use tutorly_db::DatabaseStats;

use crate::auth::CurrentUser;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: bool,
    pub version: &'static str,
}

/// GET /api/health - 200 when the database answers, 503 otherwise
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<Health>) {
    let database = match state.db.health_check().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "database health check failed");
            false
        }
    };

    let (code, status) = if database {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (code, Json(Health { status, database, version: env!("CARGO_PKG_VERSION") }))
}

/// GET /api/system/stats - Pool and table counts (admin only)
pub async fn stats(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> ApiResult<Json<DatabaseStats>> {
    current.require_role(&[Role::Admin])?;
    Ok(Json(state.db.stats().await?))
}
