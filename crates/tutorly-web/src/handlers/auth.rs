//! Registration, login, logout and account links.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use tutorly_common::{ApiError, ApiResult, Role};
use tutorly_db::{NewUser, User};

use crate::auth::{hash_password_blocking, verify_password_blocking, CurrentUser};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub grade_level: Option<i32>,
    #[serde(default)]
    pub school: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
    pub expires_in_hours: i64,
}

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    /// Code the student issued through `POST /api/auth/link-codes`.
    pub code: String,
    /// Parents only; defaults to "guardian".
    #[serde(default)]
    pub relationship: Option<String>,
}

fn validate_registration(req: &RegisterRequest, min_password: usize) -> ApiResult<()> {
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("A valid email is required".into()));
    }
    if req.password.chars().count() < min_password {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {min_password} characters"
        )));
    }
    if req.display_name.trim().is_empty() {
        return Err(ApiError::BadRequest("display_name must not be empty".into()));
    }
    if req.role == Role::Admin {
        return Err(ApiError::Forbidden("Admin accounts cannot be self-registered".into()));
    }
    Ok(())
}

// === API Endpoints ===

/// POST /api/auth/register - Create an account and sign in
pub async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_registration(&req, state.config.auth.min_password_length)?;

    let password_hash = hash_password_blocking(req.password).await?;
    let user = state
        .users
        .create(&NewUser {
            email: req.email,
            password_hash,
            display_name: req.display_name,
            role: req.role,
            grade_level: req.grade_level,
            school: req.school,
        })
        .await?;

    let token = state.tokens.issue(user.id, state.token_ttl()).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse { token, user, expires_in_hours: state.config.auth.token_ttl_hours }),
    ))
}

/// POST /api/auth/login - Exchange credentials for a bearer token
pub async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".into());

    let credentials = state.users.find_by_email(&req.email).await?.ok_or_else(invalid)?;
    if !verify_password_blocking(req.password, credentials.password_hash).await? {
        return Err(invalid());
    }

    let user = credentials.user;
    let token = state.tokens.issue(user.id, state.token_ttl()).await?;
    info!(user_id = %user.id, "User signed in");
    Ok(Json(AuthResponse { token, user, expires_in_hours: state.config.auth.token_ttl_hours }))
}

/// POST /api/auth/logout - Revoke the presented token
pub async fn logout(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> ApiResult<StatusCode> {
    state.tokens.revoke(&current.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me - The signed-in user
pub async fn me(current: CurrentUser) -> Json<User> {
    Json(current.user)
}

/// GET /api/auth/students - Children of a parent or students of a teacher
pub async fn linked_students(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<User>>> {
    let students = match current.user.role {
        Role::Parent => state.users.children_of(current.id()).await?,
        Role::Teacher => state.users.students_of(current.id()).await?,
        _ => return Err(ApiError::Forbidden("Only parents and teachers have linked students".into())),
    };
    Ok(Json(students))
}

/// POST /api/auth/link-codes - A student issues a code approving one link
pub async fn issue_link_code(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    current.require_student()?;
    let code = state.links.issue(current.id(), state.link_code_ttl()).await?;
    Ok((StatusCode::CREATED, Json(code)))
}

/// POST /api/auth/students - Redeem a student's link code
pub async fn link_student(
    State(state): State<SharedState>,
    current: CurrentUser,
    Json(req): Json<LinkRequest>,
) -> ApiResult<Json<User>> {
    current.require_role(&[Role::Parent, Role::Teacher])?;
    if req.code.trim().is_empty() {
        return Err(ApiError::BadRequest("code is required".into()));
    }
    let relationship = req.relationship.as_deref().map(str::trim).filter(|r| !r.is_empty());
    let student = state.links.redeem(&current.user, &req.code, relationship).await?;
    Ok(Json(student))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str, role: Role) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            display_name: "Sam".into(),
            role,
            grade_level: None,
            school: None,
        }
    }

    #[test]
    fn test_registration_rules() {
        assert!(validate_registration(&request("sam@example.com", "longenough", Role::Student), 8).is_ok());

        let short = validate_registration(&request("sam@example.com", "short", Role::Student), 8);
        assert!(matches!(short, Err(ApiError::BadRequest(_))));

        let email = validate_registration(&request("not-an-email", "longenough", Role::Parent), 8);
        assert!(matches!(email, Err(ApiError::BadRequest(_))));

        let admin = validate_registration(&request("root@example.com", "longenough", Role::Admin), 8);
        assert!(matches!(admin, Err(ApiError::Forbidden(_))));
    }
}
