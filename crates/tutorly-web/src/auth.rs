//! Bearer authentication and access rules.
//!
//! Students see and change only their own data. Parents read what belongs
//! to linked children, teachers what belongs to their students; both pick
//! the student with a `student_id` query parameter.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use rand::rngs::OsRng;
use uuid::Uuid;

use tutorly_common::{ApiError, ApiResult, Role};
use tutorly_db::User;

use crate::state::SharedState;

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Raw bearer token, kept so logout can revoke it.
    pub token: String,
}

impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized("Missing bearer token".into()))?;

        let token = bearer.token().to_string();
        let user = state
            .tokens
            .resolve(&token)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".into()))?;

        Ok(Self { user, token })
    }
}

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn require_role(&self, allowed: &[Role]) -> ApiResult<()> {
        if allowed.contains(&self.user.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "This action is not available to the {} role",
                self.user.role
            )))
        }
    }

    pub fn require_student(&self) -> ApiResult<()> {
        self.require_role(&[Role::Student])
    }

    /// Writes are reserved to the student who owns the record.
    pub fn ensure_self(&self, student_id: Uuid) -> ApiResult<()> {
        if self.user.id == student_id {
            Ok(())
        } else {
            Err(ApiError::Forbidden("You can only modify your own data".into()))
        }
    }

    /// Whether the caller may read `student_id`'s data.
    pub async fn can_view(&self, state: &SharedState, student_id: Uuid) -> ApiResult<bool> {
        Ok(match self.user.role {
            Role::Student => self.user.id == student_id,
            Role::Parent => state.users.is_guardian_of(self.user.id, student_id).await?,
            Role::Teacher => state.users.teaches(self.user.id, student_id).await?,
            Role::Admin => true,
        })
    }

    pub async fn ensure_can_view(&self, state: &SharedState, student_id: Uuid) -> ApiResult<()> {
        if self.can_view(state, student_id).await? {
            Ok(())
        } else {
            Err(ApiError::Forbidden("You do not have access to this student".into()))
        }
    }

    /// The student a read request is about: the caller when they are a
    /// student, otherwise the `student_id` they asked for, if allowed.
    pub async fn resolve_student(&self, state: &SharedState, requested: Option<Uuid>) -> ApiResult<Uuid> {
        let student_id = match (self.user.role, requested) {
            (Role::Student, None) => return Ok(self.user.id),
            (_, Some(id)) => id,
            (_, None) => return Err(ApiError::BadRequest("student_id is required".into())),
        };
        self.ensure_can_view(state, student_id).await?;
        Ok(student_id)
    }
}

// === Passwords ===

pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// False for a wrong password and for a malformed stored hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

/// Runs on the blocking pool.
pub async fn hash_password_blocking(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
}

pub async fn verify_password_blocking(password: String, stored: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| ApiError::Internal(format!("verification task failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong horse battery", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-real-hash"));
        assert!(!verify_password("", ""));
    }
}
