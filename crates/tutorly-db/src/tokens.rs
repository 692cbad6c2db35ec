//! Opaque bearer tokens.
//!
//! The raw token is handed to the client once; only its SHA-256 digest is
//! stored, so a database dump cannot be replayed as a session.

use crate::error::Result;
use crate::schema::{User, UserRow};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

const TOKEN_PREFIX: &str = "tly_";

#[derive(Clone)]
pub struct TokenRepository {
    pool: PgPool,
}

impl TokenRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Issue a token valid for `ttl` and return the raw value.
    pub async fn issue(&self, user_id: Uuid, ttl: Duration) -> Result<String> {
        let raw = generate_token();
        sqlx::query("INSERT INTO auth_tokens (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(hash_token(&raw))
            .bind(user_id)
            .bind(Utc::now() + ttl)
            .execute(&self.pool)
            .await?;
        Ok(raw)
    }

    /// The user behind an unexpired token, if any.
    pub async fn resolve(&self, raw: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT u.id, u.email, u.password_hash, u.display_name, u.role, u.created_at, u.updated_at
            FROM auth_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token_hash = $1 AND t.expires_at > now()
            "#,
        )
        .bind(hash_token(raw))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    /// Returns whether a token was actually removed.
    pub async fn revoke(&self, raw: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE token_hash = $1")
            .bind(hash_token(raw))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        if result.rows_affected() > 0 {
            tracing::debug!(purged = result.rows_affected(), "Expired tokens removed");
        }
        Ok(result.rows_affected())
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{TOKEN_PREFIX}{}", hex::encode(bytes))
}

pub(crate) fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let t = generate_token();
        assert!(t.starts_with(TOKEN_PREFIX));
        assert_eq!(t.len(), TOKEN_PREFIX.len() + 64);
        assert_ne!(t, generate_token());
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let h = hash_token("tly_abc");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_token("tly_abc"));
        assert_ne!(h, hash_token("tly_abd"));
    }
}
