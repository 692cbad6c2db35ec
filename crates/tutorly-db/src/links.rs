//! Student-approved links to parents and teachers.
//!
//! A student issues a short code and hands it over out of band. Redeeming
//! it is the only way a parent or teacher becomes linked, so knowing a
//! student's email is not enough to read their data. Codes are single use,
//! expire, and are stored as SHA-256 digests like bearer tokens.

use crate::error::{DbError, Result};
use crate::schema::{LinkCode, User, UserRow};
use crate::tokens::hash_token;
use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::{PgConnection, PgPool};
use tutorly_common::Role;
use uuid::Uuid;

/// No 0/O or 1/I, so codes survive being read aloud.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 8;

#[derive(Clone)]
pub struct LinkCodeRepository {
    pool: PgPool,
}

impl LinkCodeRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Issue a code for `student_id`. Any earlier code stops working.
    pub async fn issue(&self, student_id: Uuid, ttl: Duration) -> Result<LinkCode> {
        let mut tx = self.pool.begin().await?;
        expect_role(&mut tx, student_id, Role::Student).await?;

        sqlx::query("DELETE FROM student_link_codes WHERE student_id = $1")
            .bind(student_id)
            .execute(&mut *tx)
            .await?;

        let code = generate_code();
        let expires_at = Utc::now() + ttl;
        sqlx::query("INSERT INTO student_link_codes (code_hash, student_id, expires_at) VALUES ($1, $2, $3)")
            .bind(hash_token(&normalise_code(&code)))
            .bind(student_id)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(%student_id, "Link code issued");
        Ok(LinkCode { code, expires_at })
    }

    /// Consume `code` and link its student to `guardian`. Returns the student.
    /// `relationship` is recorded for parents only.
    pub async fn redeem(&self, guardian: &User, code: &str, relationship: Option<&str>) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let student_id: Uuid = sqlx::query_scalar(
            "DELETE FROM student_link_codes WHERE code_hash = $1 AND expires_at > now() RETURNING student_id",
        )
        .bind(hash_token(&normalise_code(code)))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::Validation("link code is invalid or expired".into()))?;

        match guardian.role {
            Role::Parent => {
                sqlx::query(
                    r#"
                    INSERT INTO parent_students (parent_id, student_id, relationship)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (parent_id, student_id) DO UPDATE SET relationship = EXCLUDED.relationship
                    "#,
                )
                .bind(guardian.id)
                .bind(student_id)
                .bind(relationship.unwrap_or("guardian"))
                .execute(&mut *tx)
                .await?;
            }
            Role::Teacher => {
                sqlx::query(
                    "INSERT INTO teacher_students (teacher_id, student_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                )
                .bind(guardian.id)
                .bind(student_id)
                .execute(&mut *tx)
                .await?;
            }
            other => {
                return Err(DbError::Validation(format!("a {other} cannot be linked to a student")));
            }
        }

        let student: User = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, display_name, role, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(student_id)
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        tx.commit().await?;
        tracing::info!(guardian_id = %guardian.id, role = %guardian.role, %student_id, "Student linked");
        Ok(student)
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM student_link_codes WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

async fn expect_role(conn: &mut PgConnection, id: Uuid, role: Role) -> Result<()> {
    let actual: String = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::NotFound("User".into()))?;
    let actual: Role = actual.parse()?;
    if actual != role {
        return Err(DbError::Validation(format!("user {id} is a {actual}, expected a {role}")));
    }
    Ok(())
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let chars: String = (0..CODE_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
        .collect();
    format!("{}-{}", &chars[..CODE_LEN / 2], &chars[CODE_LEN / 2..])
}

/// Case and separators do not matter when a code is typed back in.
pub fn normalise_code(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
