//! User repository: accounts, role rows and guardian/teacher link lookups.

use crate::error::{DbError, Result};
use crate::schema::{NewUser, User, UserCredentials, UserRow};
use sqlx::PgPool;
use tutorly_common::Role;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "u.id, u.email, u.password_hash, u.display_name, u.role, u.created_at, u.updated_at";

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Create an account and its role row in one transaction.
    pub async fn create(&self, new: &NewUser) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (email, password_hash, display_name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, display_name, role, created_at, updated_at
            "#,
        )
        .bind(normalise_email(&new.email))
        .bind(&new.password_hash)
        .bind(new.display_name.trim())
        .bind(new.role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::unique(e, "Email"))?;

        match new.role {
            Role::Student => {
                sqlx::query("INSERT INTO students (user_id, grade_level) VALUES ($1, $2)")
                    .bind(row.id)
                    .bind(new.grade_level)
                    .execute(&mut *tx)
                    .await?;
            }
            Role::Teacher => {
                sqlx::query("INSERT INTO teachers (user_id, school) VALUES ($1, $2)")
                    .bind(row.id)
                    .bind(&new.school)
                    .execute(&mut *tx)
                    .await?;
            }
            Role::Parent => {
                sqlx::query("INSERT INTO parents (user_id) VALUES ($1)")
                    .bind(row.id)
                    .execute(&mut *tx)
                    .await?;
            }
            Role::Admin => {}
        }

        tx.commit().await?;
        tracing::info!(user_id = %row.id, role = %new.role, "User created");
        Ok(row.try_into()?)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<User> {
        let row: UserRow = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound("User".into()))?;
        Ok(row.try_into()?)
    }

    /// Look up login credentials. Emails compare case-insensitively.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = $1"))
                .bind(normalise_email(email))
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(UserRow::into_credentials).transpose()?)
    }

    /// Hard delete. Every dependent row goes with it.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("User".into()));
        }
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    pub async fn total_points(&self, student_id: Uuid) -> Result<i32> {
        let points: Option<i32> =
            sqlx::query_scalar("SELECT total_points FROM students WHERE user_id = $1")
                .bind(student_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(points.unwrap_or(0))
    }

    // ── Links ────────────────────────────────────────────────────────────────

    pub async fn children_of(&self, parent_id: Uuid) -> Result<Vec<User>> {
        self.linked_students(
            "SELECT {cols} FROM users u JOIN parent_students l ON l.student_id = u.id \
             WHERE l.parent_id = $1 ORDER BY u.display_name",
            parent_id,
        )
        .await
    }

    pub async fn students_of(&self, teacher_id: Uuid) -> Result<Vec<User>> {
        self.linked_students(
            "SELECT {cols} FROM users u JOIN teacher_students l ON l.student_id = u.id \
             WHERE l.teacher_id = $1 ORDER BY u.display_name",
            teacher_id,
        )
        .await
    }

    pub async fn is_guardian_of(&self, parent_id: Uuid, student_id: Uuid) -> Result<bool> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM parent_students WHERE parent_id = $1 AND student_id = $2)",
        )
        .bind(parent_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn teaches(&self, teacher_id: Uuid, student_id: Uuid) -> Result<bool> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM teacher_students WHERE teacher_id = $1 AND student_id = $2)",
        )
        .bind(teacher_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?)
    }

    /// Teachers and parents linked to a student.
    pub async fn watchers_of(&self, student_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT teacher_id FROM teacher_students WHERE student_id = $1
            UNION
            SELECT parent_id FROM parent_students WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn linked_students(&self, template: &str, owner: Uuid) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&template.replace("{cols}", USER_COLUMNS))
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| User::try_from(r).map_err(DbError::from))
            .collect()
    }
}

fn normalise_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_email() {
        assert_eq!(normalise_email("  Ada@Example.COM "), "ada@example.com");
    }
}
