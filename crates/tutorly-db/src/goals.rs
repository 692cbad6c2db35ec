//! Student goals.

use crate::error::{DbError, Result};
use crate::schema::{Goal, GoalProgress, GoalRow, NewGoal};
use sqlx::PgPool;
use tutorly_common::GoalStatus;
use uuid::Uuid;

const GOAL_COLUMNS: &str = "id, student_id, title, description, target_value, current_value, \
     status, due_date, created_at, updated_at";

#[derive(Clone)]
pub struct GoalRepository {
    pool: PgPool,
}

impl GoalRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn create(&self, student_id: Uuid, new: &NewGoal) -> Result<Goal> {
        if new.title.trim().is_empty() {
            return Err(DbError::Validation("title must not be empty".into()));
        }
        if new.target_value <= 0 {
            return Err(DbError::Validation("target_value must be positive".into()));
        }
        let row: GoalRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO goals (student_id, title, description, target_value, due_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(student_id)
        .bind(new.title.trim())
        .bind(&new.description)
        .bind(new.target_value)
        .bind(new.due_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_into()?)
    }

    pub async fn list(&self, student_id: Uuid, status: Option<GoalStatus>) -> Result<Vec<Goal>> {
        let rows: Vec<GoalRow> = sqlx::query_as(&format!(
            r#"
            SELECT {GOAL_COLUMNS} FROM goals
            WHERE student_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY due_date NULLS LAST, created_at
            "#
        ))
        .bind(student_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| Goal::try_from(r).map_err(DbError::from))
            .collect()
    }

    pub async fn get(&self, id: Uuid) -> Result<Goal> {
        let row: GoalRow = sqlx::query_as(&format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound("Goal".into()))?;
        Ok(row.try_into()?)
    }

    /// Add `delta` to an active goal. Reaching the target completes it; the
    /// sum is taken in 64 bits and capped at the target, so any positive
    /// `delta` is accepted.
    pub async fn update_progress(&self, id: Uuid, delta: i32) -> Result<GoalProgress> {
        if delta <= 0 {
            return Err(DbError::Validation("progress increment must be positive".into()));
        }
        let mut tx = self.pool.begin().await?;

        let status: String = sqlx::query_scalar("SELECT status FROM goals WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::NotFound("Goal".into()))?;
        if status.parse::<GoalStatus>()? != GoalStatus::Active {
            return Err(DbError::Validation(format!("goal is {status}")));
        }

        let row: GoalRow = sqlx::query_as(&format!(
            r#"
            UPDATE goals
            SET current_value = LEAST(current_value::bigint + $2, target_value)::int,
                status = CASE WHEN current_value::bigint + $2 >= target_value THEN 'completed' ELSE status END
            WHERE id = $1
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(delta)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        let goal: Goal = row.try_into()?;
        let just_completed = goal.status == GoalStatus::Completed;
        Ok(GoalProgress { goal, just_completed })
    }

    pub async fn update_status(&self, id: Uuid, status: GoalStatus) -> Result<Goal> {
        let row: GoalRow = sqlx::query_as(&format!(
            "UPDATE goals SET status = $2 WHERE id = $1 RETURNING {GOAL_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound("Goal".into()))?;
        Ok(row.try_into()?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM goals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("Goal".into()));
        }
        Ok(())
    }
}
