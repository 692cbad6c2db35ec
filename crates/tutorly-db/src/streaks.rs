//! Daily learning streaks.

use crate::error::Result;
use crate::schema::{InactiveStudent, LearningStreak};
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use tutorly_adapt::StreakUpdate;
use uuid::Uuid;

#[derive(Clone)]
pub struct StreakRepository {
    pool: PgPool,
}

impl StreakRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn get(&self, student_id: Uuid) -> Result<Option<LearningStreak>> {
        Ok(sqlx::query_as(
            r#"
            SELECT student_id, current_streak, longest_streak, last_activity_date
            FROM learning_streaks WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Record activity on `today`.
    pub async fn update_learning_streak(&self, student_id: Uuid, today: NaiveDate) -> Result<StreakUpdate> {
        let mut tx = self.pool.begin().await?;
        let update = record_activity(&mut tx, student_id, today).await?;
        tx.commit().await?;
        Ok(update)
    }

    /// Students last active before `cutoff` who have not produced an
    /// engagement alert in the past `quiet_days` days.
    pub async fn inactive_students(&self, cutoff: NaiveDate, quiet_days: i32) -> Result<Vec<InactiveStudent>> {
        Ok(sqlx::query_as(
            r#"
            SELECT u.id AS student_id, u.display_name, s.last_activity_date
            FROM learning_streaks s
            JOIN users u ON u.id = s.student_id
            WHERE s.last_activity_date < $1
              AND NOT EXISTS (
                  SELECT 1 FROM notifications n
                  WHERE n.kind = 'engagement_alert'
                    AND n.data->>'student_id' = u.id::text
                    AND n.created_at > now() - make_interval(days => $2)
              )
            ORDER BY s.last_activity_date
            "#,
        )
        .bind(cutoff)
        .bind(quiet_days)
        .fetch_all(&self.pool)
        .await?)
    }
}

/// The row is locked for the read-modify-write so two sessions finishing
/// together count once.
pub(crate) async fn record_activity(
    conn: &mut PgConnection,
    student_id: Uuid,
    today: NaiveDate,
) -> Result<StreakUpdate> {
    let existing: Option<LearningStreak> = sqlx::query_as(
        r#"
        SELECT student_id, current_streak, longest_streak, last_activity_date
        FROM learning_streaks WHERE student_id = $1 FOR UPDATE
        "#,
    )
    .bind(student_id)
    .fetch_optional(&mut *conn)
    .await?;

    let update = tutorly_adapt::update_learning_streak(existing.as_ref().map(LearningStreak::state), today);
    if update.changed {
        sqlx::query(
            r#"
            INSERT INTO learning_streaks (student_id, current_streak, longest_streak, last_activity_date)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (student_id) DO UPDATE SET
                current_streak     = EXCLUDED.current_streak,
                longest_streak     = EXCLUDED.longest_streak,
                last_activity_date = EXCLUDED.last_activity_date
            "#,
        )
        .bind(student_id)
        .bind(update.state.current_streak)
        .bind(update.state.longest_streak)
        .bind(update.state.last_activity_date)
        .execute(&mut *conn)
        .await?;
    }
    if update.reset {
        tracing::debug!(%student_id, "Learning streak reset");
    }
    Ok(update)
}
