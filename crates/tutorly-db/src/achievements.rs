//! Achievement catalogue and awards.
//!
//! Each catalogue row carries a JSON `criteria` object. After a session the
//! student's numbers are checked against every criteria object; all keys
//! must be satisfied. Recognised keys:
//!
//! - `completed_sessions`: at least this many completed sessions
//! - `accuracy`: the session's accuracy reached this value
//! - `hints_used`: the session used at most this many hints
//! - `streak`: the current learning streak is at least this long

use crate::error::{DbError, Result};
use crate::schema::{Achievement, AwardOutcome, EarnedAchievement, ProblemSession};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// What a criteria object is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct AchievementContext {
    pub completed_sessions: i64,
    pub accuracy: Option<f64>,
    pub hints_used: Option<i32>,
    pub current_streak: i32,
}

/// True when every key in `criteria` is satisfied. Empty or unrecognised
/// criteria never match, so such achievements can only be granted directly.
pub fn criteria_met(criteria: &Value, ctx: &AchievementContext) -> bool {
    let Some(map) = criteria.as_object() else {
        return false;
    };
    if map.is_empty() {
        return false;
    }
    map.iter().all(|(key, want)| match (key.as_str(), want.as_f64()) {
        ("completed_sessions", Some(n)) => ctx.completed_sessions as f64 >= n,
        ("accuracy", Some(a)) => ctx.accuracy.is_some_and(|acc| acc >= a - 1e-9),
        ("hints_used", Some(h)) => ctx.hints_used.is_some_and(|used| f64::from(used) <= h),
        ("streak", Some(s)) => f64::from(ctx.current_streak) >= s,
        _ => false,
    })
}

#[derive(Clone)]
pub struct AchievementRepository {
    pool: PgPool,
}

impl AchievementRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn catalogue(&self) -> Result<Vec<Achievement>> {
        Ok(sqlx::query_as(
            "SELECT id, name, description, points, criteria FROM achievements ORDER BY points, id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn list_for_student(&self, student_id: Uuid) -> Result<Vec<EarnedAchievement>> {
        Ok(sqlx::query_as(
            r#"
            SELECT a.id, a.name, a.description, a.points, sa.awarded_at
            FROM student_achievements sa
            JOIN achievements a ON a.id = sa.achievement_id
            WHERE sa.student_id = $1
            ORDER BY sa.awarded_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Award an achievement once. Points are credited in the same
    /// transaction, and only when the award row was actually inserted.
    pub async fn award_achievement(&self, student_id: Uuid, achievement_id: &str) -> Result<AwardOutcome> {
        let mut tx = self.pool.begin().await?;
        let outcome = award(&mut tx, student_id, achievement_id).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Check every achievement the student lacks against a freshly completed
    /// session and award the ones now earned.
    pub async fn evaluate_after_session(
        &self,
        session: &ProblemSession,
        current_streak: i32,
    ) -> Result<Vec<Achievement>> {
        let mut tx = self.pool.begin().await?;
        let awarded = award_earned(&mut tx, session, current_streak).await?;
        tx.commit().await?;
        Ok(awarded)
    }
}

async fn award(conn: &mut PgConnection, student_id: Uuid, achievement_id: &str) -> Result<AwardOutcome> {
    let points: i32 = sqlx::query_scalar("SELECT points FROM achievements WHERE id = $1")
        .bind(achievement_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("Achievement '{achievement_id}'")))?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO student_achievements (student_id, achievement_id)
        VALUES ($1, $2)
        ON CONFLICT (student_id, achievement_id) DO NOTHING
        "#,
    )
    .bind(student_id)
    .bind(achievement_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted == 0 {
        return Ok(AwardOutcome::AlreadyAwarded);
    }

    sqlx::query("UPDATE students SET total_points = total_points + $2 WHERE user_id = $1")
        .bind(student_id)
        .bind(points)
        .execute(&mut *conn)
        .await?;

    tracing::info!(%student_id, achievement = achievement_id, points, "Achievement awarded");
    Ok(AwardOutcome::Awarded { points })
}

pub(crate) async fn award_earned(
    conn: &mut PgConnection,
    session: &ProblemSession,
    current_streak: i32,
) -> Result<Vec<Achievement>> {
    let student_id = session.student_id;
    let completed_sessions: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM problem_sessions WHERE student_id = $1 AND status = 'completed'",
    )
    .bind(student_id)
    .fetch_one(&mut *conn)
    .await?;
    let ctx = AchievementContext {
        completed_sessions,
        accuracy: session.accuracy,
        hints_used: Some(session.hints_used),
        current_streak,
    };

    let pending: Vec<Achievement> = sqlx::query_as(
        r#"
        SELECT a.id, a.name, a.description, a.points, a.criteria
        FROM achievements a
        WHERE NOT EXISTS (
            SELECT 1 FROM student_achievements sa
            WHERE sa.student_id = $1 AND sa.achievement_id = a.id
        )
        ORDER BY a.points, a.id
        "#,
    )
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut awarded = Vec::new();
    for achievement in pending.into_iter().filter(|a| criteria_met(&a.criteria, &ctx)) {
        if let AwardOutcome::Awarded { .. } = award(&mut *conn, student_id, &achievement.id).await? {
            awarded.push(achievement);
        }
    }
    Ok(awarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> AchievementContext {
        AchievementContext {
            completed_sessions: 1,
            accuracy: Some(1.0),
            hints_used: Some(0),
            current_streak: 7,
        }
    }

    #[test]
    fn test_seeded_criteria() {
        let c = ctx();
        assert!(criteria_met(&json!({"completed_sessions": 1}), &c));
        assert!(!criteria_met(&json!({"completed_sessions": 10}), &c));
        assert!(criteria_met(&json!({"accuracy": 1.0}), &c));
        assert!(criteria_met(&json!({"hints_used": 0}), &c));
        assert!(criteria_met(&json!({"streak": 7}), &c));
        assert!(!criteria_met(&json!({"streak": 30}), &c));
    }

    #[test]
    fn test_imperfect_session() {
        let c = AchievementContext { accuracy: Some(0.9), hints_used: Some(2), ..ctx() };
        assert!(!criteria_met(&json!({"accuracy": 1.0}), &c));
        assert!(!criteria_met(&json!({"hints_used": 0}), &c));
    }

    #[test]
    fn test_all_keys_must_hold() {
        let c = ctx();
        assert!(criteria_met(&json!({"completed_sessions": 1, "streak": 3}), &c));
        assert!(!criteria_met(&json!({"completed_sessions": 1, "streak": 8}), &c));
    }

    #[test]
    fn test_empty_or_unknown_never_match() {
        let c = ctx();
        assert!(!criteria_met(&json!({}), &c));
        assert!(!criteria_met(&json!({"moon_phase": 3}), &c));
        assert!(!criteria_met(&json!("first_session"), &c));
    }
}
