//! Guided problem-solving sessions and their step log.

use crate::error::{DbError, Result};
use crate::schema::{
    CompleteSession, NewSession, NewStep, ProblemSession, ScorePoint, SessionCompletion, SessionFilter,
    SessionRow, SessionStep, SubjectStats,
};
use crate::{achievements, profiles, streaks};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tutorly_adapt::{composite_score, AdaptationParams, SessionSample};
use tutorly_common::Difficulty;
use uuid::Uuid;

const SESSION_COLUMNS: &str = "id, student_id, subject, difficulty, problem_text, status, \
     total_steps, completed_steps, hints_used, mistakes, accuracy, time_spent_seconds, \
     composite_score, started_at, completed_at, updated_at";
pub const MAX_STEPS: i32 = 100;

/// Subjects are matched case-insensitively.
pub fn normalise_subject(subject: &str) -> String {
    subject.trim().to_lowercase()
}

/// Share of recorded steps answered correctly. Falls back to step
/// completion when nothing was recorded.
pub fn derive_accuracy(correct_steps: i64, recorded_steps: i64, completed: i32, total: i32) -> f64 {
    if recorded_steps > 0 {
        correct_steps as f64 / recorded_steps as f64
    } else if total > 0 {
        (f64::from(completed) / f64::from(total)).min(1.0)
    } else {
        0.0
    }
}

#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn start(&self, student_id: Uuid, new: &NewSession, difficulty: Difficulty) -> Result<ProblemSession> {
        let subject = normalise_subject(&new.subject);
        if subject.is_empty() {
            return Err(DbError::Validation("subject must not be empty".into()));
        }
        if !(1..=MAX_STEPS).contains(&new.total_steps) {
            return Err(DbError::Validation(format!("total_steps must be between 1 and {MAX_STEPS}")));
        }

        let row: SessionRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO problem_sessions (student_id, subject, difficulty, problem_text, total_steps)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(student_id)
        .bind(&subject)
        .bind(difficulty.as_str())
        .bind(&new.problem_text)
        .bind(new.total_steps)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(session_id = %row.id, %subject, %difficulty, "Session started");
        Ok(row.try_into()?)
    }

    pub async fn get(&self, id: Uuid) -> Result<ProblemSession> {
        let row: SessionRow =
            sqlx::query_as(&format!("SELECT {SESSION_COLUMNS} FROM problem_sessions WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::NotFound("Session".into()))?;
        Ok(row.try_into()?)
    }

    pub async fn steps(&self, session_id: Uuid) -> Result<Vec<SessionStep>> {
        Ok(sqlx::query_as(
            r#"
            SELECT id, session_id, step_index, content, is_correct, hint_level, created_at
            FROM session_steps WHERE session_id = $1 ORDER BY step_index
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn list(&self, student_id: Uuid, filter: &SessionFilter) -> Result<Vec<ProblemSession>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SESSION_COLUMNS} FROM problem_sessions
            WHERE student_id = $1
              AND ($2::text IS NULL OR subject = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY started_at DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(student_id)
        .bind(filter.subject.as_deref().map(normalise_subject))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit.unwrap_or(20).clamp(1, 100))
        .bind(filter.offset.unwrap_or(0).max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| ProblemSession::try_from(r).map_err(DbError::from))
            .collect()
    }

    // ── Scaffolding ──────────────────────────────────────────────────────────

    /// Log one attempted step. A correct step advances progress, an
    /// incorrect one counts as a mistake.
    pub async fn record_step(&self, session_id: Uuid, step: &NewStep) -> Result<(ProblemSession, SessionStep)> {
        let mut tx = self.pool.begin().await?;
        let session = lock_open_session(&mut tx, session_id).await?;

        let recorded: SessionStep = sqlx::query_as(
            r#"
            INSERT INTO session_steps (session_id, step_index, content, is_correct, hint_level)
            VALUES ($1,
                    (SELECT COUNT(*)::int FROM session_steps WHERE session_id = $1),
                    $2, $3, $4)
            RETURNING id, session_id, step_index, content, is_correct, hint_level, created_at
            "#,
        )
        .bind(session_id)
        .bind(&step.content)
        .bind(step.is_correct)
        .bind(session.hints_used)
        .fetch_one(&mut *tx)
        .await?;

        let row: SessionRow = sqlx::query_as(&format!(
            r#"
            UPDATE problem_sessions
            SET completed_steps = CASE WHEN $2 THEN LEAST(completed_steps + 1, total_steps)
                                       ELSE completed_steps END,
                mistakes = mistakes + CASE WHEN $2 THEN 0 ELSE 1 END
            WHERE id = $1
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(step.is_correct)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((row.try_into()?, recorded))
    }

    /// Consume one scaffolding hint, up to `max_hints` per session.
    pub async fn use_hint(&self, session_id: Uuid, max_hints: u32) -> Result<ProblemSession> {
        let mut tx = self.pool.begin().await?;
        let session = lock_open_session(&mut tx, session_id).await?;
        if session.hints_used >= max_hints as i32 {
            return Err(DbError::Validation(format!("all {max_hints} hints already used")));
        }

        let row: SessionRow = sqlx::query_as(&format!(
            "UPDATE problem_sessions SET hints_used = hints_used + 1 WHERE id = $1 RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.try_into()?)
    }

    /// Close a session and apply everything that follows from it: the
    /// subject profile, the learning streak, the cached recommendation and
    /// newly earned achievements. One transaction covers all of it, so a
    /// failure leaves the session open for a retry.
    pub async fn complete(
        &self,
        session_id: Uuid,
        input: &CompleteSession,
        params: &AdaptationParams,
        now: DateTime<Utc>,
    ) -> Result<SessionCompletion> {
        if input.time_spent_seconds < 0 {
            return Err(DbError::Validation("time_spent_seconds must not be negative".into()));
        }
        let mut tx = self.pool.begin().await?;

        let session = close_session(&mut tx, session_id, input, params, now).await?;
        let student_id = session.student_id;
        let profile = profiles::refresh_profile(&mut tx, student_id, &session.subject, params).await?;
        let streak = streaks::record_activity(&mut tx, student_id, now.date_naive()).await?;
        let recommendation =
            profiles::refresh_recommendation(&mut tx, student_id, &session.subject, params, now).await?;
        let achievements =
            achievements::award_earned(&mut tx, &session, streak.state.current_streak).await?;

        tx.commit().await?;
        tracing::info!(
            %session_id,
            accuracy = ?session.accuracy,
            composite = ?session.composite_score,
            awarded = achievements.len(),
            "Session completed"
        );
        Ok(SessionCompletion { session, profile, streak, recommendation, achievements })
    }

    pub async fn abandon(&self, session_id: Uuid) -> Result<ProblemSession> {
        let mut tx = self.pool.begin().await?;
        lock_open_session(&mut tx, session_id).await?;
        let row: SessionRow = sqlx::query_as(&format!(
            "UPDATE problem_sessions SET status = 'abandoned' WHERE id = $1 RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.try_into()?)
    }

    // ── Analytics inputs ─────────────────────────────────────────────────────

    /// Composite scores in chronological order, most recent `limit` only.
    pub async fn score_history(&self, student_id: Uuid, subject: Option<&str>, limit: i64) -> Result<Vec<ScorePoint>> {
        let mut points: Vec<ScorePoint> = sqlx::query_as(
            r#"
            SELECT id AS session_id, completed_at, composite_score
            FROM problem_sessions
            WHERE student_id = $1 AND status = 'completed'
              AND completed_at IS NOT NULL AND composite_score IS NOT NULL
              AND ($2::text IS NULL OR subject = $2)
            ORDER BY completed_at DESC
            LIMIT $3
            "#,
        )
        .bind(student_id)
        .bind(subject.map(normalise_subject))
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.pool)
        .await?;
        points.reverse();
        Ok(points)
    }

    pub async fn subject_stats(&self, student_id: Uuid) -> Result<Vec<SubjectStats>> {
        Ok(sqlx::query_as(
            r#"
            SELECT subject,
                   COUNT(*) AS sessions,
                   COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                   AVG(accuracy) FILTER (WHERE status = 'completed') AS avg_accuracy,
                   AVG(composite_score) FILTER (WHERE status = 'completed') AS avg_composite,
                   MAX(started_at) AS last_session_at
            FROM problem_sessions
            WHERE student_id = $1
            GROUP BY subject
            ORDER BY subject
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

async fn close_session(
    conn: &mut PgConnection,
    session_id: Uuid,
    input: &CompleteSession,
    params: &AdaptationParams,
    completed_at: DateTime<Utc>,
) -> Result<ProblemSession> {
    let session = lock_open_session(&mut *conn, session_id).await?;

    let accuracy = match input.accuracy {
        Some(a) if !(0.0..=1.0).contains(&a) => {
            return Err(DbError::Validation("accuracy must be between 0 and 1".into()));
        }
        Some(a) => a,
        None => {
            let (correct, recorded): (i64, i64) = sqlx::query_as(
                "SELECT COUNT(*) FILTER (WHERE is_correct), COUNT(*) FROM session_steps WHERE session_id = $1",
            )
            .bind(session_id)
            .fetch_one(&mut *conn)
            .await?;
            derive_accuracy(correct, recorded, session.completed_steps, session.total_steps)
        }
    };

    let sample = SessionSample {
        difficulty: session.difficulty,
        accuracy,
        time_spent_seconds: f64::from(input.time_spent_seconds),
        hints_used: session.hints_used.max(0) as u32,
        mistakes: session.mistakes.max(0) as u32,
        completed_at,
    };
    let score = composite_score(&sample, params);

    let row: SessionRow = sqlx::query_as(&format!(
        r#"
        UPDATE problem_sessions
        SET status = 'completed', accuracy = $2, time_spent_seconds = $3,
            composite_score = $4, completed_at = $5
        WHERE id = $1
        RETURNING {SESSION_COLUMNS}
        "#
    ))
    .bind(session_id)
    .bind(accuracy)
    .bind(input.time_spent_seconds)
    .bind(score)
    .bind(completed_at)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.try_into()?)
}

/// Lock a session row and require it to still be in progress.
async fn lock_open_session(conn: &mut PgConnection, session_id: Uuid) -> Result<ProblemSession> {
    let session: ProblemSession = sqlx::query_as::<_, SessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM problem_sessions WHERE id = $1 FOR UPDATE"
    ))
    .bind(session_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::NotFound("Session".into()))?
    .try_into()?;

    if !session.status.is_open() {
        return Err(DbError::Validation(format!("session is already {}", session.status)));
    }
    Ok(session)
}

pub(crate) async fn load_samples<'e, E>(
    executor: E,
    student_id: Uuid,
    subject: &str,
    since: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<SessionSample>>
where
    E: sqlx::PgExecutor<'e>,
{
    let rows: Vec<(String, f64, i32, i32, i32, DateTime<Utc>)> = sqlx::query_as(
        r#"
        SELECT difficulty, accuracy, time_spent_seconds, hints_used, mistakes, completed_at
        FROM problem_sessions
        WHERE student_id = $1 AND subject = $2 AND status = 'completed'
          AND ($3::timestamptz IS NULL OR completed_at >= $3)
          AND accuracy IS NOT NULL AND time_spent_seconds IS NOT NULL
        ORDER BY completed_at DESC
        LIMIT $4
        "#,
    )
    .bind(student_id)
    .bind(normalise_subject(subject))
    .bind(since)
    .bind(limit)
    .fetch_all(executor)
    .await?;

    rows.into_iter()
        .map(|(difficulty, accuracy, time, hints, mistakes, completed_at)| -> Result<SessionSample> {
            Ok(SessionSample {
                difficulty: difficulty.parse::<Difficulty>()?,
                accuracy,
                time_spent_seconds: f64::from(time),
                hints_used: hints.max(0) as u32,
                mistakes: mistakes.max(0) as u32,
                completed_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_accuracy_from_steps() {
        assert!((derive_accuracy(3, 4, 3, 5) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_derive_accuracy_without_steps() {
        assert!((derive_accuracy(0, 0, 2, 4) - 0.5).abs() < 1e-9);
        assert_eq!(derive_accuracy(0, 0, 0, 0), 0.0);
        assert_eq!(derive_accuracy(0, 0, 9, 4), 1.0);
    }

    #[test]
    fn test_normalise_subject() {
        assert_eq!(normalise_subject("  Algebra "), "algebra");
    }
}
