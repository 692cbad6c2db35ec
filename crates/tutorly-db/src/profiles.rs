//! Per-subject performance profiles and the difficulty recommendation cache.

use crate::error::{DbError, Result};
use crate::schema::{CachedRecommendation, PerformanceProfile, RecommendationOutcome, RecommendationRow};
use crate::sessions::{load_samples, normalise_subject};
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, PgPool};
use tutorly_adapt::{recommend, summarize, AdaptationParams};
use tutorly_common::Difficulty;
use uuid::Uuid;

const PROFILE_COLUMNS: &str = "student_id, subject, sessions_count, avg_accuracy, avg_composite, \
     avg_time_seconds, avg_hints, avg_mistakes, updated_at";
/// Upper bound on sessions folded into a profile.
const PROFILE_HISTORY_LIMIT: i64 = 10_000;

#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Recompute a student's profile for `subject` from every completed
    /// session and store it.
    pub async fn update_student_performance_profile(
        &self,
        student_id: Uuid,
        subject: &str,
        params: &AdaptationParams,
    ) -> Result<PerformanceProfile> {
        let mut tx = self.pool.begin().await?;
        let profile = refresh_profile(&mut tx, student_id, subject, params).await?;
        tx.commit().await?;
        Ok(profile)
    }

    pub async fn get_profile(&self, student_id: Uuid, subject: &str) -> Result<Option<PerformanceProfile>> {
        Ok(sqlx::query_as(&format!(
            "SELECT {PROFILE_COLUMNS} FROM student_performance_profiles WHERE student_id = $1 AND subject = $2"
        ))
        .bind(student_id)
        .bind(normalise_subject(subject))
        .fetch_optional(&self.pool)
        .await?)
    }

    // ── Recommendations ──────────────────────────────────────────────────────

    /// Recommend a difficulty for the next session in `subject`.
    pub async fn recommend_optimal_difficulty(
        &self,
        student_id: Uuid,
        subject: &str,
        params: &AdaptationParams,
        now: DateTime<Utc>,
    ) -> Result<RecommendationOutcome> {
        let mut tx = self.pool.begin().await?;
        let outcome = refresh_recommendation(&mut tx, student_id, subject, params, now).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn cached_recommendation(&self, student_id: Uuid, subject: &str) -> Result<Option<CachedRecommendation>> {
        let row: Option<RecommendationRow> = sqlx::query_as(
            r#"
            SELECT student_id, subject, recommended, confidence, reason, computed_at
            FROM difficulty_recommendations WHERE student_id = $1 AND subject = $2
            "#,
        )
        .bind(student_id)
        .bind(normalise_subject(subject))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CachedRecommendation::try_from).transpose()?)
    }
}

pub(crate) async fn refresh_profile(
    conn: &mut PgConnection,
    student_id: Uuid,
    subject: &str,
    params: &AdaptationParams,
) -> Result<PerformanceProfile> {
    let subject = normalise_subject(subject);

    // Serialise concurrent recomputations for the same profile.
    sqlx::query("SELECT 1 FROM student_performance_profiles WHERE student_id = $1 AND subject = $2 FOR UPDATE")
        .bind(student_id)
        .bind(&subject)
        .execute(&mut *conn)
        .await?;

    let samples = load_samples(&mut *conn, student_id, &subject, None, PROFILE_HISTORY_LIMIT).await?;
    let summary = summarize(&samples, params);

    let profile: PerformanceProfile = sqlx::query_as(&format!(
        r#"
        INSERT INTO student_performance_profiles
            (student_id, subject, sessions_count, avg_accuracy, avg_composite,
             avg_time_seconds, avg_hints, avg_mistakes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (student_id, subject) DO UPDATE SET
            sessions_count   = EXCLUDED.sessions_count,
            avg_accuracy     = EXCLUDED.avg_accuracy,
            avg_composite    = EXCLUDED.avg_composite,
            avg_time_seconds = EXCLUDED.avg_time_seconds,
            avg_hints        = EXCLUDED.avg_hints,
            avg_mistakes     = EXCLUDED.avg_mistakes
        RETURNING {PROFILE_COLUMNS}
        "#
    ))
    .bind(student_id)
    .bind(&subject)
    .bind(summary.sessions as i32)
    .bind(summary.avg_accuracy)
    .bind(summary.avg_composite)
    .bind(summary.avg_time_seconds)
    .bind(summary.avg_hints)
    .bind(summary.avg_mistakes)
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!(%student_id, %subject, sessions = summary.sessions, "Performance profile updated");
    Ok(profile)
}

/// Without a profile the student has no history, so the answer is
/// `medium` and nothing is cached. Otherwise the recent window is scored,
/// the cache row is replaced, and the previously cached value is
/// returned alongside.
pub(crate) async fn refresh_recommendation(
    conn: &mut PgConnection,
    student_id: Uuid,
    subject: &str,
    params: &AdaptationParams,
    now: DateTime<Utc>,
) -> Result<RecommendationOutcome> {
    let subject = normalise_subject(subject);
    if subject.is_empty() {
        return Err(DbError::Validation("subject must not be empty".into()));
    }

    let previous: Option<String> = sqlx::query_scalar(
        "SELECT recommended FROM difficulty_recommendations WHERE student_id = $1 AND subject = $2 FOR UPDATE",
    )
    .bind(student_id)
    .bind(&subject)
    .fetch_optional(&mut *conn)
    .await?;
    let previous = previous.map(|p| p.parse::<Difficulty>()).transpose()?;

    let has_profile: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM student_performance_profiles WHERE student_id = $1 AND subject = $2)",
    )
    .bind(student_id)
    .bind(&subject)
    .fetch_one(&mut *conn)
    .await?;

    if !has_profile {
        return Ok(RecommendationOutcome {
            current: CachedRecommendation {
                student_id,
                subject,
                recommended: Difficulty::Medium,
                confidence: 0.0,
                reason: tutorly_adapt::RecommendationReason::NoHistory.as_str().to_string(),
                computed_at: now,
            },
            previous,
        });
    }

    let since = now - Duration::days(params.window_days);
    let samples = load_samples(&mut *conn, student_id, &subject, Some(since), params.max_sessions as i64).await?;
    let rec = recommend(&samples, now, params);

    let row: RecommendationRow = sqlx::query_as(
        r#"
        INSERT INTO difficulty_recommendations
            (student_id, subject, recommended, confidence, reason, computed_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (student_id, subject) DO UPDATE SET
            recommended = EXCLUDED.recommended,
            confidence  = EXCLUDED.confidence,
            reason      = EXCLUDED.reason,
            computed_at = EXCLUDED.computed_at
        RETURNING student_id, subject, recommended, confidence, reason, computed_at
        "#,
    )
    .bind(student_id)
    .bind(&subject)
    .bind(rec.difficulty.as_str())
    .bind(rec.confidence)
    .bind(rec.reason.as_str())
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(RecommendationOutcome { current: row.try_into()?, previous })
}
