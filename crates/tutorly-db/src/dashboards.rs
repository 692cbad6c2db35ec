//! Role dashboards and saved widget layouts.

use crate::achievements::AchievementRepository;
use crate::error::{DbError, Result};
use crate::goals::GoalRepository;
use crate::notifications::NotificationRepository;
use crate::schema::{
    DashboardPreferences, ParentOverview, SessionFilter, StudentOverview, StudentSummary,
    TeacherOverview,
};
use crate::sessions::SessionRepository;
use crate::streaks::StreakRepository;
use crate::users::UserRepository;
use chrono::NaiveDate;
use sqlx::PgPool;
use tutorly_adapt::engagement_level;
use tutorly_common::{EngagementLevel, GoalStatus};
use uuid::Uuid;

const RECENT_SESSIONS: i64 = 5;

#[derive(sqlx::FromRow)]
struct SummaryRow {
    student_id: Uuid,
    display_name: String,
    total_points: i32,
    current_streak: i32,
    last_activity_date: Option<NaiveDate>,
    sessions_last_7_days: i64,
    avg_composite: Option<f64>,
}

impl SummaryRow {
    fn into_summary(self, today: NaiveDate) -> StudentSummary {
        StudentSummary {
            engagement: engagement_level(self.current_streak, self.last_activity_date, today),
            student_id: self.student_id,
            display_name: self.display_name,
            total_points: self.total_points,
            current_streak: self.current_streak,
            last_activity_date: self.last_activity_date,
            sessions_last_7_days: self.sessions_last_7_days,
            avg_composite: self.avg_composite,
        }
    }
}

#[derive(Clone)]
pub struct DashboardRepository {
    pool: PgPool,
}

impl DashboardRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn student_overview(&self, student_id: Uuid, today: NaiveDate) -> Result<StudentOverview> {
        let users = UserRepository::new(self.pool.clone());
        let sessions = SessionRepository::new(self.pool.clone());

        let student = users.find_by_id(student_id).await?;
        let streak = StreakRepository::new(self.pool.clone()).get(student_id).await?;
        let engagement = match &streak {
            Some(s) => engagement_level(s.current_streak, s.last_activity_date, today),
            None => EngagementLevel::NeedsAttention,
        };
        let recent = SessionFilter { limit: Some(RECENT_SESSIONS), ..SessionFilter::default() };

        Ok(StudentOverview {
            total_points: users.total_points(student_id).await?,
            subjects: sessions.subject_stats(student_id).await?,
            recent_sessions: sessions.list(student_id, &recent).await?,
            active_goals: GoalRepository::new(self.pool.clone())
                .list(student_id, Some(GoalStatus::Active))
                .await?,
            achievements: AchievementRepository::new(self.pool.clone())
                .list_for_student(student_id)
                .await?,
            unread_notifications: NotificationRepository::new(self.pool.clone())
                .unread_count(student_id)
                .await?,
            student,
            streak,
            engagement,
        })
    }

    pub async fn teacher_overview(&self, teacher_id: Uuid, today: NaiveDate) -> Result<TeacherOverview> {
        let students = self.linked_summaries("teacher_students", "teacher_id", teacher_id, today).await?;
        let needs_attention = students
            .iter()
            .filter(|s| s.engagement == EngagementLevel::NeedsAttention)
            .count();
        Ok(TeacherOverview { students, needs_attention })
    }

    pub async fn parent_overview(&self, parent_id: Uuid, today: NaiveDate) -> Result<ParentOverview> {
        let children = self.linked_summaries("parent_students", "parent_id", parent_id, today).await?;
        Ok(ParentOverview { children })
    }

    async fn linked_summaries(
        &self,
        link_table: &'static str,
        owner_column: &'static str,
        owner_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<StudentSummary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(&format!(
            r#"
            SELECT u.id AS student_id,
                   u.display_name,
                   COALESCE(st.total_points, 0) AS total_points,
                   COALESCE(ls.current_streak, 0) AS current_streak,
                   ls.last_activity_date,
                   (SELECT COUNT(*) FROM problem_sessions ps
                     WHERE ps.student_id = u.id
                       AND ps.started_at >= now() - interval '7 days') AS sessions_last_7_days,
                   (SELECT AVG(ps.composite_score) FROM problem_sessions ps
                     WHERE ps.student_id = u.id AND ps.status = 'completed') AS avg_composite
            FROM {link_table} l
            JOIN users u ON u.id = l.student_id
            LEFT JOIN students st ON st.user_id = u.id
            LEFT JOIN learning_streaks ls ON ls.student_id = u.id
            WHERE l.{owner_column} = $1
            ORDER BY u.display_name
            "#
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_summary(today)).collect())
    }

    // ── Preferences ──────────────────────────────────────────────────────────

    pub async fn get_preferences(&self, user_id: Uuid) -> Result<Option<DashboardPreferences>> {
        Ok(sqlx::query_as(
            "SELECT user_id, layout, updated_at FROM dashboard_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Replace the saved layout. It must be a JSON object.
    pub async fn save_preferences(&self, user_id: Uuid, layout: &serde_json::Value) -> Result<DashboardPreferences> {
        if !layout.is_object() {
            return Err(DbError::Validation("layout must be a JSON object".into()));
        }
        Ok(sqlx::query_as(
            r#"
            INSERT INTO dashboard_preferences (user_id, layout)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET layout = EXCLUDED.layout
            RETURNING user_id, layout, updated_at
            "#,
        )
        .bind(user_id)
        .bind(layout)
        .fetch_one(&self.pool)
        .await?)
    }
}
