//! Row models for the PostgreSQL tables.
//!
//! Enumerated columns are stored as TEXT. Each table with such a column has
//! a private `*Row` struct that sqlx decodes into, converted to the public
//! model with `TryFrom`, which parses the text back into its enum.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tutorly_common::{
    Difficulty, EngagementLevel, GoalStatus, Mood, NotificationKind, Role, SessionStatus,
    TutorlyError,
};
use uuid::Uuid;

// =============================================================================
// Users
// =============================================================================

/// An account. The password hash never leaves the repository layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub(crate) fn into_credentials(self) -> Result<UserCredentials, TutorlyError> {
        let password_hash = self.password_hash.clone();
        Ok(UserCredentials { user: self.try_into()?, password_hash })
    }
}

impl TryFrom<UserRow> for User {
    type Error = TutorlyError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            role: row.role.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A user together with the stored password hash, for login.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: Role,
    pub grade_level: Option<i32>,
    pub school: Option<String>,
}

/// A freshly issued link code. The raw code is shown to the student once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// Journal
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub student_id: Uuid,
    pub title: String,
    pub content: String,
    pub mood: Option<Mood>,
    pub tags: Vec<String>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct JournalRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub title: String,
    pub content: String,
    pub mood: Option<String>,
    pub tags: Vec<String>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JournalRow> for JournalEntry {
    type Error = TutorlyError;

    fn try_from(row: JournalRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            student_id: row.student_id,
            title: row.title,
            content: row.content,
            mood: row.mood.as_deref().map(str::parse::<Mood>).transpose()?,
            tags: row.tags,
            is_private: row.is_private,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJournalEntry {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_private")]
    pub is_private: bool,
}

fn default_private() -> bool { true }

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodCount {
    pub mood: Mood,
    pub count: i64,
}

// =============================================================================
// Problem sessions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemSession {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject: String,
    pub difficulty: Difficulty,
    pub problem_text: String,
    pub status: SessionStatus,
    pub total_steps: i32,
    pub completed_steps: i32,
    pub hints_used: i32,
    pub mistakes: i32,
    pub accuracy: Option<f64>,
    pub time_spent_seconds: Option<i32>,
    pub composite_score: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct SessionRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject: String,
    pub difficulty: String,
    pub problem_text: String,
    pub status: String,
    pub total_steps: i32,
    pub completed_steps: i32,
    pub hints_used: i32,
    pub mistakes: i32,
    pub accuracy: Option<f64>,
    pub time_spent_seconds: Option<i32>,
    pub composite_score: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for ProblemSession {
    type Error = TutorlyError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            student_id: row.student_id,
            subject: row.subject,
            difficulty: row.difficulty.parse()?,
            problem_text: row.problem_text,
            status: row.status.parse()?,
            total_steps: row.total_steps,
            completed_steps: row.completed_steps,
            hints_used: row.hints_used,
            mistakes: row.mistakes,
            accuracy: row.accuracy,
            time_spent_seconds: row.time_spent_seconds,
            composite_score: row.composite_score,
            started_at: row.started_at,
            completed_at: row.completed_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    pub subject: String,
    /// Falls back to the student's recommended difficulty when absent.
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    pub problem_text: String,
    pub total_steps: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionStep {
    pub id: Uuid,
    pub session_id: Uuid,
    pub step_index: i32,
    pub content: String,
    pub is_correct: bool,
    pub hint_level: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStep {
    pub content: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteSession {
    /// Derived from recorded steps when absent.
    #[serde(default)]
    pub accuracy: Option<f64>,
    pub time_spent_seconds: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubjectStats {
    pub subject: String,
    pub sessions: i64,
    pub completed: i64,
    pub avg_accuracy: Option<f64>,
    pub avg_composite: Option<f64>,
    pub last_session_at: Option<DateTime<Utc>>,
}

/// One completed session's score, for trend charts and analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScorePoint {
    pub session_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub composite_score: f64,
}

// =============================================================================
// Adaptation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PerformanceProfile {
    pub student_id: Uuid,
    pub subject: String,
    pub sessions_count: i32,
    pub avg_accuracy: f64,
    pub avg_composite: f64,
    pub avg_time_seconds: f64,
    pub avg_hints: f64,
    pub avg_mistakes: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRecommendation {
    pub student_id: Uuid,
    pub subject: String,
    pub recommended: Difficulty,
    pub confidence: f64,
    pub reason: String,
    pub computed_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct RecommendationRow {
    pub student_id: Uuid,
    pub subject: String,
    pub recommended: String,
    pub confidence: f64,
    pub reason: String,
    pub computed_at: DateTime<Utc>,
}

impl TryFrom<RecommendationRow> for CachedRecommendation {
    type Error = TutorlyError;

    fn try_from(row: RecommendationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            student_id: row.student_id,
            subject: row.subject,
            recommended: row.recommended.parse()?,
            confidence: row.confidence,
            reason: row.reason,
            computed_at: row.computed_at,
        })
    }
}

/// Result of `recommend_optimal_difficulty`, with the previous cached
/// value so callers can tell whether it moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationOutcome {
    pub current: CachedRecommendation,
    pub previous: Option<Difficulty>,
}

impl RecommendationOutcome {
    pub fn changed(&self) -> bool {
        self.previous.is_some_and(|p| p != self.current.recommended)
    }
}

/// Everything `SessionRepository::complete` changed, committed together.
#[derive(Debug, Clone)]
pub struct SessionCompletion {
    pub session: ProblemSession,
    pub profile: PerformanceProfile,
    pub streak: tutorly_adapt::StreakUpdate,
    pub recommendation: RecommendationOutcome,
    pub achievements: Vec<Achievement>,
}

// =============================================================================
// Gamification
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub points: i32,
    pub criteria: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EarnedAchievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub points: i32,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AwardOutcome {
    Awarded { points: i32 },
    AlreadyAwarded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LearningStreak {
    pub student_id: Uuid,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_activity_date: Option<NaiveDate>,
}

impl LearningStreak {
    pub fn state(&self) -> tutorly_adapt::StreakState {
        tutorly_adapt::StreakState {
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            last_activity_date: self.last_activity_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub student_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub target_value: i32,
    pub current_value: i32,
    pub status: GoalStatus,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct GoalRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub target_value: i32,
    pub current_value: i32,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<GoalRow> for Goal {
    type Error = TutorlyError;

    fn try_from(row: GoalRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            student_id: row.student_id,
            title: row.title,
            description: row.description,
            target_value: row.target_value,
            current_value: row.current_value,
            status: row.status.parse()?,
            due_date: row.due_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGoal {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target_value: i32,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Result of a goal progress update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub goal: Goal,
    /// True when this update reached the target.
    pub just_completed: bool,
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = TutorlyError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind.parse()?,
            title: row.title,
            body: row.body,
            data: row.data,
            read_at: row.read_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub kind: NotificationKind,
    pub enabled: bool,
}

// =============================================================================
// Dashboards
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DashboardPreferences {
    pub user_id: Uuid,
    pub layout: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// One row of a teacher's or parent's student list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentSummary {
    pub student_id: Uuid,
    pub display_name: String,
    pub total_points: i32,
    pub current_streak: i32,
    pub last_activity_date: Option<NaiveDate>,
    pub engagement: EngagementLevel,
    pub sessions_last_7_days: i64,
    pub avg_composite: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentOverview {
    pub student: User,
    pub total_points: i32,
    pub streak: Option<LearningStreak>,
    pub engagement: EngagementLevel,
    pub subjects: Vec<SubjectStats>,
    pub recent_sessions: Vec<ProblemSession>,
    pub active_goals: Vec<Goal>,
    pub achievements: Vec<EarnedAchievement>,
    pub unread_notifications: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherOverview {
    pub students: Vec<StudentSummary>,
    pub needs_attention: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentOverview {
    pub children: Vec<StudentSummary>,
}

/// A student whose engagement has dropped to `needs_attention` and who has
/// not triggered an alert recently.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct InactiveStudent {
    pub student_id: Uuid,
    pub display_name: String,
    pub last_activity_date: Option<NaiveDate>,
}
