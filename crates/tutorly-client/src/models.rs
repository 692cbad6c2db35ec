//! Request and response bodies that only exist on the wire.
//!
//! Resource models (users, sessions, goals, ...) are shared with the
//! server through `tutorly-db` and `tutorly-adapt`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use tutorly_adapt::{Anomaly, SessionProgress, StreakState, Trend};
use tutorly_common::Role;
use tutorly_db::{
    Achievement, CachedRecommendation, EarnedAchievement, Notification, PerformanceProfile,
    ProblemSession, ScorePoint, SessionStep, User,
};

// ── Auth ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
    pub expires_in_hours: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkRequest {
    /// Code the student issued with `issue_link_code`.
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

// ── Problem sessions ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionDetail {
    pub session: ProblemSession,
    pub steps: Vec<SessionStep>,
    pub progress: SessionProgress,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StepRecorded {
    pub session: ProblemSession,
    pub step: SessionStep,
    pub progress: SessionProgress,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HintGranted {
    pub session: ProblemSession,
    pub hint_level: i32,
    pub hints_remaining: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionResult {
    pub session: ProblemSession,
    pub progress: SessionProgress,
    pub profile: PerformanceProfile,
    pub streak: StreakState,
    pub recommendation: CachedRecommendation,
    pub difficulty_changed: bool,
    pub achievements: Vec<Achievement>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionAnalytics {
    pub subject: Option<String>,
    pub points: Vec<ScorePoint>,
    pub trend: Trend,
    pub anomalies: Vec<Anomaly>,
}

// ── Dashboards, achievements ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayoutView {
    pub layout: Value,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AchievementsView {
    pub catalogue: Vec<Achievement>,
    pub earned: Vec<EarnedAchievement>,
    pub total_points: i32,
}

// ── Notifications ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MarkReadResult {
    pub notification_id: Uuid,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MarkAllResult {
    pub updated: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Health {
    pub status: String,
    pub database: bool,
    pub version: String,
}

/// Frames pushed by the server over `/ws/notifications`.
pub type ServerMessage = tutorly_common::ServerMessage<Notification>;

pub use tutorly_common::ClientMessage;
