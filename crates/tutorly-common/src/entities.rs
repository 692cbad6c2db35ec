//! Domain enumerations shared by the database layer, the scoring engine,
//! the web server and the client.
//!
//! Every enum is stored as TEXT in PostgreSQL (guarded by a CHECK
//! constraint) and travels as snake_case JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TutorlyError;

// ---------------------------------------------------------------------------
// User role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Parent,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Parent  => "parent",
            Role::Admin   => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = TutorlyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "parent"  => Ok(Role::Parent),
            "admin"   => Ok(Role::Admin),
            other     => Err(TutorlyError::UnknownVariant { kind: "role", value: other.to_string() }),
        }
    }
}

// ---------------------------------------------------------------------------
// Problem difficulty
// ---------------------------------------------------------------------------

/// Difficulty buckets, ordered from easiest to hardest.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    VeryHard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::VeryHard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy     => "easy",
            Difficulty::Medium   => "medium",
            Difficulty::Hard     => "hard",
            Difficulty::VeryHard => "very_hard",
        }
    }

    /// Time a student is expected to need for one problem at this level.
    pub fn expected_seconds(&self) -> f64 {
        match self {
            Difficulty::Easy     => 300.0,
            Difficulty::Medium   => 600.0,
            Difficulty::Hard     => 900.0,
            Difficulty::VeryHard => 1200.0,
        }
    }
}

impl FromStr for Difficulty {
    type Err = TutorlyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy"      => Ok(Difficulty::Easy),
            "medium"    => Ok(Difficulty::Medium),
            "hard"      => Ok(Difficulty::Hard),
            "very_hard" => Ok(Difficulty::VeryHard),
            other       => Err(TutorlyError::UnknownVariant { kind: "difficulty", value: other.to_string() }),
        }
    }
}

// ---------------------------------------------------------------------------
// Problem session status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed  => "completed",
            SessionStatus::Abandoned  => "abandoned",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, SessionStatus::InProgress)
    }
}

impl FromStr for SessionStatus {
    type Err = TutorlyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed"   => Ok(SessionStatus::Completed),
            "abandoned"   => Ok(SessionStatus::Abandoned),
            other         => Err(TutorlyError::UnknownVariant { kind: "session status", value: other.to_string() }),
        }
    }
}

// ---------------------------------------------------------------------------
// Goal status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Abandoned,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active    => "active",
            GoalStatus::Completed => "completed",
            GoalStatus::Abandoned => "abandoned",
        }
    }
}

impl FromStr for GoalStatus {
    type Err = TutorlyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active"    => Ok(GoalStatus::Active),
            "completed" => Ok(GoalStatus::Completed),
            "abandoned" => Ok(GoalStatus::Abandoned),
            other       => Err(TutorlyError::UnknownVariant { kind: "goal status", value: other.to_string() }),
        }
    }
}

// ---------------------------------------------------------------------------
// Journal mood
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Great,
    Good,
    Okay,
    Frustrated,
    Stressed,
}

impl Mood {
    pub const ALL: [Mood; 5] = [Mood::Great, Mood::Good, Mood::Okay, Mood::Frustrated, Mood::Stressed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Great      => "great",
            Mood::Good       => "good",
            Mood::Okay       => "okay",
            Mood::Frustrated => "frustrated",
            Mood::Stressed   => "stressed",
        }
    }
}

impl FromStr for Mood {
    type Err = TutorlyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "great"      => Ok(Mood::Great),
            "good"       => Ok(Mood::Good),
            "okay"       => Ok(Mood::Okay),
            "frustrated" => Ok(Mood::Frustrated),
            "stressed"   => Ok(Mood::Stressed),
            other        => Err(TutorlyError::UnknownVariant { kind: "mood", value: other.to_string() }),
        }
    }
}

// ---------------------------------------------------------------------------
// Notification kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AchievementUnlocked,
    StreakMilestone,
    GoalCompleted,
    DifficultyChanged,
    SessionCompleted,
    TeacherMessage,
    EngagementAlert,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 7] = [
        NotificationKind::AchievementUnlocked,
        NotificationKind::StreakMilestone,
        NotificationKind::GoalCompleted,
        NotificationKind::DifficultyChanged,
        NotificationKind::SessionCompleted,
        NotificationKind::TeacherMessage,
        NotificationKind::EngagementAlert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AchievementUnlocked => "achievement_unlocked",
            NotificationKind::StreakMilestone     => "streak_milestone",
            NotificationKind::GoalCompleted       => "goal_completed",
            NotificationKind::DifficultyChanged   => "difficulty_changed",
            NotificationKind::SessionCompleted    => "session_completed",
            NotificationKind::TeacherMessage      => "teacher_message",
            NotificationKind::EngagementAlert     => "engagement_alert",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = TutorlyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| TutorlyError::UnknownVariant { kind: "notification kind", value: s.to_string() })
    }
}

// ---------------------------------------------------------------------------
// Engagement level
// ---------------------------------------------------------------------------

/// Derived label computed from streak length and recency of activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    NeedsAttention,
    Fair,
    Good,
    Excellent,
}

impl EngagementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementLevel::NeedsAttention => "needs_attention",
            EngagementLevel::Fair           => "fair",
            EngagementLevel::Good           => "good",
            EngagementLevel::Excellent      => "excellent",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(Role, Difficulty, SessionStatus, GoalStatus, Mood, NotificationKind, EngagementLevel);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_ordering() {
        assert!(Difficulty::Easy < Difficulty::Medium);
        assert!(Difficulty::Hard < Difficulty::VeryHard);
        assert_eq!(Difficulty::ALL.iter().max(), Some(&Difficulty::VeryHard));
    }

    #[test]
    fn test_difficulty_db_strings() {
        for d in Difficulty::ALL {
            assert_eq!(d.as_str().parse::<Difficulty>().unwrap(), d);
        }
        assert!("impossible".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_notification_kind_json_matches_db_string() {
        for kind in NotificationKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_engagement_display() {
        assert_eq!(EngagementLevel::NeedsAttention.to_string(), "needs_attention");
    }
}
