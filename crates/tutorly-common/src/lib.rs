//! tutorly-common — Shared enums and error types used across all Tutorly crates.

pub mod error;
pub mod entities;
pub mod realtime;

// Re-export commonly used types
pub use entities::{
    Difficulty, EngagementLevel, GoalStatus, Mood, NotificationKind, Role, SessionStatus,
};
pub use error::{ApiError, ApiResult, TutorlyError};
pub use realtime::{ClientMessage, ServerMessage};
