//! tutorly-client — typed access to a Tutorly server.
//! Provides:
//!   - `ApiClient`, one method per REST endpoint
//!   - Display helpers for durations, percentages and relative times
//!   - `NotificationSocket`, a reconnecting WebSocket listener

pub mod api;
pub mod error;
pub mod format;
pub mod models;
pub mod notifications;

pub use api::ApiClient;
pub use error::{ClientError, Result};
pub use format::{difficulty_label, engagement_label, format_duration, format_percent, format_relative};
pub use models::*;
pub use notifications::{NotificationSocket, ReconnectPolicy, SocketEvent};
