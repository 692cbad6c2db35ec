//! tutorly-web — HTTP and realtime server for Tutorly.
//! Provides:
//!   - Bearer-token authentication
//!   - Journal, problem session, goal and achievement APIs
//!   - Student, teacher and parent dashboards
//!   - Notification delivery over REST and WebSocket

pub mod auth;
pub mod handlers;
pub mod notify;
pub mod router;
pub mod state;
pub mod ws;
