//! HTTP handlers for all API routes.

pub mod achievements;
pub mod auth;
pub mod dashboard;
pub mod goals;
pub mod journal;
pub mod notifications;
pub mod sessions;
pub mod system;

use serde::Deserialize;
use uuid::Uuid;

/// `?student_id=` for parents and teachers reading a student's data.
#[derive(Debug, Default, Deserialize)]
pub struct StudentQuery {
    pub student_id: Option<Uuid>,
}
