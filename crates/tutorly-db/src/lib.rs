//! Tutorly database layer.
//!
//! PostgreSQL through a shared `sqlx` pool. Schema lives in `migrations/`
//! and is applied by [`Database::migrate`]. Each resource has a repository
//! that owns a clone of the pool; scoring and streak rules come from
//! `tutorly-adapt` and run inside the repository's transaction.
//!
//! # Example
//!
//! ```rust,no_run
//! use tutorly_config::DatabaseConfig;
//! use tutorly_db::{Database, JournalRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect(&DatabaseConfig::default()).await?;
//!     db.migrate().await?;
//!
//!     let journal = JournalRepository::new(db.pool().clone());
//!     let _ = journal;
//!     Ok(())
//! }
//! ```

pub mod achievements;
pub mod dashboards;
pub mod database;
pub mod error;
pub mod goals;
pub mod journal;
pub mod links;
pub mod notifications;
pub mod profiles;
pub mod schema;
pub mod sessions;
pub mod streaks;
pub mod tokens;
pub mod users;

pub use achievements::{criteria_met, AchievementContext, AchievementRepository};
pub use dashboards::DashboardRepository;
pub use database::{Database, DatabaseStats};
pub use error::{DbError, Result};
pub use goals::GoalRepository;
pub use journal::{extract_hashtags, JournalRepository};
pub use links::LinkCodeRepository;
pub use notifications::NotificationRepository;
pub use profiles::ProfileRepository;
pub use schema::*;
pub use sessions::SessionRepository;
pub use streaks::StreakRepository;
pub use tokens::TokenRepository;
pub use users::UserRepository;
