//! Shared application state for the web server.

use std::sync::Arc;

use tutorly_adapt::AdaptationParams;
use tutorly_config::Config;
use tutorly_db::{
    AchievementRepository, DashboardRepository, Database, GoalRepository, JournalRepository,
    LinkCodeRepository, NotificationRepository, ProfileRepository, SessionRepository, StreakRepository,
    TokenRepository, UserRepository,
};

use crate::notify::NotificationService;

/// Shared state injected into every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    /// Scoring parameters derived from `config.adaptation`.
    pub params: AdaptationParams,

    pub users: UserRepository,
    pub tokens: TokenRepository,
    pub links: LinkCodeRepository,
    pub journal: JournalRepository,
    pub sessions: SessionRepository,
    pub profiles: ProfileRepository,
    pub achievements: AchievementRepository,
    pub streaks: StreakRepository,
    pub goals: GoalRepository,
    pub notifications: NotificationRepository,
    pub dashboards: DashboardRepository,

    /// Persists notifications and fans them out to open sockets.
    pub notifier: NotificationService,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let pool = db.pool().clone();
        let notifier = NotificationService::new(pool.clone(), config.notifications.channel_capacity);

        Self {
            params: AdaptationParams::from(&config.adaptation),
            users: UserRepository::new(pool.clone()),
            tokens: TokenRepository::new(pool.clone()),
            links: LinkCodeRepository::new(pool.clone()),
            journal: JournalRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool.clone()),
            profiles: ProfileRepository::new(pool.clone()),
            achievements: AchievementRepository::new(pool.clone()),
            streaks: StreakRepository::new(pool.clone()),
            goals: GoalRepository::new(pool.clone()),
            notifications: NotificationRepository::new(pool.clone()),
            dashboards: DashboardRepository::new(pool),
            notifier,
            config,
            db,
        }
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.config.auth.token_ttl_hours)
    }

    pub fn link_code_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.config.auth.link_code_ttl_minutes)
    }
}

pub type SharedState = Arc<AppState>;
