//! Notification service: render, persist, broadcast.
//!
//! Each kind has a title and a body template. `notify` checks the
//! recipient's preference for the kind, stores the rendered notification
//! and publishes it, followed by the new unread count, on the hub that
//! every open WebSocket listens to.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use minijinja::Environment;
use serde_json::{json, Value};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tutorly_common::NotificationKind;
use tutorly_db::{DbError, InactiveStudent, NewNotification, Notification, NotificationRepository};

use crate::state::SharedState;
use crate::ws::ServerMessage;

/// Days without activity after which a student needs attention.
const INACTIVE_DAYS: i64 = 7;

/// One hub message, addressed to a single user.
#[derive(Debug, Clone)]
pub struct HubEvent {
    pub user_id: Uuid,
    pub message: ServerMessage,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

const TEMPLATES: &[(NotificationKind, &str, &str)] = &[
    (
        NotificationKind::AchievementUnlocked,
        "Achievement unlocked: {{ name }}",
        "{{ description }} (+{{ points }} points)",
    ),
    (
        NotificationKind::StreakMilestone,
        "{{ days }}-day learning streak!",
        "You have studied {{ days }} days in a row. Keep it going!",
    ),
    (
        NotificationKind::GoalCompleted,
        "Goal completed: {{ title }}",
        "You reached your target of {{ target }}.",
    ),
    (
        NotificationKind::DifficultyChanged,
        "New difficulty for {{ subject }}",
        "Your {{ subject }} problems move from {{ previous }} to {{ current }}.",
    ),
    (
        NotificationKind::SessionCompleted,
        "Session complete: {{ subject }}",
        "Accuracy {{ accuracy }}%, score {{ score }}%.",
    ),
    (
        NotificationKind::TeacherMessage,
        "Message from {{ sender }}",
        "{{ message }}",
    ),
    (
        NotificationKind::EngagementAlert,
        "{{ student }} needs attention",
        "{% if last_active %}{{ student }} has not studied since {{ last_active }}.\
         {% else %}{{ student }} has not started studying yet.{% endif %}",
    ),
];

#[derive(Clone)]
pub struct NotificationService {
    repo: NotificationRepository,
    hub: broadcast::Sender<HubEvent>,
    templates: Arc<Environment<'static>>,
}

impl NotificationService {
    pub fn new(pool: PgPool, capacity: usize) -> Self {
        let (hub, _) = broadcast::channel(capacity);
        Self {
            repo: NotificationRepository::new(pool),
            hub,
            templates: Arc::new(template_env()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.hub.subscribe()
    }

    /// Push a message to every socket the user has open. Nobody listening
    /// is not an error.
    pub fn publish(&self, user_id: Uuid, message: ServerMessage) {
        let _ = self.hub.send(HubEvent { user_id, message });
    }

    /// Re-read the unread count and publish it.
    pub async fn publish_unread_count(&self, user_id: Uuid) -> Result<i64, NotifyError> {
        let count = self.repo.unread_count(user_id).await?;
        self.publish(user_id, ServerMessage::UnreadCount { count });
        Ok(count)
    }

    pub fn render(&self, kind: NotificationKind, vars: &Value) -> Result<(String, String), minijinja::Error> {
        let title = self.templates.get_template(title_name(kind))?.render(vars)?;
        let body = self.templates.get_template(body_name(kind))?.render(vars)?;
        Ok((title, body))
    }

    /// Deliver a notification. Returns `None` when the user switched the
    /// kind off. `vars` feeds the templates and is stored as `data`.
    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        vars: Value,
    ) -> Result<Option<Notification>, NotifyError> {
        if !self.repo.is_enabled(user_id, kind).await? {
            debug!(%user_id, %kind, "notification kind disabled, skipping");
            return Ok(None);
        }

        let (title, body) = self.render(kind, &vars)?;
        let notification = self
            .repo
            .create(&NewNotification { user_id, kind, title, body, data: vars })
            .await?;

        self.publish(user_id, ServerMessage::Notification(notification.clone()));
        self.publish_unread_count(user_id).await?;
        debug!(%user_id, %kind, notification_id = %notification.id, "notification delivered");
        Ok(Some(notification))
    }

    /// `notify` for side effects of another request: failures are logged
    /// and swallowed so they never fail the request itself.
    pub async fn notify_quietly(&self, user_id: Uuid, kind: NotificationKind, vars: Value) {
        if let Err(e) = self.notify(user_id, kind, vars).await {
            warn!(%user_id, %kind, error = %e, "notification delivery failed");
        }
    }
}

fn template_env() -> Environment<'static> {
    let mut env = Environment::new();
    for (kind, title, body) in TEMPLATES {
        // Literal templates; a syntax error here is caught by the tests.
        if let Err(e) = env.add_template(title_name(*kind), title) {
            warn!(%kind, error = %e, "invalid title template");
        }
        if let Err(e) = env.add_template(body_name(*kind), body) {
            warn!(%kind, error = %e, "invalid body template");
        }
    }
    env
}

fn title_name(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::AchievementUnlocked => "achievement_unlocked.title",
        NotificationKind::StreakMilestone     => "streak_milestone.title",
        NotificationKind::GoalCompleted       => "goal_completed.title",
        NotificationKind::DifficultyChanged   => "difficulty_changed.title",
        NotificationKind::SessionCompleted    => "session_completed.title",
        NotificationKind::TeacherMessage      => "teacher_message.title",
        NotificationKind::EngagementAlert     => "engagement_alert.title",
    }
}

fn body_name(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::AchievementUnlocked => "achievement_unlocked.body",
        NotificationKind::StreakMilestone     => "streak_milestone.body",
        NotificationKind::GoalCompleted       => "goal_completed.body",
        NotificationKind::DifficultyChanged   => "difficulty_changed.body",
        NotificationKind::SessionCompleted    => "session_completed.body",
        NotificationKind::TeacherMessage      => "teacher_message.body",
        NotificationKind::EngagementAlert     => "engagement_alert.body",
    }
}

// === Engagement sweep ===

/// Periodically alert teachers and parents about students who have gone
/// quiet. Disabled when `notifications.engagement_sweep_secs` is 0.
pub fn spawn_engagement_sweep(state: SharedState) -> Option<JoinHandle<()>> {
    let every = state.config.notifications.engagement_sweep_secs;
    if every == 0 {
        info!("engagement sweep disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(every));
        loop {
            interval.tick().await;
            match engagement_sweep(&state).await {
                Ok(0) => {}
                Ok(sent) => info!(sent, "engagement alerts sent"),
                Err(e) => warn!(error = %e, "engagement sweep failed"),
            }
        }
    }))
}

/// One pass of the sweep. Returns the number of alerts stored.
pub async fn engagement_sweep(state: &SharedState) -> Result<usize, NotifyError> {
    let today = Utc::now().date_naive();
    let cutoff = today - chrono::Duration::days(INACTIVE_DAYS);
    let inactive = state.streaks.inactive_students(cutoff, INACTIVE_DAYS as i32).await?;
    Ok(alert_watchers(state, inactive).await)
}

/// Alert every teacher and parent of each student. A student whose
/// watchers cannot be loaded or notified is logged and skipped.
pub async fn alert_watchers(state: &SharedState, students: Vec<InactiveStudent>) -> usize {
    let mut sent = 0;
    for student in students {
        let watchers = match state.users.watchers_of(student.student_id).await {
            Ok(w) => w,
            Err(e) => {
                warn!(student_id = %student.student_id, error = %e, "could not load watchers");
                continue;
            }
        };
        let vars = json!({
            "student_id": student.student_id,
            "student": student.display_name,
            "last_active": student.last_activity_date.map(|d| d.to_string()),
        });
        for watcher in watchers {
            match state.notifier.notify(watcher, NotificationKind::EngagementAlert, vars.clone()).await {
                Ok(Some(_)) => sent += 1,
                Ok(None) => {}
                Err(e) => warn!(
                    student_id = %student.student_id,
                    user_id = %watcher,
                    error = %e,
                    "engagement alert failed"
                ),
            }
        }
    }
    sent
}
