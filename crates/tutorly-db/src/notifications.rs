//! Stored notifications and per-kind delivery preferences.

use crate::error::{DbError, Result};
use crate::schema::{NewNotification, Notification, NotificationPreference, NotificationRow};
use sqlx::PgPool;
use std::collections::HashMap;
use tutorly_common::NotificationKind;
use uuid::Uuid;

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, body, data, read_at, created_at";

#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn create(&self, new: &NewNotification) -> Result<Notification> {
        let row: NotificationRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO notifications (user_id, kind, title, body, data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.kind.as_str())
        .bind(&new.title)
        .bind(&new.body)
        .bind(&new.data)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_into()?)
    }

    pub async fn list(&self, user_id: Uuid, unread_only: bool, limit: i64, offset: i64) -> Result<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit.clamp(1, 100))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| Notification::try_from(r).map_err(DbError::from))
            .collect()
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Mark one of the user's notifications read. False when it does not
    /// exist, belongs to someone else, or was already read.
    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = now() WHERE id = $1 AND user_id = $2 AND read_at IS NULL",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET read_at = now() WHERE user_id = $1 AND read_at IS NULL")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("Notification".into()));
        }
        Ok(())
    }

    // ── Preferences ──────────────────────────────────────────────────────────

    /// One entry per kind; kinds without a stored row are enabled.
    pub async fn preferences(&self, user_id: Uuid) -> Result<Vec<NotificationPreference>> {
        let stored: HashMap<String, bool> =
            sqlx::query_as::<_, (String, bool)>("SELECT kind, enabled FROM notification_preferences WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .collect();

        Ok(NotificationKind::ALL
            .iter()
            .map(|&kind| NotificationPreference {
                kind,
                enabled: stored.get(kind.as_str()).copied().unwrap_or(true),
            })
            .collect())
    }

    pub async fn set_preference(&self, user_id: Uuid, kind: NotificationKind, enabled: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_preferences (user_id, kind, enabled)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, kind) DO UPDATE SET enabled = EXCLUDED.enabled
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_enabled(&self, user_id: Uuid, kind: NotificationKind) -> Result<bool> {
        let enabled: Option<bool> = sqlx::query_scalar(
            "SELECT enabled FROM notification_preferences WHERE user_id = $1 AND kind = $2",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(enabled.unwrap_or(true))
    }
}
