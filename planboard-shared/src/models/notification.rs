/// Notification model and database operations
///
/// Notifications are per-user messages. Reads and mutations are always
/// scoped to the recipient: a notification that belongs to someone else
/// behaves as if it does not exist.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE notification_kind AS ENUM ('task_assigned', 'team_invitation', 'team_role_changed', 'system');
///
/// CREATE TABLE notifications (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     kind notification_kind NOT NULL DEFAULT 'system',
///     title VARCHAR(255) NOT NULL,
///     message TEXT NOT NULL,
///     link VARCHAR(512),
///     is_read BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     read_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::Pagination;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, message, link, is_read, created_at, read_at";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskAssigned,
    TeamInvitation,
    TeamRoleChanged,
    #[default]
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl Notification {
    pub async fn create(pool: &PgPool, data: CreateNotification) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO notifications (user_id, kind, title, message, link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        );

        sqlx::query_as::<_, Notification>(&query)
            .bind(data.user_id)
            .bind(data.kind)
            .bind(data.title)
            .bind(data.message)
            .bind(data.link)
            .fetch_one(pool)
            .await
    }

    /// Finds a notification owned by `user_id`
    pub async fn find_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM notifications WHERE id = $1 AND user_id = $2",
            NOTIFICATION_COLUMNS
        );

        sqlx::query_as::<_, Notification>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Lists a user's notifications, newest first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        unread_only: bool,
        page: Pagination,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(NOTIFICATION_COLUMNS)
            .push(" FROM notifications WHERE user_id = ")
            .push_bind(user_id);

        if unread_only {
            qb.push(" AND is_read = FALSE");
        }

        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<Notification>().fetch_all(pool).await
    }

    /// Sets the read flag on a user's notification
    ///
    /// `read_at` is stamped when marking read and cleared when marking unread.
    pub async fn set_read(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        is_read: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE notifications
            SET is_read = $3,
                read_at = CASE WHEN $3 THEN COALESCE(read_at, NOW()) ELSE NULL END
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        );

        sqlx::query_as::<_, Notification>(&query)
            .bind(id)
            .bind(user_id)
            .bind(is_read)
            .fetch_optional(pool)
            .await
    }

    /// Marks every unread notification of a user as read
    ///
    /// # Returns
    ///
    /// Number of notifications that changed
    pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = NOW() WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn unread_count(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Deletes a user's notification
    pub async fn delete_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&NotificationKind::TaskAssigned).unwrap(),
            "\"task_assigned\""
        );
        assert_eq!(NotificationKind::default(), NotificationKind::System);
    }
}
