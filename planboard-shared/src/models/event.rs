/// Calendar event model and database operations
///
/// Events belong to the user who created them and may reference a project.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE events (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     project_id UUID REFERENCES projects(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     location VARCHAR(255),
///     starts_at TIMESTAMPTZ NOT NULL,
///     ends_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CHECK (ends_at >= starts_at)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::Pagination;

const EVENT_COLUMNS: &str = "id, user_id, project_id, title, description, location, starts_at, ends_at, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEvent {
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Partial update; `Some(None)` clears a nullable column
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub project_id: Option<Option<Uuid>>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// Optional list filters; the window applies to `starts_at`
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter {
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl Event {
    pub async fn create(pool: &PgPool, data: CreateEvent) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO events (user_id, project_id, title, description, location, starts_at, ends_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        );

        sqlx::query_as::<_, Event>(&query)
            .bind(data.user_id)
            .bind(data.project_id)
            .bind(data.title)
            .bind(data.description)
            .bind(data.location)
            .bind(data.starts_at)
            .bind(data.ends_at)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS);

        sqlx::query_as::<_, Event>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists events in chronological order
    pub async fn list(
        pool: &PgPool,
        filter: EventFilter,
        page: Pagination,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(EVENT_COLUMNS).push(" FROM events WHERE TRUE");

        if let Some(user_id) = filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(project_id) = filter.project_id {
            qb.push(" AND project_id = ").push_bind(project_id);
        }
        if let Some(from) = filter.from {
            qb.push(" AND starts_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND starts_at < ").push_bind(to);
        }

        qb.push(" ORDER BY starts_at ASC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<Event>().fetch_all(pool).await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateEvent,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE events SET updated_at = NOW()");

        if let Some(project_id) = data.project_id {
            qb.push(", project_id = ").push_bind(project_id);
        }
        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(location) = data.location {
            qb.push(", location = ").push_bind(location);
        }
        if let Some(starts_at) = data.starts_at {
            qb.push(", starts_at = ").push_bind(starts_at);
        }
        if let Some(ends_at) = data.ends_at {
            qb.push(", ends_at = ").push_bind(ends_at);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(EVENT_COLUMNS);

        qb.build_query_as::<Event>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
