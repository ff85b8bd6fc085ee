/// Activity log model and database operations
///
/// The activity log is an append-only audit trail: one row per successful
/// mutation, written after the fact by the API layer. Rows are never
/// updated or deleted through the application.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE activity_action AS ENUM ('create', 'update', 'delete');
/// CREATE TYPE entity_type AS ENUM ('user', 'project', 'task', 'subtask', 'event', 'team', 'member', 'notification');
///
/// CREATE TABLE activity_logs (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     action activity_action NOT NULL,
///     entity_type entity_type NOT NULL,
///     entity_id UUID NOT NULL,
///     details JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::Pagination;

const ACTIVITY_COLUMNS: &str = "id, user_id, action, entity_type, entity_id, details, created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "activity_action", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entity_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    User,
    Project,
    Task,
    Subtask,
    Event,
    Team,
    Member,
    Notification,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityLog {
    pub id: Uuid,

    /// Actor; None once the actor's account is deleted
    pub user_id: Option<Uuid>,

    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: Uuid,

    /// Free-form context (changed fields, names)
    pub details: JsonValue,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateActivityLog {
    pub user_id: Option<Uuid>,
    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub details: JsonValue,
}

/// Optional list filters
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityLogFilter {
    pub user_id: Option<Uuid>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
}

impl ActivityLog {
    pub async fn create(pool: &PgPool, data: CreateActivityLog) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO activity_logs (user_id, action, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            ACTIVITY_COLUMNS
        );

        sqlx::query_as::<_, ActivityLog>(&query)
            .bind(data.user_id)
            .bind(data.action)
            .bind(data.entity_type)
            .bind(data.entity_id)
            .bind(data.details)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM activity_logs WHERE id = $1", ACTIVITY_COLUMNS);

        sqlx::query_as::<_, ActivityLog>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists log rows, newest first
    pub async fn list(
        pool: &PgPool,
        filter: ActivityLogFilter,
        page: Pagination,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(ACTIVITY_COLUMNS).push(" FROM activity_logs WHERE TRUE");

        if let Some(user_id) = filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(entity_type) = filter.entity_type {
            qb.push(" AND entity_type = ").push_bind(entity_type);
        }
        if let Some(entity_id) = filter.entity_id {
            qb.push(" AND entity_id = ").push_bind(entity_id);
        }

        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<ActivityLog>().fetch_all(pool).await
    }
}
