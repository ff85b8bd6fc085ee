/// Subtask model and database operations
///
/// Subtasks are ordered checklist items of a task. New subtasks are
/// appended after the current last position.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE subtasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     is_completed BOOLEAN NOT NULL DEFAULT FALSE,
///     position INTEGER NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const SUBTASK_COLUMNS: &str = "id, task_id, title, is_completed, position, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subtask {
    pub id: Uuid,
    pub task_id: Uuid,
    pub title: String,
    pub is_completed: bool,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubtask {
    pub task_id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSubtask {
    pub title: Option<String>,
    pub is_completed: Option<bool>,
    pub position: Option<i32>,
}

impl Subtask {
    /// Appends a subtask to the end of the task's checklist
    pub async fn create(pool: &PgPool, data: CreateSubtask) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO subtasks (task_id, title, position)
            VALUES ($1, $2, (SELECT COALESCE(MAX(position) + 1, 0) FROM subtasks WHERE task_id = $1))
            RETURNING {}
            "#,
            SUBTASK_COLUMNS
        );

        sqlx::query_as::<_, Subtask>(&query)
            .bind(data.task_id)
            .bind(data.title)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM subtasks WHERE id = $1", SUBTASK_COLUMNS);

        sqlx::query_as::<_, Subtask>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists a task's subtasks in checklist order
    pub async fn list_by_task(pool: &PgPool, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM subtasks WHERE task_id = $1 ORDER BY position ASC, created_at ASC",
            SUBTASK_COLUMNS
        );

        sqlx::query_as::<_, Subtask>(&query)
            .bind(task_id)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateSubtask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE subtasks SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(is_completed) = data.is_completed {
            qb.push(", is_completed = ").push_bind(is_completed);
        }
        if let Some(position) = data.position {
            qb.push(", position = ").push_bind(position);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(SUBTASK_COLUMNS);

        qb.build_query_as::<Subtask>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM subtasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns (completed, total) for a task's checklist
    pub async fn progress(pool: &PgPool, task_id: Uuid) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE is_completed), COUNT(*)
            FROM subtasks
            WHERE task_id = $1
            "#,
        )
        .bind(task_id)
        .fetch_one(pool)
        .await
    }
}
