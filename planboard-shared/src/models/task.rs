/// Task model and database operations
///
/// Tasks belong to a project and may be assigned to a user.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'in_progress', 'in_review', 'done');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high', 'urgent');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     assignee_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     status task_status NOT NULL DEFAULT 'todo',
///     priority task_priority NOT NULL DEFAULT 'medium',
///     due_date DATE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use planboard_shared::models::task::{Task, CreateTask, TaskPriority, TaskStatus};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, project_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let task = Task::create(&pool, CreateTask {
///     project_id,
///     created_by: Some(user_id),
///     assignee_id: Some(user_id),
///     title: "Write release notes".to_string(),
///     description: None,
///     status: TaskStatus::Todo,
///     priority: TaskPriority::High,
///     due_date: None,
/// }).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::Pagination;

const TASK_COLUMNS: &str = "id, project_id, created_by, assignee_id, title, description, status, priority, due_date, created_at, updated_at";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    InReview,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub created_by: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub created_by: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
}

/// Partial update; `Some(None)` clears a nullable column
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    pub project_id: Option<Uuid>,
    pub assignee_id: Option<Option<Uuid>>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl UpdateTask {
    /// True when the update touches nothing but `status`
    pub fn is_status_only(&self) -> bool {
        self.status.is_some()
            && self.project_id.is_none()
            && self.assignee_id.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }
}

/// Optional list filters
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskFilter {
    pub project_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

impl Task {
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO tasks (project_id, created_by, assignee_id, title, description, status, priority, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(data.project_id)
            .bind(data.created_by)
            .bind(data.assignee_id)
            .bind(data.title)
            .bind(data.description)
            .bind(data.status)
            .bind(data.priority)
            .bind(data.due_date)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS);

        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists tasks, most urgent first then newest
    ///
    /// With `visible_to`, restricts to tasks in projects the user can see plus
    /// tasks assigned to them.
    pub async fn list(
        pool: &PgPool,
        visible_to: Option<Uuid>,
        filter: TaskFilter,
        page: Pagination,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(TASK_COLUMNS).push(" FROM tasks WHERE TRUE");

        if let Some(user_id) = visible_to {
            qb.push(" AND (assignee_id = ")
                .push_bind(user_id)
                .push(" OR project_id IN (SELECT id FROM projects WHERE owner_id = ")
                .push_bind(user_id)
                .push(" OR team_id IN (SELECT team_id FROM team_members WHERE user_id = ")
                .push_bind(user_id)
                .push(")))");
        }
        if let Some(project_id) = filter.project_id {
            qb.push(" AND project_id = ").push_bind(project_id);
        }
        if let Some(assignee_id) = filter.assignee_id {
            qb.push(" AND assignee_id = ").push_bind(assignee_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(priority) = filter.priority {
            qb.push(" AND priority = ").push_bind(priority);
        }

        qb.push(" ORDER BY priority DESC, created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<Task>().fetch_all(pool).await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE tasks SET updated_at = NOW()");

        if let Some(project_id) = data.project_id {
            qb.push(", project_id = ").push_bind(project_id);
        }
        if let Some(assignee_id) = data.assignee_id {
            qb.push(", assignee_id = ").push_bind(assignee_id);
        }
        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(status) = data.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(priority) = data.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(due_date) = data.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(TASK_COLUMNS);

        qb.build_query_as::<Task>().fetch_optional(pool).await
    }

    /// Deletes a task; its subtasks cascade
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
