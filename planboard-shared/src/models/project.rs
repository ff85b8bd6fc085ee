/// Project model and database operations
///
/// A project is owned by one user and can be shared with a team. Tasks,
/// and optionally calendar events, hang off a project.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE project_status AS ENUM ('planned', 'active', 'on_hold', 'completed', 'cancelled');
///
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     owner_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     team_id UUID REFERENCES teams(id) ON DELETE SET NULL,
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     status project_status NOT NULL DEFAULT 'planned',
///     start_date DATE,
///     due_date DATE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CHECK (due_date IS NULL OR start_date IS NULL OR due_date >= start_date)
/// );
/// ```
///
/// # Visibility
///
/// A non-admin user sees a project when they own it or belong to its team.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::Pagination;

const PROJECT_COLUMNS: &str = "id, owner_id, team_id, name, description, status, start_date, due_date, created_at, updated_at";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Planned,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub team_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub owner_id: Uuid,
    pub team_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// Partial update; `Some(None)` clears a nullable column
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    pub team_id: Option<Option<Uuid>>,
    pub start_date: Option<Option<NaiveDate>>,
    pub due_date: Option<Option<NaiveDate>>,
}

/// Optional list filters
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
}

/// True when the date range is empty or ordered
pub fn dates_in_order(start: Option<NaiveDate>, due: Option<NaiveDate>) -> bool {
    match (start, due) {
        (Some(start), Some(due)) => due >= start,
        _ => true,
    }
}

impl Project {
    pub async fn create(pool: &PgPool, data: CreateProject) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO projects (owner_id, team_id, name, description, status, start_date, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PROJECT_COLUMNS
        );

        sqlx::query_as::<_, Project>(&query)
            .bind(data.owner_id)
            .bind(data.team_id)
            .bind(data.name)
            .bind(data.description)
            .bind(data.status)
            .bind(data.start_date)
            .bind(data.due_date)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM projects WHERE id = $1", PROJECT_COLUMNS);

        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists projects, newest first
    ///
    /// With `visible_to`, restricts to projects the user owns or whose team
    /// they belong to. Admin callers pass None.
    pub async fn list(
        pool: &PgPool,
        visible_to: Option<Uuid>,
        filter: ProjectFilter,
        page: Pagination,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(PROJECT_COLUMNS).push(" FROM projects WHERE TRUE");

        if let Some(user_id) = visible_to {
            qb.push(" AND (owner_id = ")
                .push_bind(user_id)
                .push(" OR team_id IN (SELECT team_id FROM team_members WHERE user_id = ")
                .push_bind(user_id)
                .push("))");
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }

        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<Project>().fetch_all(pool).await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE projects SET updated_at = NOW()");

        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(status) = data.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(team_id) = data.team_id {
            qb.push(", team_id = ").push_bind(team_id);
        }
        if let Some(start_date) = data.start_date {
            qb.push(", start_date = ").push_bind(start_date);
        }
        if let Some(due_date) = data.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(PROJECT_COLUMNS);

        qb.build_query_as::<Project>().fetch_optional(pool).await
    }

    /// Deletes a project; its tasks, subtasks and events cascade
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
