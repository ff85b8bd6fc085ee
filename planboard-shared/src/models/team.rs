/// Team model and database operations
///
/// Teams group users so projects can be shared. Membership lives in
/// `team_members` (see [`super::team_member`]); the user who creates a team
/// becomes its first `pm` in the same transaction.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE teams (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::team_member::TeamRole;
use super::Pagination;

const TEAM_COLUMNS: &str = "id, name, description, created_by, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeam {
    pub name: String,
    pub description: Option<String>,

    /// Creator, inserted as the first `pm`
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTeam {
    pub name: Option<String>,

    /// Use Some(None) to clear
    pub description: Option<Option<String>>,
}

impl Team {
    /// Creates a team and makes its creator a `pm`
    ///
    /// Both rows are written in one transaction, so a team never exists
    /// without a project manager.
    pub async fn create(pool: &PgPool, data: CreateTeam) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO teams (name, description, created_by) VALUES ($1, $2, $3) RETURNING {}",
            TEAM_COLUMNS
        );
        let team = sqlx::query_as::<_, Team>(&query)
            .bind(data.name)
            .bind(data.description)
            .bind(data.created_by)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO team_members (team_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(team.id)
            .bind(data.created_by)
            .bind(TeamRole::Pm)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(team_id = %team.id, created_by = %data.created_by, "Team created");
        Ok(team)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM teams WHERE id = $1", TEAM_COLUMNS);

        sqlx::query_as::<_, Team>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists every team (admin view), newest first
    pub async fn list(pool: &PgPool, page: Pagination) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM teams ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            TEAM_COLUMNS
        );

        sqlx::query_as::<_, Team>(&query)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
    }

    /// Lists teams the user belongs to, newest first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        page: Pagination,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(
            r#"
            SELECT t.id, t.name, t.description, t.created_by, t.created_at, t.updated_at
            FROM teams t
            JOIN team_members m ON m.team_id = t.id
            WHERE m.user_id = $1
            ORDER BY t.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateTeam,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE teams SET updated_at = NOW()");

        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(TEAM_COLUMNS);

        qb.build_query_as::<Team>().fetch_optional(pool).await
    }

    /// Deletes a team; memberships cascade and projects are detached
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
