/// Accounts
///
/// Users own projects and events, receive notifications, and join teams
/// through `team_members`. Emails are unique ignoring case.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('user', 'admin');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL,          -- unique on LOWER(email)
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(255),
///     avatar_url VARCHAR(512),
///     role user_role NOT NULL DEFAULT 'user',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use planboard_shared::models::user::{User, CreateUser, UserRole};
/// use planboard_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(&DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "user@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Jane Doe".to_string()),
///     role: UserRole::User,
/// }).await?;
///
/// let found = User::find_by_email(&pool, "USER@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::team_member::{check_pm_retained, MembershipError, TeamRole};
use super::Pagination;

/// Advisory lock key held while a self-registration picks its role
const REGISTRATION_LOCK: i64 = 0x706c_616e_6272_6431;

const USER_COLUMNS: &str =
    "id, email, password_hash, name, avatar_url, role, created_at, updated_at, last_login_at";

/// Global role carried in the access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular account
    User,

    /// Can manage users, read activity logs, and see every entity
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

/// An account row; the password hash never leaves the server
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    /// Stored lowercase
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub name: Option<String>,
    /// Public object storage URL
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    /// Already hashed with [`crate::auth::password::hash_password`]
    pub password_hash: String,
    pub name: Option<String>,
    pub role: UserRole,
}

/// Column changes; `Some(None)` clears a nullable column
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub name: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
    pub role: Option<UserRole>,
}

impl UpdateUser {
    /// True when no column would change
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password_hash.is_none()
            && self.name.is_none()
            && self.avatar_url.is_none()
            && self.role.is_none()
    }
}

/// Normalizes an email address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Inserts a user; a taken email surfaces as a unique violation
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, password_hash, name, role) VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(&data.email))
            .bind(data.password_hash)
            .bind(data.name)
            .bind(data.role)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Inserts a self-registered account
    ///
    /// The role is decided inside the INSERT: `admin` when the table is
    /// empty, `user` otherwise. A transaction-scoped advisory lock serializes
    /// registrations so two of them cannot both see an empty table.
    pub async fn register(
        pool: &PgPool,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(REGISTRATION_LOCK)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            r#"
            INSERT INTO users (email, password_hash, name, role)
            SELECT $1, $2, $3,
                CASE WHEN EXISTS (SELECT 1 FROM users)
                    THEN 'user'::user_role
                    ELSE 'admin'::user_role
                END
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(email))
            .bind(password_hash)
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    /// Case-insensitive lookup
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE LOWER(email) = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// Writes the `Some` fields of `data`; `None` when no such user
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");

        if let Some(email) = data.email {
            qb.push(", email = ").push_bind(normalize_email(&email));
        }
        if let Some(password_hash) = data.password_hash {
            qb.push(", password_hash = ").push_bind(password_hash);
        }
        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(avatar_url) = data.avatar_url {
            qb.push(", avatar_url = ").push_bind(avatar_url);
        }
        if let Some(role) = data.role {
            qb.push(", role = ").push_bind(role);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(USER_COLUMNS);

        qb.build_query_as::<User>().fetch_optional(pool).await
    }

    /// Owned projects, events and notifications go with the user; task
    /// assignments and activity log authorship are nulled
    ///
    /// Refused with `LastProjectManager` while the user is the only `pm` of
    /// a team. The member rows of every team the user manages stay locked
    /// until the delete commits, so a concurrent demotion cannot slip in.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, MembershipError> {
        let mut tx = pool.begin().await?;

        let managed: Vec<(Uuid, Uuid, TeamRole)> = sqlx::query_as(
            r#"
            SELECT team_id, user_id, role
            FROM team_members
            WHERE team_id IN (
                SELECT team_id FROM team_members WHERE user_id = $1 AND role = 'pm'
            )
            ORDER BY team_id, user_id
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for team_rows in managed.chunk_by(|a, b| a.0 == b.0) {
            let team_id = team_rows[0].0;
            let members: Vec<(Uuid, TeamRole)> =
                team_rows.iter().map(|(_, user_id, role)| (*user_id, *role)).collect();
            check_pm_retained(team_id, &members, id, None)?;
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Newest first
    pub async fn list(pool: &PgPool, page: Pagination) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
    }

    pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}
