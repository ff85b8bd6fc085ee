/// Team membership model and database operations
///
/// This module implements the many-to-many relationship between users and
/// teams. Each membership carries one of two roles:
///
/// - **pm**: project manager; can edit the team, manage members, and manage
///   projects shared with the team
/// - **member**: can view the team and its projects
///
/// # Schema
///
/// ```sql
/// CREATE TYPE team_role AS ENUM ('pm', 'member');
///
/// CREATE TABLE team_members (
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role team_role NOT NULL DEFAULT 'member',
///     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (team_id, user_id)
/// );
/// ```
///
/// # Invariant
///
/// A team always keeps at least one `pm`. [`Member::change_role`] and
/// [`Member::remove`] lock the team's member rows, check the invariant, and
/// write in the same transaction.
///
/// # Example
///
/// ```no_run
/// use planboard_shared::models::team_member::{Member, CreateMember, TeamRole};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, team_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// Member::add(&pool, CreateMember { team_id, user_id, role: TeamRole::Member }).await?;
/// Member::change_role(&pool, team_id, user_id, TeamRole::Pm).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Role inside a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    /// Project manager
    Pm,

    /// Regular member
    Member,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Pm => "pm",
            TeamRole::Member => "member",
        }
    }

    /// Checks if this role satisfies the required role
    ///
    /// Hierarchy: Pm > Member
    pub fn has_permission(&self, required: &TeamRole) -> bool {
        self.permission_level() >= required.permission_level()
    }

    fn permission_level(&self) -> u8 {
        match self {
            TeamRole::Pm => 2,
            TeamRole::Member => 1,
        }
    }
}

/// Error type for membership mutations
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    /// Target user is not in the team
    #[error("User {user_id} is not a member of team {team_id}")]
    NotMember { team_id: Uuid, user_id: Uuid },

    /// Target user is already in the team
    #[error("User {user_id} is already a member of team {team_id}")]
    AlreadyMember { team_id: Uuid, user_id: Uuid },

    /// Referenced user does not exist
    #[error("User {0} does not exist")]
    UserNotFound(Uuid),

    /// Referenced team does not exist
    #[error("Team {0} does not exist")]
    TeamNotFound(Uuid),

    /// The mutation would leave the team without a project manager
    #[error("Team {0} must keep at least one project manager")]
    LastProjectManager(Uuid),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Team membership row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

/// Membership joined with the user's public profile, for member listings
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberProfile {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Input for adding a user to a team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMember {
    pub team_id: Uuid,
    pub user_id: Uuid,

    #[serde(default = "default_role")]
    pub role: TeamRole,
}

fn default_role() -> TeamRole {
    TeamRole::Member
}

/// Checks that changing `target` to `new_role` (or removing it when
/// `new_role` is None) keeps at least one `pm` among `members`.
///
/// Returns the target's current role.
pub fn check_pm_retained(
    team_id: Uuid,
    members: &[(Uuid, TeamRole)],
    target: Uuid,
    new_role: Option<TeamRole>,
) -> Result<TeamRole, MembershipError> {
    let current = members
        .iter()
        .find(|(user_id, _)| *user_id == target)
        .map(|(_, role)| *role)
        .ok_or(MembershipError::NotMember {
            team_id,
            user_id: target,
        })?;

    let loses_pm = current == TeamRole::Pm && new_role != Some(TeamRole::Pm);
    if loses_pm {
        let pm_count = members
            .iter()
            .filter(|(_, role)| *role == TeamRole::Pm)
            .count();
        if pm_count <= 1 {
            return Err(MembershipError::LastProjectManager(team_id));
        }
    }

    Ok(current)
}

impl Member {
    /// Adds a user to a team
    ///
    /// # Errors
    ///
    /// - `AlreadyMember` on primary key violation
    /// - `UserNotFound` / `TeamNotFound` on foreign key violation
    pub async fn add(pool: &PgPool, data: CreateMember) -> Result<Self, MembershipError> {
        let result = sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO team_members (team_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING team_id, user_id, role, joined_at
            "#,
        )
        .bind(data.team_id)
        .bind(data.user_id)
        .bind(data.role)
        .fetch_one(pool)
        .await;

        match result {
            Ok(member) => Ok(member),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(MembershipError::AlreadyMember {
                    team_id: data.team_id,
                    user_id: data.user_id,
                })
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                if db_err.constraint().is_some_and(|c| c.contains("user_id")) {
                    Err(MembershipError::UserNotFound(data.user_id))
                } else {
                    Err(MembershipError::TeamNotFound(data.team_id))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Gets the user's role in a team, None if not a member
    pub async fn get_role(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamRole>, sqlx::Error> {
        sqlx::query_scalar::<_, TeamRole>(
            "SELECT role FROM team_members WHERE team_id = $1 AND user_id = $2",
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists a team's members with their profiles, PMs first
    pub async fn list_by_team(
        pool: &PgPool,
        team_id: Uuid,
    ) -> Result<Vec<MemberProfile>, sqlx::Error> {
        sqlx::query_as::<_, MemberProfile>(
            r#"
            SELECT m.team_id, m.user_id, m.role, m.joined_at, u.email, u.name, u.avatar_url
            FROM team_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.team_id = $1
            ORDER BY m.role ASC, m.joined_at ASC
            "#,
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    /// Changes a member's role
    ///
    /// # Errors
    ///
    /// - `NotMember` if the user is not in the team
    /// - `LastProjectManager` if this would demote the team's only `pm`
    pub async fn change_role(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<Self, MembershipError> {
        let mut tx = pool.begin().await?;

        let members: Vec<(Uuid, TeamRole)> = sqlx::query_as(
            "SELECT user_id, role FROM team_members WHERE team_id = $1 FOR UPDATE",
        )
        .bind(team_id)
        .fetch_all(&mut *tx)
        .await?;

        check_pm_retained(team_id, &members, user_id, Some(role))?;

        let member = sqlx::query_as::<_, Member>(
            r#"
            UPDATE team_members
            SET role = $3
            WHERE team_id = $1 AND user_id = $2
            RETURNING team_id, user_id, role, joined_at
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(member)
    }

    /// Removes a user from a team
    ///
    /// # Errors
    ///
    /// - `NotMember` if the user is not in the team
    /// - `LastProjectManager` if the user is the team's only `pm`
    pub async fn remove(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<TeamRole, MembershipError> {
        let mut tx = pool.begin().await?;

        let members: Vec<(Uuid, TeamRole)> = sqlx::query_as(
            "SELECT user_id, role FROM team_members WHERE team_id = $1 FOR UPDATE",
        )
        .bind(team_id)
        .fetch_all(&mut *tx)
        .await?;

        let previous = check_pm_retained(team_id, &members, user_id, None)?;

        sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(previous)
    }

    /// Counts members of a team
    pub async fn count_by_team(pool: &PgPool, team_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM team_members WHERE team_id = $1")
                .bind(team_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}
