/// Authorization helpers and permission checks
///
/// # Permission Model
///
/// 1. **Global role**: `admin` passes every check below.
/// 2. **Ownership**: users manage their own account, events, and projects.
/// 3. **Team role**: team members view the team's projects; a team `pm`
///    also manages them, and manages the team itself.
/// 4. **Assignment**: a task's assignee can view it, update its status, and
///    work its subtasks.
///
/// The access decisions are pure functions over loaded rows
/// ([`project_access`], [`task_access`]); the async `require_*` helpers load
/// what they need and turn a denial into an [`AuthzError`].
///
/// # Example
///
/// ```no_run
/// use planboard_shared::auth::authorization::{require_admin, require_project_manage};
/// use planboard_shared::auth::middleware::AuthContext;
/// use planboard_shared::models::project::Project;
/// use sqlx::PgPool;
///
/// async fn check(pool: &PgPool, auth: &AuthContext, project: &Project) -> Result<(), Box<dyn std::error::Error>> {
///     require_project_manage(pool, auth, project).await?;
///     Ok(())
/// }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::project::Project;
use crate::models::task::{Task, UpdateTask};
use crate::models::team_member::{Member, TeamRole};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Admin role required")]
    AdminRequired,

    /// User is not a member of the team
    #[error("Not a member of team {0}")]
    NotTeamMember(Uuid),

    /// User doesn't have the required team role
    #[error("Insufficient permissions: requires {required:?}, has {actual:?}")]
    InsufficientTeamRole {
        required: TeamRole,
        actual: TeamRole,
    },

    /// Catch-all denial for resource-level checks
    #[error("Not authorized to access this resource")]
    NotAuthorized,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Caller's rights over a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProjectAccess {
    None,
    View,
    Manage,
}

/// Caller's rights over a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskAccess {
    None,
    View,
    /// Assignee without project manage rights
    Assignee,
    Manage,
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if auth.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::AdminRequired)
    }
}

/// Passes when the caller is `user_id` or an admin
pub fn require_self_or_admin(auth: &AuthContext, user_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id == user_id || auth.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}

/// Computes project rights from the caller's role in the project's team
pub fn project_access(
    auth: &AuthContext,
    project: &Project,
    team_role: Option<TeamRole>,
) -> ProjectAccess {
    if auth.is_admin() || project.owner_id == auth.user_id {
        return ProjectAccess::Manage;
    }

    match team_role {
        Some(TeamRole::Pm) => ProjectAccess::Manage,
        Some(TeamRole::Member) => ProjectAccess::View,
        None => ProjectAccess::None,
    }
}

/// Computes task rights from the parent project's rights
pub fn task_access(auth: &AuthContext, task: &Task, project: ProjectAccess) -> TaskAccess {
    match project {
        ProjectAccess::Manage => TaskAccess::Manage,
        _ if task.assignee_id == Some(auth.user_id) => TaskAccess::Assignee,
        ProjectAccess::View => TaskAccess::View,
        ProjectAccess::None => TaskAccess::None,
    }
}

/// Checks a task update against the caller's rights
///
/// Project managers may change anything; the assignee may only move the
/// task's status.
pub fn check_task_update(access: TaskAccess, update: &UpdateTask) -> Result<(), AuthzError> {
    match access {
        TaskAccess::Manage => Ok(()),
        TaskAccess::Assignee if update.is_status_only() => Ok(()),
        _ => Err(AuthzError::NotAuthorized),
    }
}

/// Gets the caller's role in a team, None if not a member
async fn team_role(
    pool: &PgPool,
    team_id: Option<Uuid>,
    user_id: Uuid,
) -> Result<Option<TeamRole>, AuthzError> {
    match team_id {
        Some(team_id) => Ok(Member::get_role(pool, team_id, user_id).await?),
        None => Ok(None),
    }
}

/// Requires team membership with at least `required` role; admins pass
///
/// # Returns
///
/// The caller's team role, None for admins who are not members
pub async fn require_team_role(
    pool: &PgPool,
    auth: &AuthContext,
    team_id: Uuid,
    required: TeamRole,
) -> Result<Option<TeamRole>, AuthzError> {
    let role = Member::get_role(pool, team_id, auth.user_id).await?;

    if auth.is_admin() {
        return Ok(role);
    }

    let actual = role.ok_or(AuthzError::NotTeamMember(team_id))?;
    if !actual.has_permission(&required) {
        return Err(AuthzError::InsufficientTeamRole { required, actual });
    }

    Ok(Some(actual))
}

/// Loads the caller's rights over a project
pub async fn load_project_access(
    pool: &PgPool,
    auth: &AuthContext,
    project: &Project,
) -> Result<ProjectAccess, AuthzError> {
    if auth.is_admin() || project.owner_id == auth.user_id {
        return Ok(ProjectAccess::Manage);
    }

    let role = team_role(pool, project.team_id, auth.user_id).await?;
    Ok(project_access(auth, project, role))
}

pub async fn require_project_view(
    pool: &PgPool,
    auth: &AuthContext,
    project: &Project,
) -> Result<ProjectAccess, AuthzError> {
    let access = load_project_access(pool, auth, project).await?;
    if access < ProjectAccess::View {
        return Err(AuthzError::NotAuthorized);
    }
    Ok(access)
}

pub async fn require_project_manage(
    pool: &PgPool,
    auth: &AuthContext,
    project: &Project,
) -> Result<(), AuthzError> {
    if load_project_access(pool, auth, project).await? < ProjectAccess::Manage {
        return Err(AuthzError::NotAuthorized);
    }
    Ok(())
}

/// Loads the caller's rights over a task via its project
pub async fn load_task_access(
    pool: &PgPool,
    auth: &AuthContext,
    task: &Task,
) -> Result<TaskAccess, AuthzError> {
    if auth.is_admin() {
        return Ok(TaskAccess::Manage);
    }

    let project = Project::find_by_id(pool, task.project_id)
        .await?
        .ok_or(AuthzError::NotAuthorized)?;
    let project = load_project_access(pool, auth, &project).await?;

    Ok(task_access(auth, task, project))
}

pub async fn require_task_view(
    pool: &PgPool,
    auth: &AuthContext,
    task: &Task,
) -> Result<TaskAccess, AuthzError> {
    let access = load_task_access(pool, auth, task).await?;
    if access == TaskAccess::None {
        return Err(AuthzError::NotAuthorized);
    }
    Ok(access)
}

/// Requires rights to work a task's checklist: project manager or assignee
pub async fn require_task_work(
    pool: &PgPool,
    auth: &AuthContext,
    task: &Task,
) -> Result<(), AuthzError> {
    if load_task_access(pool, auth, task).await? < TaskAccess::Assignee {
        return Err(AuthzError::NotAuthorized);
    }
    Ok(())
}
