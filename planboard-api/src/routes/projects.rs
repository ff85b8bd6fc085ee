/// Project endpoints
///
/// # Endpoints
///
/// - `GET /v1/projects` - List visible projects (`status`, `limit`, `offset`)
/// - `POST /v1/projects` - Create a project owned by the caller
/// - `GET /v1/projects/:id` - Get a project (owner, team member, admin)
/// - `PATCH|PUT /v1/projects/:id` - Update (owner, team pm, admin)
/// - `DELETE /v1/projects/:id` - Delete (owner, team pm, admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{double_option, validate},
    services::activity,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use planboard_shared::{
    auth::{
        authorization::{require_project_manage, require_project_view, require_team_role},
        middleware::AuthContext,
    },
    models::{
        activity_log::{ActivityAction, EntityType},
        project::{
            dates_in_order, CreateProject, Project, ProjectFilter, ProjectStatus, UpdateProject,
        },
        team_member::TeamRole,
        Pagination,
    },
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub status: Option<ProjectStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    pub description: Option<String>,

    #[serde(default)]
    pub status: ProjectStatus,

    pub team_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    pub status: Option<ProjectStatus>,

    #[serde(default, deserialize_with = "double_option")]
    pub team_id: Option<Option<Uuid>>,

    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,
}

fn check_dates(start: Option<NaiveDate>, due: Option<NaiveDate>) -> ApiResult<()> {
    if dates_in_order(start, due) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "due_date must not be before start_date".to_string(),
        ))
    }
}

async fn load_project(state: &AppState, id: Uuid) -> ApiResult<Project> {
    Project::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListProjectsQuery>,
) -> ApiResult<Json<Vec<Project>>> {
    let visible_to = (!auth.is_admin()).then_some(auth.user_id);
    let filter = ProjectFilter {
        status: query.status,
    };

    let projects = Project::list(
        &state.db,
        visible_to,
        filter,
        Pagination::new(query.limit, query.offset),
    )
    .await?;

    Ok(Json(projects))
}

/// Creates a project owned by the caller
///
/// # Errors
///
/// - `400 Bad Request`: `due_date` before `start_date`
/// - `403 Forbidden`: `team_id` given and caller is not in that team
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    validate(&req)?;
    check_dates(req.start_date, req.due_date)?;

    if let Some(team_id) = req.team_id {
        require_team_role(&state.db, &auth, team_id, TeamRole::Member).await?;
    }

    let project = Project::create(
        &state.db,
        CreateProject {
            owner_id: auth.user_id,
            team_id: req.team_id,
            name: req.name,
            description: req.description,
            status: req.status,
            start_date: req.start_date,
            due_date: req.due_date,
        },
    )
    .await?;

    tracing::info!(project_id = %project.id, owner_id = %auth.user_id, "Project created");

    activity::record(
        &state,
        &auth,
        ActivityAction::Create,
        EntityType::Project,
        project.id,
        json!({ "name": project.name, "team_id": project.team_id }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    let project = load_project(&state, id).await?;
    require_project_view(&state.db, &auth, &project).await?;

    Ok(Json(project))
}

/// Updates a project
///
/// Moving the project to another team requires membership in that team.
pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<Json<Project>> {
    validate(&req)?;

    let project = load_project(&state, id).await?;
    require_project_manage(&state.db, &auth, &project).await?;

    check_dates(
        req.start_date.unwrap_or(project.start_date),
        req.due_date.unwrap_or(project.due_date),
    )?;

    if let Some(Some(team_id)) = req.team_id {
        if project.team_id != Some(team_id) {
            require_team_role(&state.db, &auth, team_id, TeamRole::Member).await?;
        }
    }

    let details = json!({
        "name": req.name,
        "status": req.status,
        "team_id": req.team_id,
    });

    let update = UpdateProject {
        name: req.name,
        description: req.description,
        status: req.status,
        team_id: req.team_id,
        start_date: req.start_date,
        due_date: req.due_date,
    };

    let project = Project::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    activity::record(
        &state,
        &auth,
        ActivityAction::Update,
        EntityType::Project,
        project.id,
        details,
    )
    .await;

    Ok(Json(project))
}

/// Deletes a project with its tasks, subtasks and events
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let project = load_project(&state, id).await?;
    require_project_manage(&state.db, &auth, &project).await?;

    if !Project::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Project"));
    }

    tracing::info!(project_id = %id, user_id = %auth.user_id, "Project deleted");

    activity::record(
        &state,
        &auth,
        ActivityAction::Delete,
        EntityType::Project,
        id,
        json!({ "name": project.name }),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
