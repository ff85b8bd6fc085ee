/// Task endpoints
///
/// # Endpoints
///
/// - `GET /v1/tasks` - List visible tasks (`project_id`, `assignee_id`,
///   `status`, `priority`, `limit`, `offset`)
/// - `POST /v1/tasks` - Create a task (project manage rights)
/// - `GET /v1/tasks/:id` - Get a task (project view rights or assignee)
/// - `PATCH|PUT /v1/tasks/:id` - Update (project manage rights; the
///   assignee may change `status` only)
/// - `DELETE /v1/tasks/:id` - Delete (project manage rights)
///
/// Assigning a task to someone other than the caller notifies the assignee.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{double_option, validate},
    services::{activity, notify},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use planboard_shared::{
    auth::{
        authorization::{
            check_task_update, load_task_access, require_project_manage, require_task_view,
            AuthzError, TaskAccess,
        },
        middleware::AuthContext,
    },
    models::{
        activity_log::{ActivityAction, EntityType},
        project::Project,
        task::{CreateTask, Task, TaskFilter, TaskPriority, TaskStatus, UpdateTask},
        Pagination,
    },
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub project_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    pub project_id: Uuid,

    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    pub description: Option<String>,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: TaskPriority,

    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    pub project_id: Option<Uuid>,

    #[serde(default, deserialize_with = "double_option")]
    pub assignee_id: Option<Option<Uuid>>,

    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,

    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,
}

impl From<UpdateTaskRequest> for UpdateTask {
    fn from(req: UpdateTaskRequest) -> Self {
        UpdateTask {
            project_id: req.project_id,
            assignee_id: req.assignee_id,
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            due_date: req.due_date,
        }
    }
}

async fn load_task(state: &AppState, id: Uuid) -> ApiResult<Task> {
    Task::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))
}

async fn load_project(state: &AppState, id: Uuid) -> ApiResult<Project> {
    Project::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))
}

/// Notifies a new assignee unless they assigned themselves
async fn notify_assignee(state: &AppState, auth: &AuthContext, task: &Task) {
    if let Some(assignee_id) = task.assignee_id.filter(|id| *id != auth.user_id) {
        notify::notify(
            state,
            notify::task_assigned(assignee_id, task.id, &task.title),
        )
        .await;
    }
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let visible_to = (!auth.is_admin()).then_some(auth.user_id);
    let filter = TaskFilter {
        project_id: query.project_id,
        assignee_id: query.assignee_id,
        status: query.status,
        priority: query.priority,
    };

    let tasks = Task::list(
        &state.db,
        visible_to,
        filter,
        Pagination::new(query.limit, query.offset),
    )
    .await?;

    Ok(Json(tasks))
}

/// Creates a task in a project the caller manages
///
/// # Errors
///
/// - `400 Bad Request`: Unknown assignee
/// - `403 Forbidden`: No manage rights on the project
/// - `404 Not Found`: Project does not exist
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    validate(&req)?;

    let project = load_project(&state, req.project_id).await?;
    require_project_manage(&state.db, &auth, &project).await?;

    let task = Task::create(
        &state.db,
        CreateTask {
            project_id: project.id,
            created_by: Some(auth.user_id),
            assignee_id: req.assignee_id,
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            due_date: req.due_date,
        },
    )
    .await?;

    tracing::info!(task_id = %task.id, project_id = %project.id, "Task created");

    activity::record(
        &state,
        &auth,
        ActivityAction::Create,
        EntityType::Task,
        task.id,
        json!({ "title": task.title, "project_id": task.project_id, "assignee_id": task.assignee_id }),
    )
    .await;
    notify_assignee(&state, &auth, &task).await;

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    let task = load_task(&state, id).await?;
    require_task_view(&state.db, &auth, &task).await?;

    Ok(Json(task))
}

/// Updates a task
///
/// # Errors
///
/// - `403 Forbidden`: Not a manager, or an assignee changing more than status
/// - `404 Not Found`: Task, or the target project, does not exist
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    validate(&req)?;

    let task = load_task(&state, id).await?;
    let update = UpdateTask::from(req);

    let access = load_task_access(&state.db, &auth, &task).await?;
    check_task_update(access, &update)?;

    if let Some(project_id) = update.project_id.filter(|p| *p != task.project_id) {
        let target = load_project(&state, project_id).await?;
        require_project_manage(&state.db, &auth, &target).await?;
    }

    let reassigned = matches!(update.assignee_id, Some(new) if new != task.assignee_id);
    let details = json!({
        "title": update.title,
        "status": update.status,
        "priority": update.priority,
        "assignee_id": update.assignee_id,
        "project_id": update.project_id,
    });

    let updated = Task::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    activity::record(
        &state,
        &auth,
        ActivityAction::Update,
        EntityType::Task,
        updated.id,
        details,
    )
    .await;

    if reassigned {
        notify_assignee(&state, &auth, &updated).await;
    }

    Ok(Json(updated))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let task = load_task(&state, id).await?;

    if load_task_access(&state.db, &auth, &task).await? < TaskAccess::Manage {
        return Err(AuthzError::NotAuthorized.into());
    }

    if !Task::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Task"));
    }

    activity::record(
        &state,
        &auth,
        ActivityAction::Delete,
        EntityType::Task,
        id,
        json!({ "title": task.title, "project_id": task.project_id }),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
