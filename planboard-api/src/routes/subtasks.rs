/// Subtask (checklist item) endpoints
///
/// Access follows the parent task: viewing needs task view rights, writing
/// needs project manage rights or being the task's assignee.
///
/// # Endpoints
///
/// - `GET /v1/subtasks?task_id=` - List a task's checklist with progress
/// - `POST /v1/subtasks` - Append a subtask
/// - `GET /v1/subtasks/:id`
/// - `PATCH|PUT /v1/subtasks/:id`
/// - `DELETE /v1/subtasks/:id`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::validate,
    services::activity,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use planboard_shared::{
    auth::{
        authorization::{require_task_view, require_task_work},
        middleware::AuthContext,
    },
    models::{
        activity_log::{ActivityAction, EntityType},
        subtask::{CreateSubtask, Subtask, UpdateSubtask},
        task::Task,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListSubtasksQuery {
    pub task_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SubtaskList {
    pub task_id: Uuid,
    pub subtasks: Vec<Subtask>,
    pub completed: i64,
    pub total: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubtaskRequest {
    pub task_id: Uuid,

    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateSubtaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,

    pub is_completed: Option<bool>,

    #[validate(range(min = 0, message = "Position must not be negative"))]
    pub position: Option<i32>,
}

async fn load_task(state: &AppState, id: Uuid) -> ApiResult<Task> {
    Task::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))
}

/// Loads a subtask together with its parent task
async fn load_subtask(state: &AppState, id: Uuid) -> ApiResult<(Subtask, Task)> {
    let subtask = Subtask::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Subtask"))?;
    let task = load_task(state, subtask.task_id).await?;

    Ok((subtask, task))
}

/// Lists a task's checklist in position order
///
/// # Errors
///
/// - `400 Bad Request`: Missing or malformed `task_id`
/// - `404 Not Found`: Task does not exist
pub async fn list_subtasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListSubtasksQuery>,
) -> ApiResult<Json<SubtaskList>> {
    let task = load_task(&state, query.task_id).await?;
    require_task_view(&state.db, &auth, &task).await?;

    let subtasks = Subtask::list_by_task(&state.db, task.id).await?;
    let (completed, total) = Subtask::progress(&state.db, task.id).await?;

    Ok(Json(SubtaskList {
        task_id: task.id,
        subtasks,
        completed,
        total,
    }))
}

pub async fn create_subtask(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateSubtaskRequest>,
) -> ApiResult<(StatusCode, Json<Subtask>)> {
    validate(&req)?;

    let task = load_task(&state, req.task_id).await?;
    require_task_work(&state.db, &auth, &task).await?;

    let subtask = Subtask::create(
        &state.db,
        CreateSubtask {
            task_id: task.id,
            title: req.title,
        },
    )
    .await?;

    activity::record(
        &state,
        &auth,
        ActivityAction::Create,
        EntityType::Subtask,
        subtask.id,
        json!({ "task_id": task.id, "title": subtask.title }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(subtask)))
}

pub async fn get_subtask(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Subtask>> {
    let (subtask, task) = load_subtask(&state, id).await?;
    require_task_view(&state.db, &auth, &task).await?;

    Ok(Json(subtask))
}

pub async fn update_subtask(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSubtaskRequest>,
) -> ApiResult<Json<Subtask>> {
    validate(&req)?;

    let (_, task) = load_subtask(&state, id).await?;
    require_task_work(&state.db, &auth, &task).await?;

    let details = json!({
        "task_id": task.id,
        "title": req.title,
        "is_completed": req.is_completed,
        "position": req.position,
    });

    let update = UpdateSubtask {
        title: req.title,
        is_completed: req.is_completed,
        position: req.position,
    };

    let subtask = Subtask::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("Subtask"))?;

    activity::record(
        &state,
        &auth,
        ActivityAction::Update,
        EntityType::Subtask,
        subtask.id,
        details,
    )
    .await;

    Ok(Json(subtask))
}

pub async fn delete_subtask(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let (subtask, task) = load_subtask(&state, id).await?;
    require_task_work(&state.db, &auth, &task).await?;

    if !Subtask::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Subtask"));
    }

    activity::record(
        &state,
        &auth,
        ActivityAction::Delete,
        EntityType::Subtask,
        id,
        json!({ "task_id": task.id, "title": subtask.title }),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
