/// Calendar event endpoints
///
/// Events belong to the user who created them; admins see every event.
///
/// # Endpoints
///
/// - `GET /v1/events` - List (`from`, `to`, `project_id`, `limit`, `offset`)
/// - `POST /v1/events`
/// - `GET /v1/events/:id`
/// - `PATCH|PUT /v1/events/:id`
/// - `DELETE /v1/events/:id`
///
/// `from`/`to` are RFC 3339 timestamps bounding `starts_at` (`to` exclusive).

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
use chrono::{DateTime, Utc};
use planboard_shared::{
    auth::{
        authorization::{require_project_view, require_self_or_admin},
        middleware::AuthContext,
    },
    models::{
        activity_log::{ActivityAction, EntityType},
        event::{CreateEvent, Event, EventFilter, UpdateEvent},
        project::Project,
        Pagination,
    },
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub project_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    pub description: Option<String>,

    #[validate(length(max = 255, message = "Location must be at most 255 characters"))]
    pub location: Option<String>,

    pub project_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<Uuid>>,

    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

fn check_window(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> ApiResult<()> {
    if ends_at < starts_at {
        return Err(ApiError::BadRequest(
            "ends_at must not be before starts_at".to_string(),
        ));
    }
    Ok(())
}

async fn require_project(state: &AppState, auth: &AuthContext, project_id: Uuid) -> ApiResult<()> {
    let project = Project::find_by_id(&state.db, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    require_project_view(&state.db, auth, &project).await?;
    Ok(())
}

/// Loads an event the caller owns (or any event for admins)
async fn load_owned(state: &AppState, auth: &AuthContext, id: Uuid) -> ApiResult<Event> {
    let event = Event::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))?;
    require_self_or_admin(auth, event.user_id)?;
    Ok(event)
}

pub async fn list_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListEventsQuery>,
) -> ApiResult<Json<Vec<Event>>> {
    if let Some(project_id) = query.project_id {
        require_project(&state, &auth, project_id).await?;
    }

    let filter = EventFilter {
        user_id: (!auth.is_admin()).then_some(auth.user_id),
        project_id: query.project_id,
        from: query.from,
        to: query.to,
    };

    let events = Event::list(
        &state.db,
        filter,
        Pagination::new(query.limit, query.offset),
    )
    .await?;

    Ok(Json(events))
}

/// Creates an event owned by the caller
///
/// # Errors
///
/// - `400 Bad Request`: `ends_at` before `starts_at`
/// - `403 Forbidden`: No view rights on `project_id`
pub async fn create_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateEventRequest>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    validate(&req)?;
    check_window(req.starts_at, req.ends_at)?;

    if let Some(project_id) = req.project_id {
        require_project(&state, &auth, project_id).await?;
    }

    let event = Event::create(
        &state.db,
        CreateEvent {
            user_id: auth.user_id,
            project_id: req.project_id,
            title: req.title,
            description: req.description,
            location: req.location,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
        },
    )
    .await?;

    activity::record(
        &state,
        &auth,
        ActivityAction::Create,
        EntityType::Event,
        event.id,
        json!({ "title": event.title, "starts_at": event.starts_at }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn get_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Event>> {
    Ok(Json(load_owned(&state, &auth, id).await?))
}

pub async fn update_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEventRequest>,
) -> ApiResult<Json<Event>> {
    validate(&req)?;

    let event = load_owned(&state, &auth, id).await?;
    check_window(
        req.starts_at.unwrap_or(event.starts_at),
        req.ends_at.unwrap_or(event.ends_at),
    )?;

    if let Some(Some(project_id)) = req.project_id {
        if event.project_id != Some(project_id) {
            require_project(&state, &auth, project_id).await?;
        }
    }

    let details = json!({
        "title": req.title,
        "starts_at": req.starts_at,
        "ends_at": req.ends_at,
        "project_id": req.project_id,
    });

    let update = UpdateEvent {
        project_id: req.project_id,
        title: req.title,
        description: req.description,
        location: req.location,
        starts_at: req.starts_at,
        ends_at: req.ends_at,
    };

    let event = Event::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))?;

    activity::record(
        &state,
        &auth,
        ActivityAction::Update,
        EntityType::Event,
        event.id,
        details,
    )
    .await;

    Ok(Json(event))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let event = load_owned(&state, &auth, id).await?;

    if !Event::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Event"));
    }

    activity::record(
        &state,
        &auth,
        ActivityAction::Delete,
        EntityType::Event,
        id,
        json!({ "title": event.title }),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
