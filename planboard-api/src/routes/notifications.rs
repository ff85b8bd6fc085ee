/// Notification endpoints
///
/// Every route except `POST` works on the caller's own notifications only.
/// Another user's notification answers 404.
///
/// # Endpoints
///
/// - `GET /v1/notifications` - List own (`unread_only`, `limit`, `offset`)
/// - `POST /v1/notifications` - Send a `system` notification (admin)
/// - `POST /v1/notifications/read-all` - Mark all own as read
/// - `GET /v1/notifications/unread-count`
/// - `GET /v1/notifications/:id`
/// - `PATCH|PUT /v1/notifications/:id` - Set `is_read`
/// - `DELETE /v1/notifications/:id`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::validate,
    services::{activity, notify},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use planboard_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    models::{
        activity_log::{ActivityAction, EntityType},
        notification::{CreateNotification, Notification, NotificationKind},
        user::User,
        Pagination,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNotificationRequest {
    pub user_id: Uuid,

    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Message must not be empty"))]
    pub message: String,

    #[validate(length(max = 2048, message = "Link must be at most 2048 characters"))]
    pub link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNotificationRequest {
    pub is_read: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

fn not_found() -> ApiError {
    ApiError::not_found("Notification")
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListNotificationsQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let notifications = Notification::list_for_user(
        &state.db,
        auth.user_id,
        query.unread_only,
        Pagination::new(query.limit, query.offset),
    )
    .await?;

    Ok(Json(notifications))
}

/// Sends a `system` notification to a user and pushes it to their sockets
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an admin
/// - `404 Not Found`: Recipient does not exist
pub async fn create_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateNotificationRequest>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    require_admin(&auth)?;
    validate(&req)?;

    if !User::exists(&state.db, req.user_id).await? {
        return Err(ApiError::not_found("User"));
    }

    let notification = Notification::create(
        &state.db,
        CreateNotification {
            user_id: req.user_id,
            kind: NotificationKind::System,
            title: req.title,
            message: req.message,
            link: req.link,
        },
    )
    .await?;

    notify::deliver(&state, &notification).await;

    activity::record(
        &state,
        &auth,
        ActivityAction::Create,
        EntityType::Notification,
        notification.id,
        json!({ "recipient": notification.user_id, "title": notification.title }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(notification)))
}

pub async fn get_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    let notification = Notification::find_for_user(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(notification))
}

pub async fn update_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateNotificationRequest>,
) -> ApiResult<Json<Notification>> {
    let notification = Notification::set_read(&state.db, id, auth.user_id, req.is_read)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(notification))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MarkAllReadResponse>> {
    let updated = Notification::mark_all_read(&state.db, auth.user_id).await?;
    tracing::debug!(user_id = %auth.user_id, updated, "Notifications marked read");

    Ok(Json(MarkAllReadResponse { updated }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UnreadCountResponse>> {
    let count = Notification::unread_count(&state.db, auth.user_id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Notification::delete_for_user(&state.db, id, auth.user_id).await? {
        return Err(not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
