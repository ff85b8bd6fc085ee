/// Activity log endpoints (admin only)
///
/// The log is append-only; rows are written by
/// [`crate::services::activity::record`] and cannot be edited or deleted
/// through the API.
///
/// # Endpoints
///
/// - `GET /v1/activity-logs` - List (`user_id`, `entity_type`, `entity_id`,
///   `limit`, `offset`), newest first
/// - `GET /v1/activity-logs/:id`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use planboard_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    models::{
        activity_log::{ActivityLog, ActivityLogFilter, EntityType},
        Pagination,
    },
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListActivityLogsQuery {
    pub user_id: Option<Uuid>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_activity_logs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListActivityLogsQuery>,
) -> ApiResult<Json<Vec<ActivityLog>>> {
    require_admin(&auth)?;

    let filter = ActivityLogFilter {
        user_id: query.user_id,
        entity_type: query.entity_type,
        entity_id: query.entity_id,
    };

    let logs = ActivityLog::list(
        &state.db,
        filter,
        Pagination::new(query.limit, query.offset),
    )
    .await?;

    Ok(Json(logs))
}

pub async fn get_activity_log(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ActivityLog>> {
    require_admin(&auth)?;

    let log = ActivityLog::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Activity log"))?;

    Ok(Json(log))
}
