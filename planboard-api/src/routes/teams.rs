/// Team endpoints
///
/// # Endpoints
///
/// - `GET /v1/teams` - Teams the caller belongs to (admins: all)
/// - `POST /v1/teams` - Create a team; the creator becomes its `pm`
/// - `GET /v1/teams/:id` - Get a team (member or admin)
/// - `PATCH|PUT /v1/teams/:id` - Update (pm or admin)
/// - `DELETE /v1/teams/:id` - Delete (pm or admin)
///
/// Membership lives in [`super::members`].

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
use planboard_shared::{
    auth::{authorization::require_team_role, middleware::AuthContext},
    models::{
        activity_log::{ActivityAction, EntityType},
        team::{CreateTeam, Team, UpdateTeam},
        team_member::TeamRole,
        Pagination,
    },
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListTeamsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

/// Loads a team, mapping absence to 404
pub(crate) async fn load_team(state: &AppState, id: Uuid) -> ApiResult<Team> {
    Team::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team"))
}

pub async fn list_teams(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListTeamsQuery>,
) -> ApiResult<Json<Vec<Team>>> {
    let page = Pagination::new(query.limit, query.offset);

    let teams = if auth.is_admin() {
        Team::list(&state.db, page).await?
    } else {
        Team::list_for_user(&state.db, auth.user_id, page).await?
    };

    Ok(Json(teams))
}

pub async fn create_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<Team>)> {
    validate(&req)?;

    let team = Team::create(
        &state.db,
        CreateTeam {
            name: req.name,
            description: req.description,
            created_by: auth.user_id,
        },
    )
    .await?;

    tracing::info!(team_id = %team.id, created_by = %auth.user_id, "Team created");

    activity::record(
        &state,
        &auth,
        ActivityAction::Create,
        EntityType::Team,
        team.id,
        json!({ "name": team.name }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn get_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Team>> {
    let team = load_team(&state, id).await?;
    require_team_role(&state.db, &auth, team.id, TeamRole::Member).await?;

    Ok(Json(team))
}

pub async fn update_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTeamRequest>,
) -> ApiResult<Json<Team>> {
    validate(&req)?;

    let team = load_team(&state, id).await?;
    require_team_role(&state.db, &auth, team.id, TeamRole::Pm).await?;

    let details = json!({ "name": req.name, "description": req.description });

    let team = Team::update(
        &state.db,
        id,
        UpdateTeam {
            name: req.name,
            description: req.description,
        },
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Team"))?;

    activity::record(
        &state,
        &auth,
        ActivityAction::Update,
        EntityType::Team,
        team.id,
        details,
    )
    .await;

    Ok(Json(team))
}

/// Deletes a team; its projects are detached, not deleted
pub async fn delete_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let team = load_team(&state, id).await?;
    require_team_role(&state.db, &auth, team.id, TeamRole::Pm).await?;

    if !Team::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Team"));
    }

    tracing::info!(team_id = %id, user_id = %auth.user_id, "Team deleted");

    activity::record(
        &state,
        &auth,
        ActivityAction::Delete,
        EntityType::Team,
        id,
        json!({ "name": team.name }),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
