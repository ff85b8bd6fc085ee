/// Team membership endpoints
///
/// # Endpoints
///
/// - `GET /v1/teams/:id/members` - List members with profiles (member or admin)
/// - `POST /v1/teams/:id/members` - Add a member (pm or admin)
/// - `PATCH|PUT /v1/teams/:id/members/:user_id` - Change role (pm or admin)
/// - `DELETE /v1/teams/:id/members/:user_id` - Remove (pm, admin, or self)
///
/// A team always keeps at least one `pm`: demoting or removing the last one
/// answers 409.

use crate::{
    app::AppState,
    error::ApiResult,
    routes::teams::load_team,
    services::{activity, notify},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use planboard_shared::{
    auth::{authorization::require_team_role, middleware::AuthContext},
    models::{
        activity_log::{ActivityAction, EntityType},
        team_member::{CreateMember, Member, MemberProfile, TeamRole},
    },
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,

    #[serde(default)]
    pub role: Option<TeamRole>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: TeamRole,
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MemberProfile>>> {
    let team = load_team(&state, team_id).await?;
    require_team_role(&state.db, &auth, team.id, TeamRole::Member).await?;

    Ok(Json(Member::list_by_team(&state.db, team.id).await?))
}

/// Adds a user to the team and sends them a `team_invitation`
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not a pm of the team
/// - `404 Not Found`: Team or user does not exist
/// - `409 Conflict`: User is already a member
pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<Member>)> {
    let team = load_team(&state, team_id).await?;
    require_team_role(&state.db, &auth, team.id, TeamRole::Pm).await?;

    let member = Member::add(
        &state.db,
        CreateMember {
            team_id: team.id,
            user_id: req.user_id,
            role: req.role.unwrap_or(TeamRole::Member),
        },
    )
    .await?;

    tracing::info!(
        team_id = %team.id,
        user_id = %member.user_id,
        role = member.role.as_str(),
        "Member added"
    );

    activity::record(
        &state,
        &auth,
        ActivityAction::Create,
        EntityType::Member,
        member.user_id,
        json!({ "team_id": team.id, "role": member.role }),
    )
    .await;

    if member.user_id != auth.user_id {
        notify::notify(
            &state,
            notify::team_invitation(member.user_id, team.id, &team.name),
        )
        .await;
    }

    Ok((StatusCode::CREATED, Json(member)))
}

/// Changes a member's role and sends them a `team_role_changed`
///
/// # Errors
///
/// - `404 Not Found`: User is not a member
/// - `409 Conflict`: Would demote the team's last pm
pub async fn change_member_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ChangeRoleRequest>,
) -> ApiResult<Json<Member>> {
    let team = load_team(&state, team_id).await?;
    require_team_role(&state.db, &auth, team.id, TeamRole::Pm).await?;

    let member = Member::change_role(&state.db, team.id, user_id, req.role).await?;

    activity::record(
        &state,
        &auth,
        ActivityAction::Update,
        EntityType::Member,
        user_id,
        json!({ "team_id": team.id, "role": member.role }),
    )
    .await;

    if user_id != auth.user_id {
        notify::notify(
            &state,
            notify::team_role_changed(user_id, team.id, &team.name, member.role.as_str()),
        )
        .await;
    }

    Ok(Json(member))
}

/// Removes a member; any member may remove themselves
///
/// # Errors
///
/// - `403 Forbidden`: Removing someone else without pm rights
/// - `404 Not Found`: User is not a member
/// - `409 Conflict`: User is the team's last pm
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let team = load_team(&state, team_id).await?;

    if user_id != auth.user_id {
        require_team_role(&state.db, &auth, team.id, TeamRole::Pm).await?;
    }

    let previous = Member::remove(&state.db, team.id, user_id).await?;

    tracing::info!(team_id = %team.id, %user_id, removed_by = %auth.user_id, "Member removed");

    activity::record(
        &state,
        &auth,
        ActivityAction::Delete,
        EntityType::Member,
        user_id,
        json!({ "team_id": team.id, "role": previous }),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
