/// User management endpoints
///
/// # Endpoints
///
/// - `GET /v1/users` - List users (admin)
/// - `POST /v1/users` - Create a user with a role (admin)
/// - `GET /v1/users/:id` - Get a user (self or admin)
/// - `PATCH|PUT /v1/users/:id` - Update a user (self or admin)
/// - `DELETE /v1/users/:id` - Delete a user (admin, not self)
/// - `PUT /v1/users/:id/avatar` - Upload an avatar image (self or admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{double_option, validate},
    services::activity,
    storage::{avatar_extension, avatar_key},
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Extension, Json,
};
use planboard_shared::{
    auth::{
        authorization::{require_admin, require_self_or_admin},
        middleware::AuthContext,
        password,
    },
    models::{
        activity_log::{ActivityAction, EntityType},
        user::{CreateUser, UpdateUser, User, UserRole},
        Pagination,
    },
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[serde(default)]
    pub role: Option<UserRole>,
}

/// Partial user update; `name: null` clears the display name
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub password: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<Option<String>>,

    pub role: Option<UserRole>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<Vec<User>>> {
    require_admin(&auth)?;

    let users = User::list(&state.db, Pagination::new(query.limit, query.offset)).await?;
    Ok(Json(users))
}

/// Creates a user on behalf of an admin
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an admin
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Validation failed or weak password
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    require_admin(&auth)?;
    validate(&req)?;
    password::validate_password_strength(&req.password)?;

    let role = req.role.unwrap_or(UserRole::User);
    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            password_hash: password::hash_password(&req.password)?,
            name: req.name,
            role,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, created_by = %auth.user_id, role = role.as_str(), "User created");

    activity::record(
        &state,
        &auth,
        ActivityAction::Create,
        EntityType::User,
        user.id,
        json!({ "email": user.email, "role": role }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    require_self_or_admin(&auth, id)?;

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(user))
}

/// Updates a user
///
/// A new password is strength-checked and re-hashed. Only admins may change
/// `role`.
///
/// # Errors
///
/// - `403 Forbidden`: Not self or admin, or role change by a non-admin
/// - `404 Not Found`: User does not exist
/// - `409 Conflict`: New email already taken
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    require_self_or_admin(&auth, id)?;
    validate(&req)?;

    if req.role.is_some() {
        require_admin(&auth)?;
    }

    let password_hash = match req.password.as_deref() {
        Some(new_password) => {
            password::validate_password_strength(new_password)?;
            Some(password::hash_password(new_password)?)
        }
        None => None,
    };

    let details = json!({
        "email": req.email,
        "name": req.name,
        "role": req.role,
        "password_changed": password_hash.is_some(),
    });

    let update = UpdateUser {
        email: req.email,
        password_hash,
        name: req.name,
        avatar_url: None,
        role: req.role,
    };

    let user = User::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    activity::record(
        &state,
        &auth,
        ActivityAction::Update,
        EntityType::User,
        user.id,
        details,
    )
    .await;

    Ok(Json(user))
}

/// Deletes a user
///
/// # Errors
///
/// - `400 Bad Request`: Admin tried to delete their own account
/// - `403 Forbidden`: Caller is not an admin
/// - `404 Not Found`: User does not exist
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;

    if id == auth.user_id {
        return Err(ApiError::BadRequest(
            "Admins cannot delete their own account".to_string(),
        ));
    }

    if !User::delete(&state.db, id).await? {
        return Err(ApiError::not_found("User"));
    }

    tracing::info!(user_id = %id, deleted_by = %auth.user_id, "User deleted");

    activity::record(
        &state,
        &auth,
        ActivityAction::Delete,
        EntityType::User,
        id,
        json!({}),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Uploads a new avatar image
///
/// # Endpoint
///
/// ```text
/// PUT /v1/users/:id/avatar
/// Content-Type: image/png
///
/// <raw image bytes>
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Empty body
/// - `413 Payload Too Large`: Body exceeds `AVATAR_MAX_BYTES`
/// - `415 Unsupported Media Type`: Not png, jpeg, webp or gif
/// - `503 Service Unavailable`: Object storage is not configured
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<User>> {
    require_self_or_admin(&auth, id)?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let extension = avatar_extension(content_type).ok_or_else(|| {
        ApiError::UnsupportedMediaType(
            "Avatar must be image/png, image/jpeg, image/webp or image/gif".to_string(),
        )
    })?;

    if body.is_empty() {
        return Err(ApiError::BadRequest("Avatar body is empty".to_string()));
    }
    let max_bytes = state.config.uploads.avatar_max_bytes;
    if body.len() > max_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "Avatar must be at most {} bytes",
            max_bytes
        )));
    }

    let store = state.object_store()?;

    if !User::exists(&state.db, id).await? {
        return Err(ApiError::not_found("User"));
    }

    let url = store
        .put_object(&avatar_key(id, extension), body, content_type)
        .await?;

    let user = User::update(
        &state.db,
        id,
        UpdateUser {
            avatar_url: Some(Some(url.clone())),
            ..Default::default()
        },
    )
    .await?
    .ok_or_else(|| ApiError::not_found("User"))?;

    activity::record(
        &state,
        &auth,
        ActivityAction::Update,
        EntityType::User,
        id,
        json!({ "avatar_url": url }),
    )
    .await;

    Ok(Json(user))
}
