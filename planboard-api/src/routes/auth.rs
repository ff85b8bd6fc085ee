/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register new user
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Refresh access token
/// - `POST /v1/auth/logout` - Revoke the presented tokens (JWT)
/// - `GET /v1/auth/me` - Current user (JWT)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::validate,
    services::activity,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Extension, Json,
};
use planboard_shared::{
    auth::{
        jwt::{self, Claims},
        middleware::{bearer_token, AuthContext, AuthError},
        password,
    },
    models::{
        activity_log::{ActivityAction, EntityType},
        user::User,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

const TOKEN_TYPE: &str = "Bearer";

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (strength checked separately)
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout request; the refresh token is optional
#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Register and login response
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

fn auth_response(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let (access_token, refresh_token) = jwt::issue_token_pair(
        user.id,
        user.role,
        &state.config.jwt.lifetimes(),
        state.jwt_secret(),
    )?;

    Ok(AuthResponse {
        user,
        access_token,
        refresh_token,
        token_type: TOKEN_TYPE,
        expires_in: state.config.jwt.access_ttl_seconds,
    })
}

/// Register a new user
///
/// The first account registered on an empty database becomes an admin.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "user@example.com",
///   "password": "Planb0ard!",
///   "name": "Jane Doe"
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "user": { "id": "uuid", "email": "user@example.com", "role": "user", ... },
///   "access_token": "eyJ...",
///   "refresh_token": "eyJ...",
///   "token_type": "Bearer",
///   "expires_in": 86400
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Validation failed or weak password
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    validate(&req)?;
    password::validate_password_strength(&req.password)?;

    let password_hash = password::hash_password(&req.password)?;
    let user = User::register(&state.db, &req.email, &password_hash, req.name.as_deref()).await?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "User registered");

    let auth = AuthContext {
        user_id: user.id,
        role: user.role,
    };
    activity::record(
        &state,
        &auth,
        ActivityAction::Create,
        EntityType::User,
        user.id,
        json!({ "email": user.email, "self_registered": true }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(auth_response(&state, user)?)))
}

/// Login endpoint
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/login
/// Content-Type: application/json
///
/// {
///   "email": "user@example.com",
///   "password": "Planb0ard!"
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
/// - `422 Unprocessable Entity`: Validation failed
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    validate(&req)?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    User::update_last_login(&state.db, user.id).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(auth_response(&state, user)?))
}

/// Token refresh endpoint
///
/// Exchanges a refresh token for a new access token. The role is read from
/// the stored account, not from the refresh token, so a demotion takes
/// effect on the next refresh and a deleted account cannot refresh at all.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid, expired or revoked refresh token, or the
///   account no longer exists
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    if state.blacklist.is_revoked(&req.refresh_token).await {
        return Err(AuthError::Revoked.into());
    }

    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    if user.role != claims.role {
        tracing::info!(user_id = %user.id, role = user.role.as_str(), "Refresh picked up a role change");
    }

    let access_token = jwt::issue_access_token(
        user.id,
        user.role,
        state.config.jwt.lifetimes().access,
        state.jwt_secret(),
    )?;

    Ok(Json(RefreshResponse {
        access_token,
        token_type: TOKEN_TYPE,
        expires_in: state.config.jwt.access_ttl_seconds,
    }))
}

/// Logout endpoint
///
/// Revokes the bearer access token. A refresh token in the body is revoked
/// too when it is valid and belongs to the same user; anything else in
/// that field is ignored.
///
/// # Response
///
/// `204 No Content`
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    body: Option<Json<LogoutRequest>>,
) -> ApiResult<StatusCode> {
    let access_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)
        .and_then(bearer_token)?;

    state.blacklist.revoke(access_token, claims.exp).await;

    let Json(req) = body.unwrap_or_default();
    if let Some(refresh_token) = req.refresh_token.as_deref() {
        match jwt::validate_refresh_token(refresh_token, state.jwt_secret()) {
            Ok(refresh) if refresh.sub == claims.sub => {
                state.blacklist.revoke(refresh_token, refresh.exp).await;
            }
            Ok(_) => {
                tracing::warn!(user_id = %claims.sub, "Logout ignored another user's refresh token");
            }
            Err(e) => {
                tracing::debug!(error = %e, "Logout ignored invalid refresh token");
            }
        }
    }

    tracing::info!(user_id = %claims.sub, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the authenticated user
///
/// # Errors
///
/// - `404 Not Found`: The account was deleted after the token was issued
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<User>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(user))
}
