/// Authentication middleware for Axum
///
/// The JWT guard reads `Authorization: Bearer <token>`, validates it as an
/// access token, rejects revoked tokens, and adds an [`AuthContext`] to the
/// request extensions. The realtime gateways reuse [`authenticate_token`]
/// for the `?token=` query parameter.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use planboard_shared::auth::blacklist::TokenBlacklist;
/// use planboard_shared::auth::middleware::{jwt_auth_middleware, AuthContext, JwtGuard};
///
/// async fn protected_handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, user {}!", auth.user_id)
/// }
///
/// let guard = JwtGuard::new("your-jwt-secret", TokenBlacklist::new());
/// let app: Router = Router::new()
///     .route("/protected", get(protected_handler))
///     .layer(middleware::from_fn_with_state(guard, jwt_auth_middleware));
/// ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::blacklist::TokenBlacklist;
use super::jwt::{validate_access_token, Claims, JwtError};
use crate::models::user::UserRole;

/// Authentication context added to request extensions
///
/// ```
/// use axum::Extension;
/// use planboard_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("User: {}, admin: {}", auth.user_id, auth.is_admin())
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl AuthContext {
    /// Creates auth context from validated JWT claims
    pub fn from_jwt(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Error type for authentication middleware
#[derive(Debug)]
pub enum AuthError {
    /// Missing authorization header or token
    MissingCredentials,

    /// Invalid authorization header format
    InvalidFormat(String),

    /// Token validation failed
    InvalidToken(String),

    /// Token was revoked by logout
    Revoked,
}

impl AuthError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AuthError::MissingCredentials => {
                (StatusCode::UNAUTHORIZED, "Missing credentials".to_string())
            }
            AuthError::InvalidFormat(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AuthError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AuthError::Revoked => (StatusCode::UNAUTHORIZED, "Token has been revoked".to_string()),
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.status_and_message().1)
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        let body = json!({
            "error": "unauthorized",
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::Revoked => AuthError::Revoked,
            e => AuthError::InvalidToken(format!("Invalid token: {}", e)),
        }
    }
}

/// State carried by the JWT guard
#[derive(Debug, Clone)]
pub struct JwtGuard {
    secret: Arc<str>,
    blacklist: TokenBlacklist,
}

impl JwtGuard {
    pub fn new(secret: impl Into<Arc<str>>, blacklist: TokenBlacklist) -> Self {
        Self {
            secret: secret.into(),
            blacklist,
        }
    }
}

/// Validates an access token and checks it against the blacklist
pub async fn authenticate_token(
    token: &str,
    secret: &str,
    blacklist: &TokenBlacklist,
) -> Result<(AuthContext, Claims), AuthError> {
    let claims = validate_access_token(token, secret)?;

    if blacklist.is_revoked(token).await {
        return Err(AuthError::Revoked);
    }

    Ok((AuthContext::from_jwt(&claims), claims))
}

/// Extracts the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Result<&str, AuthError> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// JWT authentication middleware
///
/// # Errors
///
/// Returns 401 Unauthorized if:
/// - Authorization header is missing
/// - Token format is invalid
/// - Token validation fails or the token has expired
/// - Token has been revoked
pub async fn jwt_auth_middleware(
    State(guard): State<JwtGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = bearer_token(auth_header)?;
    let (auth_context, claims) = authenticate_token(token, &guard.secret, &guard.blacklist).await?;

    req.extensions_mut().insert(auth_context);
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{create_token, TokenType};

    const SECRET: &str = "middleware-test-secret-at-least-32-bytes";

    #[test]
    fn test_auth_context_from_jwt() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, UserRole::Admin, TokenType::Access);

        let context = AuthContext::from_jwt(&claims);

        assert_eq!(context.user_id, user_id);
        assert!(context.is_admin());
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def").unwrap(), "abc.def");
        assert!(bearer_token("Basic abc").is_err());
        assert!(bearer_token("Bearer ").is_err());
    }

    #[test]
    fn test_auth_error_into_response() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidFormat("test".to_string()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::Revoked.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_authenticate_token_rejects_revoked() {
        let blacklist = TokenBlacklist::new();
        let claims = Claims::new(Uuid::new_v4(), UserRole::User, TokenType::Access);
        let token = create_token(&claims, SECRET).unwrap();

        assert!(authenticate_token(&token, SECRET, &blacklist).await.is_ok());

        blacklist.revoke(&token, claims.exp).await;
        assert!(matches!(
            authenticate_token(&token, SECRET, &blacklist).await,
            Err(AuthError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_token_rejects_refresh_token() {
        let blacklist = TokenBlacklist::new();
        let claims = Claims::new(Uuid::new_v4(), UserRole::User, TokenType::Refresh);
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(
            authenticate_token(&token, SECRET, &blacklist).await,
            Err(AuthError::InvalidToken(_))
        ));
    }
}
