/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`; lower-level errors convert
/// with `?`.
///
/// # Example
///
/// ```
/// use planboard_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler(found: bool) -> ApiResult<Json<serde_json::Value>> {
///     if !found {
///         return Err(ApiError::NotFound("Project not found".to_string()));
///     }
///     Ok(Json(json!({ "ok": true })))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use planboard_shared::auth::{
    authorization::AuthzError, jwt::JwtError, middleware::AuthError, password::PasswordError,
};
use planboard_shared::models::team_member::MembershipError;
use serde::{Deserialize, Serialize};
use sqlx::error::ErrorKind;
use std::fmt;

use crate::storage::StorageError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. duplicate email or last team PM
    Conflict(String),

    /// Payload too large (413)
    PayloadTooLarge(String),

    /// Unsupported media type (415)
    UnsupportedMediaType(String),

    /// Unprocessable entity (422), validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    pub fn not_found(entity: &str) -> Self {
        ApiError::NotFound(format!("{} not found", entity))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::UnsupportedMediaType(msg) => write!(f, "Unsupported media type: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::PayloadTooLarge(msg) => ("payload_too_large", msg, None),
            ApiError::UnsupportedMediaType(msg) => ("unsupported_media_type", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Details stay in the log
                tracing::error!("Internal error: {}", msg);
                (
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg, None),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Converts `validator` errors into a 422 response
pub fn validation_error(errors: validator::ValidationErrors) -> ApiError {
    let mut details: Vec<ValidationErrorDetail> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                ValidationErrorDetail::new(
                    field.to_string(),
                    error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                )
            })
        })
        .collect();

    details.sort_by(|a, b| a.field.cmp(&b.field));
    ApiError::ValidationError(details)
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().unwrap_or_default().to_string();

                match db_err.kind() {
                    ErrorKind::UniqueViolation => {
                        if constraint.contains("email") {
                            ApiError::Conflict("Email already exists".to_string())
                        } else {
                            ApiError::Conflict(format!("Constraint violation: {}", constraint))
                        }
                    }
                    ErrorKind::ForeignKeyViolation => ApiError::BadRequest(format!(
                        "Referenced entity does not exist ({})",
                        constraint
                    )),
                    ErrorKind::CheckViolation => {
                        ApiError::BadRequest(format!("Constraint violation: {}", constraint))
                    }
                    _ => ApiError::InternalError(format!("Database error: {}", db_err)),
                }
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert auth errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::AdminRequired => ApiError::Forbidden("Admin role required".to_string()),
            AuthzError::NotTeamMember(_) => {
                ApiError::Forbidden("Not a member of this team".to_string())
            }
            AuthzError::InsufficientTeamRole { .. } => {
                ApiError::Forbidden("Insufficient team permissions".to_string())
            }
            AuthzError::NotAuthorized => {
                ApiError::Forbidden("Not authorized to access this resource".to_string())
            }
            AuthzError::DatabaseError(err) => err.into(),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Weak(msg) => {
                ApiError::ValidationError(vec![ValidationErrorDetail::new("password", msg)])
            }
            other => ApiError::InternalError(format!("Password operation failed: {}", other)),
        }
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Signing(msg) => ApiError::InternalError(msg),
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::Revoked => ApiError::Unauthorized("Token has been revoked".to_string()),
            other => ApiError::Unauthorized(format!("Invalid token: {}", other)),
        }
    }
}

/// Convert team membership errors to API errors
impl From<MembershipError> for ApiError {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::NotMember { .. } => ApiError::NotFound(err.to_string()),
            MembershipError::AlreadyMember { .. } => ApiError::Conflict(err.to_string()),
            MembershipError::UserNotFound(_) | MembershipError::TeamNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            MembershipError::LastProjectManager(_) => ApiError::Conflict(err.to_string()),
            MembershipError::DatabaseError(err) => err.into(),
        }
    }
}

/// Convert storage errors to API errors
impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotConfigured => ApiError::ServiceUnavailable(err.to_string()),
            StorageError::Upload(msg) => ApiError::InternalError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use validator::Validate;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        assert_eq!(ApiError::not_found("Task").to_string(), "Not found: Task not found");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::ValidationError(vec![]).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::PayloadTooLarge("big".to_string()).into_response().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::InternalError("boom".to_string()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_membership_errors() {
        let team_id = Uuid::new_v4();

        let err: ApiError = MembershipError::LastProjectManager(team_id).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = MembershipError::AlreadyMember {
            team_id,
            user_id: Uuid::new_v4(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = MembershipError::UserNotFound(Uuid::new_v4()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_authz_errors_are_forbidden() {
        let err: ApiError = AuthzError::AdminRequired.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err: ApiError = AuthzError::NotAuthorized.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_weak_password_is_validation_error() {
        let err: ApiError = PasswordError::Weak("too short".to_string()).into();
        match err {
            ApiError::ValidationError(details) => {
                assert_eq!(details, vec![ValidationErrorDetail::new("password", "too short")]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_storage_not_configured_is_503() {
        let err: ApiError = StorageError::NotConfigured.into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "Name is required"))]
        name: String,

        #[validate(email(message = "Invalid email format"))]
        email: String,
    }

    #[test]
    fn test_validation_error_helper() {
        let sample = Sample {
            name: String::new(),
            email: "nope".to_string(),
        };

        match validation_error(sample.validate().unwrap_err()) {
            ApiError::ValidationError(details) => {
                assert_eq!(
                    details,
                    vec![
                        ValidationErrorDetail::new("email", "Invalid email format"),
                        ValidationErrorDetail::new("name", "Name is required"),
                    ]
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
