//! Router tests that need no database
//!
//! Every request here is answered by a guard, a validation step or the
//! gateway handshake check before any query runs.

mod common;

use axum::http::StatusCode;
use common::{access_token, lazy_state, request, send, token};
use planboard_api::app::build_router;
use planboard_shared::auth::jwt::TokenType;
use planboard_shared::models::user::UserRole;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = build_router(lazy_state());

    for uri in ["/v1/projects", "/v1/tasks", "/v1/teams", "/v1/auth/me"] {
        let (status, body) = send(&app, request("GET", uri, None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error"], "unauthorized");
    }
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let app = build_router(lazy_state());

    let (status, _) = send(&app, request("GET", "/v1/projects", Some("not-a-jwt"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let app = build_router(lazy_state());
    let refresh = token(Uuid::new_v4(), UserRole::User, TokenType::Refresh);

    let (status, _) = send(&app, request("GET", "/v1/projects", Some(&refresh), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_revoked_token_is_unauthorized() {
    let state = lazy_state();
    let app = build_router(state.clone());
    let token = access_token(Uuid::new_v4(), UserRole::User);

    state
        .blacklist
        .revoke(&token, chrono::Utc::now().timestamp() + 3600)
        .await;

    let (status, body) = send(&app, request("GET", "/v1/projects", Some(&token), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].as_str().unwrap().contains("revoked"));
}

#[tokio::test]
async fn test_logout_revokes_access_and_refresh_tokens() {
    let app = build_router(lazy_state());
    let user_id = Uuid::new_v4();
    let access = access_token(user_id, UserRole::User);
    let refresh = token(user_id, UserRole::User, TokenType::Refresh);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/v1/auth/logout",
            Some(&access),
            Some(json!({ "refresh_token": refresh })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, request("GET", "/v1/auth/me", Some(&access), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = build_router(lazy_state());
    let access = access_token(Uuid::new_v4(), UserRole::User);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": access })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_reject_regular_users() {
    let app = build_router(lazy_state());
    let user = access_token(Uuid::new_v4(), UserRole::User);

    let (status, body) = send(&app, request("GET", "/v1/users", Some(&user), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = send(&app, request("GET", "/v1/activity-logs", Some(&user), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/v1/users",
            Some(&user),
            Some(json!({ "email": "new@example.com", "password": "Planb0ard!" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/v1/notifications",
            Some(&user),
            Some(json!({ "user_id": Uuid::new_v4(), "title": "Hi", "message": "There" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_users_cannot_touch_other_accounts() {
    let app = build_router(lazy_state());
    let user = access_token(Uuid::new_v4(), UserRole::User);
    let other = format!("/v1/users/{}", Uuid::new_v4());

    let (status, _) = send(&app, request("GET", &other, Some(&user), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request("PATCH", &other, Some(&user), Some(json!({ "name": "Mallory" }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_change_requires_admin() {
    let app = build_router(lazy_state());
    let user_id = Uuid::new_v4();
    let user = access_token(user_id, UserRole::User);

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/v1/users/{}", user_id),
            Some(&user),
            Some(json!({ "role": "admin" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let app = build_router(lazy_state());
    let admin_id = Uuid::new_v4();
    let admin = access_token(admin_id, UserRole::Admin);

    let (status, _) = send(
        &app,
        request("DELETE", &format!("/v1/users/{}", admin_id), Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_validation() {
    let app = build_router(lazy_state());

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({ "email": "not-an-email", "password": "Planb0ard!" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "email");

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({ "email": "jane@example.com", "password": "password" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "password");
}

#[tokio::test]
async fn test_date_ordering_is_checked() {
    let app = build_router(lazy_state());
    let user = access_token(Uuid::new_v4(), UserRole::User);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/v1/projects",
            Some(&user),
            Some(json!({
                "name": "Launch",
                "start_date": "2025-03-10",
                "due_date": "2025-03-01"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/v1/events",
            Some(&user),
            Some(json!({
                "title": "Standup",
                "starts_at": "2025-03-10T10:00:00Z",
                "ends_at": "2025-03-10T09:00:00Z"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subtask_list_requires_task_id() {
    let app = build_router(lazy_state());
    let user = access_token(Uuid::new_v4(), UserRole::User);

    let (status, _) = send(&app, request("GET", "/v1/subtasks", Some(&user), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_avatar_upload_checks() {
    let app = build_router(lazy_state());
    let user_id = Uuid::new_v4();
    let user = access_token(user_id, UserRole::User);
    let uri = format!("/v1/users/{}/avatar", user_id);

    let upload = |content_type: &'static str| {
        axum::http::Request::builder()
            .method("PUT")
            .uri(&uri)
            .header("authorization", format!("Bearer {}", user))
            .header("content-type", content_type)
            .body(axum::body::Body::from(vec![0u8; 16]))
            .unwrap()
    };

    let (status, _) = send(&app, upload("text/plain")).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    // lazy_state has no object storage configured
    let (status, body) = send(&app, upload("image/png")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "service_unavailable");
}

#[tokio::test]
async fn test_gateways_authenticate_before_upgrade() {
    let state = lazy_state();
    let app = build_router(state.clone());

    for path in ["/ws/activity-logs", "/ws/notifications"] {
        let (status, _) = send(&app, request("GET", path, None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", path);

        let (status, _) = send(
            &app,
            request("GET", &format!("{}?token=garbage", path), None, None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", path);
    }

    let token = access_token(Uuid::new_v4(), UserRole::User);
    state
        .blacklist
        .revoke(&token, chrono::Utc::now().timestamp() + 3600)
        .await;
    let (status, _) = send(
        &app,
        request("GET", &format!("/ws/notifications?token={}", token), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Valid token but no upgrade headers
    let token = access_token(Uuid::new_v4(), UserRole::User);
    let (status, _) = send(
        &app,
        request("GET", &format!("/ws/notifications?token={}", token), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_degraded_without_database() {
    let app = build_router(lazy_state());

    let (status, body) = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let app = build_router(lazy_state());

    let response = tower::ServiceExt::oneshot(app, request("GET", "/v1/projects", None, None))
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert!(response.headers().get("content-security-policy").is_some());
}
