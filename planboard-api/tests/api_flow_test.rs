//! End-to-end API flows against a real database
//!
//! Requires `DATABASE_URL` pointing at a PostgreSQL instance the tests may
//! write to. Run with `cargo test -p planboard-api -- --ignored`.

mod common;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use bytes::Bytes;
use common::{request, send, TestContext, TEST_PASSWORD, TEST_SECRET};
use planboard_api::{
    mail::{MailError, Mailer},
    storage::{ObjectStore, StorageError},
};
use planboard_shared::auth::jwt::validate_access_token;
use planboard_shared::models::{
    activity_log::{ActivityLog, ActivityLogFilter, EntityType},
    user::UserRole,
    Pagination,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Keeps uploads in memory and serves them from a fixed base URL
#[derive(Default)]
struct MemoryStore {
    objects: Mutex<Vec<(String, String, usize)>>,
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .push((key.to_string(), content_type.to_string(), body.len()));
        Ok(format!("https://cdn.test/{}", key))
    }
}

/// Records outgoing mail instead of sending it
#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_login_and_me() {
    let ctx = TestContext::new().await.unwrap();
    let (user, _) = ctx.create_user(UserRole::User).await.unwrap();

    let (status, _) = send(
        &ctx.app,
        request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": user.email, "password": "Wrong-passw0rd" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &ctx.app,
        request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": user.email.to_uppercase(), "password": TEST_PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["user"].get("password_hash").is_none());

    let access = body["access_token"].as_str().unwrap().to_string();
    let (status, me) = send(&ctx.app, request("GET", "/v1/auth/me", Some(&access), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user.id.to_string());
    assert!(!me["last_login_at"].is_null());

    ctx.cleanup_users(&[&user]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_duplicate_email_conflicts() {
    let ctx = TestContext::new().await.unwrap();
    let (user, _) = ctx.create_user(UserRole::User).await.unwrap();

    let (status, body) = send(
        &ctx.app,
        request(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({ "email": user.email, "password": TEST_PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already exists");

    ctx.cleanup_users(&[&user]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_project_and_task_lifecycle() {
    let ctx = TestContext::new().await.unwrap();
    let (owner, owner_token) = ctx.create_user(UserRole::User).await.unwrap();
    let (worker, worker_token) = ctx.create_user(UserRole::User).await.unwrap();
    let (_, mut worker_inbox) = ctx
        .state
        .realtime
        .notifications
        .register(worker.id, false)
        .await;

    let (status, project) = send(
        &ctx.app,
        request(
            "POST",
            "/v1/projects",
            Some(&owner_token),
            Some(json!({ "name": "Launch", "status": "active" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let project_uri = format!("/v1/projects/{}", project["id"].as_str().unwrap());

    // Not visible to an outsider
    let (status, _) = send(&ctx.app, request("GET", &project_uri, Some(&worker_token), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, task) = send(
        &ctx.app,
        request(
            "POST",
            "/v1/tasks",
            Some(&owner_token),
            Some(json!({
                "project_id": project["id"],
                "title": "Write release notes",
                "assignee_id": worker.id,
                "priority": "high"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let task_uri = format!("/v1/tasks/{}", task["id"].as_str().unwrap());

    let frame: serde_json::Value =
        serde_json::from_str(&worker_inbox.recv().await.unwrap()).unwrap();
    assert_eq!(frame["event"], "notification");
    assert_eq!(frame["data"]["kind"], "task_assigned");

    // Assignee may move status but nothing else
    let (status, updated) = send(
        &ctx.app,
        request("PATCH", &task_uri, Some(&worker_token), Some(json!({ "status": "in_progress" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "in_progress");

    let (status, _) = send(
        &ctx.app,
        request("PATCH", &task_uri, Some(&worker_token), Some(json!({ "title": "Mine now" }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Assignee works the checklist
    let (status, subtask) = send(
        &ctx.app,
        request(
            "POST",
            "/v1/subtasks",
            Some(&worker_token),
            Some(json!({ "task_id": task["id"], "title": "Draft" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(subtask["position"], 0);

    let (status, list) = send(
        &ctx.app,
        request(
            "GET",
            &format!("/v1/subtasks?task_id={}", task["id"].as_str().unwrap()),
            Some(&worker_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);
    assert_eq!(list["completed"], 0);

    // Delete cascades; get answers 404
    let (status, _) = send(&ctx.app, request("DELETE", &project_uri, Some(&owner_token), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&ctx.app, request("GET", &task_uri, Some(&owner_token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let logs = ActivityLog::list(
        &ctx.db,
        ActivityLogFilter {
            user_id: Some(owner.id),
            entity_type: Some(EntityType::Project),
            entity_id: None,
        },
        Pagination::default(),
    )
    .await
    .unwrap();
    assert_eq!(logs.len(), 2);

    ctx.cleanup_users(&[&owner, &worker]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_team_keeps_a_project_manager() {
    let ctx = TestContext::new().await.unwrap();
    let (pm, pm_token) = ctx.create_user(UserRole::User).await.unwrap();
    let (member, member_token) = ctx.create_user(UserRole::User).await.unwrap();

    let (status, team) = send(
        &ctx.app,
        request("POST", "/v1/teams", Some(&pm_token), Some(json!({ "name": "Core" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let members_uri = format!("/v1/teams/{}/members", team["id"].as_str().unwrap());

    let (status, _) = send(
        &ctx.app,
        request("POST", &members_uri, Some(&pm_token), Some(json!({ "user_id": member.id }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &ctx.app,
        request("POST", &members_uri, Some(&pm_token), Some(json!({ "user_id": member.id }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Members cannot manage membership
    let (status, _) = send(
        &ctx.app,
        request(
            "PATCH",
            &format!("{}/{}", members_uri, member.id),
            Some(&member_token),
            Some(json!({ "role": "pm" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The only pm can neither step down nor leave
    let pm_uri = format!("{}/{}", members_uri, pm.id);
    let (status, _) = send(
        &ctx.app,
        request("PATCH", &pm_uri, Some(&pm_token), Some(json!({ "role": "member" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&ctx.app, request("DELETE", &pm_uri, Some(&pm_token), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // After promoting someone else, they can
    let (status, _) = send(
        &ctx.app,
        request(
            "PUT",
            &format!("{}/{}", members_uri, member.id),
            Some(&pm_token),
            Some(json!({ "role": "pm" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&ctx.app, request("DELETE", &pm_uri, Some(&pm_token), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, count) = send(
        &ctx.app,
        request("GET", "/v1/notifications/unread-count", Some(&member_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count["count"], 2);

    let (status, _) = send(
        &ctx.app,
        request("DELETE", &format!("/v1/teams/{}", team["id"].as_str().unwrap()), Some(&member_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    ctx.cleanup_users(&[&pm, &member]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_activity_logs_are_admin_only_and_pushed() {
    let ctx = TestContext::new().await.unwrap();
    let (admin, admin_token) = ctx.create_user(UserRole::Admin).await.unwrap();
    let (user, user_token) = ctx.create_user(UserRole::User).await.unwrap();
    let (_, mut admin_feed) = ctx.state.realtime.activity.register(admin.id, true).await;

    let (status, team) = send(
        &ctx.app,
        request("POST", "/v1/teams", Some(&user_token), Some(json!({ "name": "Ops" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let frame: serde_json::Value = serde_json::from_str(&admin_feed.recv().await.unwrap()).unwrap();
    assert_eq!(frame["event"], "activityLog");
    assert_eq!(frame["data"]["entity_id"], team["id"]);

    let uri = format!("/v1/activity-logs?entity_id={}", team["id"].as_str().unwrap());
    let (status, _) = send(&ctx.app, request("GET", &uri, Some(&user_token), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, logs) = send(&ctx.app, request("GET", &uri, Some(&admin_token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs.as_array().unwrap().len(), 1);
    assert_eq!(logs[0]["action"], "create");

    ctx.cleanup_users(&[&admin, &user]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_refresh_reflects_current_role_and_existence() {
    let ctx = TestContext::new().await.unwrap();
    let (admin, admin_token) = ctx.create_user(UserRole::Admin).await.unwrap();
    let (target, _) = ctx.create_user(UserRole::Admin).await.unwrap();

    let (status, session) = send(
        &ctx.app,
        request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": target.email, "password": TEST_PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let refresh_body = json!({ "refresh_token": session["refresh_token"] });

    let target_uri = format!("/v1/users/{}", target.id);
    let (status, _) = send(
        &ctx.app,
        request("PATCH", &target_uri, Some(&admin_token), Some(json!({ "role": "user" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The refresh token still says admin; the new access token must not
    let (status, body) = send(
        &ctx.app,
        request("POST", "/v1/auth/refresh", None, Some(refresh_body.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access_token"].as_str().unwrap().to_string();
    let claims = validate_access_token(&access, TEST_SECRET).unwrap();
    assert_eq!(claims.sub, target.id);
    assert_eq!(claims.role, UserRole::User);

    let (status, _) = send(&ctx.app, request("GET", "/v1/users", Some(&access), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&ctx.app, request("DELETE", &target_uri, Some(&admin_token), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &ctx.app,
        request("POST", "/v1/auth/refresh", None, Some(refresh_body)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    ctx.cleanup_users(&[&admin]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_deleting_a_teams_only_pm_conflicts() {
    let ctx = TestContext::new().await.unwrap();
    let (admin, admin_token) = ctx.create_user(UserRole::Admin).await.unwrap();
    let (pm, pm_token) = ctx.create_user(UserRole::User).await.unwrap();
    let (member, _) = ctx.create_user(UserRole::User).await.unwrap();

    let (status, team) = send(
        &ctx.app,
        request("POST", "/v1/teams", Some(&pm_token), Some(json!({ "name": "Infra" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let members_uri = format!("/v1/teams/{}/members", team["id"].as_str().unwrap());

    let (status, _) = send(
        &ctx.app,
        request("POST", &members_uri, Some(&pm_token), Some(json!({ "user_id": member.id }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let pm_uri = format!("/v1/users/{}", pm.id);
    let (status, _) = send(&ctx.app, request("DELETE", &pm_uri, Some(&admin_token), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&ctx.app, request("GET", &pm_uri, Some(&admin_token), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &ctx.app,
        request(
            "PATCH",
            &format!("{}/{}", members_uri, member.id),
            Some(&pm_token),
            Some(json!({ "role": "pm" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&ctx.app, request("DELETE", &pm_uri, Some(&admin_token), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, members) = send(&ctx.app, request("GET", &members_uri, Some(&admin_token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members.as_array().unwrap().len(), 1);

    ctx.cleanup_users(&[&admin, &member]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_avatar_upload_stores_object_and_sets_url() {
    let ctx = TestContext::new().await.unwrap();
    let (user, token) = ctx.create_user(UserRole::User).await.unwrap();
    let store = Arc::new(MemoryStore::default());
    let (_, app) = ctx.app_with(|state| state.with_storage(store.clone()));

    let upload = Request::builder()
        .method("PUT")
        .uri(format!("/v1/users/{}/avatar", user.id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "image/png")
        .body(Body::from(vec![0x89, b'P', b'N', b'G', 0, 1, 2, 3]))
        .unwrap();

    let (status, body) = send(&app, upload).await;
    assert_eq!(status, StatusCode::OK);

    let url = body["avatar_url"].as_str().unwrap();
    assert!(url.starts_with(&format!("https://cdn.test/avatars/{}/", user.id)));
    assert!(url.ends_with(".png"));

    let objects = store.objects.lock().unwrap().clone();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].1, "image/png");
    assert_eq!(objects[0].2, 8);
    assert_eq!(url, format!("https://cdn.test/{}", objects[0].0));

    let (_, me) = send(&app, request("GET", "/v1/auth/me", Some(&token), None)).await;
    assert_eq!(me["avatar_url"], url);

    ctx.cleanup_users(&[&user]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_team_invitation_is_pushed_and_mailed() {
    let ctx = TestContext::new().await.unwrap();
    let (pm, pm_token) = ctx.create_user(UserRole::User).await.unwrap();
    let (invitee, _) = ctx.create_user(UserRole::User).await.unwrap();
    let outbox = Arc::new(Outbox::default());
    let (state, app) = ctx.app_with(|state| state.with_mailer(outbox.clone()));
    let (_, mut inbox) = state.realtime.notifications.register(invitee.id, false).await;

    let (status, team) = send(
        &app,
        request("POST", "/v1/teams", Some(&pm_token), Some(json!({ "name": "Mobile" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        request(
            "POST",
            &format!("/v1/teams/{}/members", team["id"].as_str().unwrap()),
            Some(&pm_token),
            Some(json!({ "user_id": invitee.id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let frame: serde_json::Value = serde_json::from_str(&inbox.recv().await.unwrap()).unwrap();
    assert_eq!(frame["event"], "notification");
    assert_eq!(frame["data"]["kind"], "team_invitation");
    assert_eq!(frame["data"]["user_id"], invitee.id.to_string());

    let sent = outbox.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, invitee.email);
    assert_eq!(sent[0].1, "[Planboard] Added to team");

    ctx.cleanup_users(&[&pm, &invitee]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_event_lifecycle() {
    let ctx = TestContext::new().await.unwrap();
    let (owner, owner_token) = ctx.create_user(UserRole::User).await.unwrap();
    let (other, other_token) = ctx.create_user(UserRole::User).await.unwrap();

    let (status, _) = send(
        &ctx.app,
        request(
            "POST",
            "/v1/events",
            Some(&owner_token),
            Some(json!({
                "title": "Backwards",
                "starts_at": "2026-03-02T10:00:00Z",
                "ends_at": "2026-03-02T09:00:00Z"
            })),
        ),
    )
    .await;
    assert!(status.is_client_error());

    let (status, event) = send(
        &ctx.app,
        request(
            "POST",
            "/v1/events",
            Some(&owner_token),
            Some(json!({
                "title": "Sprint review",
                "location": "Room 4",
                "starts_at": "2026-03-02T10:00:00Z",
                "ends_at": "2026-03-02T11:00:00Z"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(event["user_id"], owner.id.to_string());
    let event_uri = format!("/v1/events/{}", event["id"].as_str().unwrap());

    let (status, fetched) = send(&ctx.app, request("GET", &event_uri, Some(&owner_token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "Sprint review");
    assert_eq!(fetched["location"], "Room 4");

    let (status, _) = send(&ctx.app, request("GET", &event_uri, Some(&other_token), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&ctx.app, request("DELETE", &event_uri, Some(&other_token), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&ctx.app, request("DELETE", &event_uri, Some(&owner_token), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&ctx.app, request("GET", &event_uri, Some(&owner_token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup_users(&[&owner, &other]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn test_team_member_views_but_cannot_modify_project() {
    let ctx = TestContext::new().await.unwrap();
    let (pm, pm_token) = ctx.create_user(UserRole::User).await.unwrap();
    let (member, member_token) = ctx.create_user(UserRole::User).await.unwrap();

    let (_, team) = send(
        &ctx.app,
        request("POST", "/v1/teams", Some(&pm_token), Some(json!({ "name": "Design" }))),
    )
    .await;
    let (status, _) = send(
        &ctx.app,
        request(
            "POST",
            &format!("/v1/teams/{}/members", team["id"].as_str().unwrap()),
            Some(&pm_token),
            Some(json!({ "user_id": member.id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, project) = send(
        &ctx.app,
        request(
            "POST",
            "/v1/projects",
            Some(&pm_token),
            Some(json!({ "name": "Rebrand", "team_id": team["id"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let project_uri = format!("/v1/projects/{}", project["id"].as_str().unwrap());

    let (status, seen) = send(&ctx.app, request("GET", &project_uri, Some(&member_token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seen["name"], "Rebrand");

    let (status, _) = send(
        &ctx.app,
        request("PATCH", &project_uri, Some(&member_token), Some(json!({ "name": "Mine" }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&ctx.app, request("DELETE", &project_uri, Some(&member_token), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Being the assignee only unlocks the status field
    let (status, task) = send(
        &ctx.app,
        request(
            "POST",
            "/v1/tasks",
            Some(&pm_token),
            Some(json!({ "project_id": project["id"], "title": "Logo", "assignee_id": member.id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let task_uri = format!("/v1/tasks/{}", task["id"].as_str().unwrap());

    let (status, moved) = send(
        &ctx.app,
        request("PATCH", &task_uri, Some(&member_token), Some(json!({ "status": "done" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["status"], "done");

    let (status, _) = send(
        &ctx.app,
        request("PATCH", &task_uri, Some(&member_token), Some(json!({ "priority": "urgent" }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&ctx.app, request("DELETE", &project_uri, Some(&pm_token), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    ctx.cleanup_users(&[&pm, &member]).await.unwrap();
}
