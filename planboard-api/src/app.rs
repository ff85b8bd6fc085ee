/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use planboard_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = planboard_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    mail::{Mailer, SmtpMailer},
    middleware::security::{security_headers, SecurityHeaders},
    realtime::{gateway, Realtime},
    routes,
    storage::{ObjectStore, S3Store, StorageError},
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, patch, post, put},
    Router,
};
use planboard_shared::auth::{
    blacklist::TokenBlacklist,
    middleware::{jwt_auth_middleware, JwtGuard},
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; every
/// field is a handle to shared data.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Revoked tokens
    pub blacklist: TokenBlacklist,

    /// Gateway connection hubs
    pub realtime: Realtime,

    /// Avatar storage, None when not configured
    pub storage: Option<Arc<dyn ObjectStore>>,

    /// Notification mail, None when not configured
    pub mailer: Option<Arc<dyn Mailer>>,
}

impl AppState {
    /// Creates application state; object storage and mail are built from config
    pub fn new(db: PgPool, config: Config) -> Self {
        let storage = config
            .storage
            .as_ref()
            .map(|storage| Arc::new(S3Store::new(storage)) as Arc<dyn ObjectStore>);

        let mailer = config.smtp.as_ref().and_then(|smtp| match SmtpMailer::new(smtp) {
            Ok(mailer) => Some(Arc::new(mailer) as Arc<dyn Mailer>),
            Err(e) => {
                tracing::warn!(error = %e, host = %smtp.host, "Mail disabled");
                None
            }
        });

        Self {
            db,
            config: Arc::new(config),
            blacklist: TokenBlacklist::new(),
            realtime: Realtime::new(),
            storage,
            mailer,
        }
    }

    /// Replaces the object store
    pub fn with_storage(mut self, storage: Arc<dyn ObjectStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Replaces the mailer
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn object_store(&self) -> Result<&dyn ObjectStore, StorageError> {
        self.storage.as_deref().ok_or(StorageError::NotConfigured)
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                          # public
/// ├── /ws/activity-logs?token=             # gateway, token in query
/// ├── /ws/notifications?token=             # gateway, token in query
/// └── /v1/
///     ├── /auth/{register,login,refresh}   # public
///     ├── /auth/{logout,me}                # JWT
///     ├── /users[/:id[/avatar]]            # JWT
///     ├── /projects[/:id]                  # JWT
///     ├── /tasks[/:id]                     # JWT
///     ├── /subtasks[/:id]                  # JWT
///     ├── /events[/:id]                    # JWT
///     ├── /teams[/:id[/members[/:user_id]]]  # JWT
///     ├── /activity-logs[/:id]             # JWT, admin
///     └── /notifications[...]              # JWT
/// ```
///
/// Updates accept both PATCH and PUT; both apply a partial update.
pub fn build_router(state: AppState) -> Router {
    let guard = JwtGuard::new(state.config.jwt.secret.as_str(), state.blacklist.clone());
    let jwt_layer = axum::middleware::from_fn_with_state(guard, jwt_auth_middleware);

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let gateway_routes = Router::new()
        .route("/activity-logs", get(gateway::activity_logs_ws))
        .route("/notifications", get(gateway::notifications_ws));

    let public_auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let session_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/me", get(routes::auth::me))
        .layer(jwt_layer.clone());

    let user_routes = Router::new()
        .route(
            "/",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/:id",
            get(routes::users::get_user)
                .patch(routes::users::update_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route(
            "/:id/avatar",
            put(routes::users::upload_avatar).layer(DefaultBodyLimit::max(
                state.config.uploads.avatar_max_bytes,
            )),
        );

    let project_routes = Router::new()
        .route(
            "/",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/:id",
            get(routes::projects::get_project)
                .patch(routes::projects::update_project)
                .put(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        );

    let task_routes = Router::new()
        .route(
            "/",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        );

    let subtask_routes = Router::new()
        .route(
            "/",
            get(routes::subtasks::list_subtasks).post(routes::subtasks::create_subtask),
        )
        .route(
            "/:id",
            get(routes::subtasks::get_subtask)
                .patch(routes::subtasks::update_subtask)
                .put(routes::subtasks::update_subtask)
                .delete(routes::subtasks::delete_subtask),
        );

    let event_routes = Router::new()
        .route(
            "/",
            get(routes::events::list_events).post(routes::events::create_event),
        )
        .route(
            "/:id",
            get(routes::events::get_event)
                .patch(routes::events::update_event)
                .put(routes::events::update_event)
                .delete(routes::events::delete_event),
        );

    let team_routes = Router::new()
        .route(
            "/",
            get(routes::teams::list_teams).post(routes::teams::create_team),
        )
        .route(
            "/:id",
            get(routes::teams::get_team)
                .patch(routes::teams::update_team)
                .put(routes::teams::update_team)
                .delete(routes::teams::delete_team),
        )
        .route(
            "/:id/members",
            get(routes::members::list_members).post(routes::members::add_member),
        )
        .route(
            "/:id/members/:user_id",
            patch(routes::members::change_member_role)
                .put(routes::members::change_member_role)
                .delete(routes::members::remove_member),
        );

    let activity_routes = Router::new()
        .route("/", get(routes::activity_logs::list_activity_logs))
        .route("/:id", get(routes::activity_logs::get_activity_log));

    let notification_routes = Router::new()
        .route(
            "/",
            get(routes::notifications::list_notifications)
                .post(routes::notifications::create_notification),
        )
        .route("/read-all", post(routes::notifications::mark_all_read))
        .route("/unread-count", get(routes::notifications::unread_count))
        .route(
            "/:id",
            get(routes::notifications::get_notification)
                .patch(routes::notifications::update_notification)
                .put(routes::notifications::update_notification)
                .delete(routes::notifications::delete_notification),
        );

    let protected_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/projects", project_routes)
        .nest("/tasks", task_routes)
        .nest("/subtasks", subtask_routes)
        .nest("/events", event_routes)
        .nest("/teams", team_routes)
        .nest("/activity-logs", activity_routes)
        .nest("/notifications", notification_routes)
        .layer(jwt_layer);

    let v1_routes = Router::new()
        .nest("/auth", public_auth_routes.merge(session_routes))
        .merge(protected_routes);

    Router::new()
        .merge(health_routes)
        .nest("/ws", gateway_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(axum::middleware::from_fn_with_state(
            SecurityHeaders::new(state.config.api.production),
            security_headers,
        ))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_is_permissive() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
