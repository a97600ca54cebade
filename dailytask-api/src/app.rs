/// Application state and router builder
///
/// This module defines the shared application state and builds the Axum
/// router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use dailytask_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::from_config(pool, config).await?;
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::{AuthProviderConfig, Config, StorageBackendConfig},
    middleware::{error_detail::attach_error_detail, security::SecurityHeadersLayer},
    routes,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use dailytask_shared::{
    auth::{
        identity::FirebaseVerifier,
        middleware::{require_auth, AuthGate, AuthStrategy},
    },
    storage::{CloudinaryStorage, LocalDiskStorage, StorageBackend, UploadPolicy},
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into every handler through Axum's `State` extractor; every field is
/// cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,

    /// Request authentication for the configured provider
    pub gate: AuthGate,

    pub storage: Arc<dyn StorageBackend>,
    pub upload_policy: UploadPolicy,
}

impl AppState {
    /// Assembles state from already-built parts
    pub fn new(
        db: PgPool,
        config: Config,
        strategy: AuthStrategy,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        let gate = AuthGate::new(db.clone(), strategy, config.auth.identity_timeout);
        let upload_policy = config.storage.upload_policy();

        Self {
            db,
            config: Arc::new(config),
            gate,
            storage,
            upload_policy,
        }
    }

    /// Builds the auth strategy and storage backend the configuration selects
    pub async fn from_config(db: PgPool, config: Config) -> anyhow::Result<Self> {
        let strategy = match &config.auth.provider {
            AuthProviderConfig::Local { jwt_secret } => AuthStrategy::Local {
                secret: jwt_secret.clone(),
            },
            AuthProviderConfig::Firebase { project_id } => {
                let verifier = FirebaseVerifier::new(project_id.clone(), config.auth.identity_timeout)?;
                AuthStrategy::External(Arc::new(verifier))
            }
        };

        let storage: Arc<dyn StorageBackend> = match &config.storage.backend {
            StorageBackendConfig::Local { upload_dir } => {
                Arc::new(LocalDiskStorage::new(upload_dir.clone()).await?)
            }
            StorageBackendConfig::Cloudinary(cloudinary) => Arc::new(CloudinaryStorage::new(
                cloudinary.clone(),
                config.storage.upload_timeout,
            )?),
        };

        tracing::info!(
            auth = strategy.name(),
            storage = storage.name(),
            "Application state ready"
        );

        Ok(Self::new(db, config, strategy, storage))
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_permissive() {
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
        .max_age(Duration::from_secs(3600))
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET /health
/// ├── GET /uploads/:filename
/// ├── GET /download/:filename                  (auth, task viewers)
/// └── /api
///     ├── /users
///     │   ├── POST /register | /login | /refresh
///     │   ├── GET  /me, POST /complete-profile (auth)
///     │   ├── GET  /                           (admin)
///     │   └── POST /:id/promote | /promote-supporter | /demote | /delete (admin)
///     ├── /tasks                               (auth)
///     │   ├── POST   /submit
///     │   ├── GET    /my-tasks/:email | /all | /stats | /:id
///     │   ├── PATCH  /:id/status
///     │   ├── POST   /:id/approve | /:id/reject | /:id/revert
///     │   └── DELETE /:id
///     └── /comments/:id                        (auth)
///         └── GET | POST (task id), PUT | DELETE (comment id)
/// ```
///
/// Role checks happen in the services, so "(admin)" routes only need the
/// authentication layer here.
pub fn build_router(state: AppState) -> Router {
    let auth_layer = from_fn_with_state(state.gate.clone(), require_auth);

    let public_user_routes = Router::new()
        .route("/register", post(routes::users::register))
        .route("/login", post(routes::users::login))
        .route("/refresh", post(routes::users::refresh));

    let user_routes = Router::new()
        .route("/", get(routes::users::list_users))
        .route("/me", get(routes::users::me))
        .route("/complete-profile", post(routes::users::complete_profile))
        .route("/:id/promote", post(routes::users::promote))
        .route("/:id/promote-supporter", post(routes::users::promote_supporter))
        .route("/:id/demote", post(routes::users::demote))
        .route("/:id/delete", post(routes::users::delete_user))
        .route_layer(auth_layer.clone())
        .merge(public_user_routes);

    let task_routes = Router::new()
        .route("/submit", post(routes::tasks::submit))
        .route("/my-tasks/:email", get(routes::tasks::my_tasks))
        .route("/all", get(routes::tasks::all_tasks))
        .route("/stats", get(routes::tasks::task_stats))
        .route(
            "/:id",
            get(routes::tasks::get_task).delete(routes::tasks::delete_task),
        )
        .route("/:id/status", patch(routes::tasks::update_status))
        .route("/:id/approve", post(routes::tasks::approve))
        .route("/:id/reject", post(routes::tasks::reject))
        .route("/:id/revert", post(routes::tasks::revert))
        .route_layer(auth_layer.clone());

    let comment_routes = Router::new()
        .route(
            "/:id",
            get(routes::comments::list_comments)
                .post(routes::comments::add_comment)
                .put(routes::comments::update_comment)
                .delete(routes::comments::delete_comment),
        )
        .route_layer(auth_layer.clone());

    let file_routes = Router::new()
        .route("/download/:filename", get(routes::files::download))
        .route_layer(auth_layer)
        .route("/uploads/:filename", get(routes::files::serve_upload));

    let api_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/tasks", task_routes)
        .nest("/comments", comment_routes);

    let mut router = Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(file_routes)
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(state.config.storage.body_limit()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    if !state.config.api.production {
        router = router.layer(from_fn(attach_error_detail));
    }

    router
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
