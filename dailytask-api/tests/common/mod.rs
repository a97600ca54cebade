//! Common test utilities for integration tests
//!
//! These tests need PostgreSQL. Set `DATABASE_URL` to run them; without it
//! every test returns early.
//!
//! - Test database setup (migrations)
//! - Test user creation with a chosen role
//! - JWT token generation
//! - Request helpers for JSON and multipart bodies

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use dailytask_api::app::{build_router, AppState};
use dailytask_api::config::{
    ApiConfig, AuthConfig, AuthProviderConfig, Config, DatabaseConfig, StorageBackendConfig,
    StorageConfig,
};
use dailytask_shared::auth::jwt::issue_token_pair;
use dailytask_shared::auth::middleware::AuthStrategy;
use dailytask_shared::auth::password::hash_password;
use dailytask_shared::db::migrations::run_migrations;
use dailytask_shared::models::user::{CreateUser, User, UserRole};
use dailytask_shared::storage::LocalDiskStorage;
use serde_json::Value;
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const PASSWORD: &str = "pw123";
pub const BOUNDARY: &str = "dailytask-test-boundary";

/// A signed-in test user
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestUser {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
}

pub fn test_config(database_url: String, max_file_size: usize) -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            production: false,
            cors_origins: vec!["*".to_string()],
        },
        database: DatabaseConfig {
            url: database_url,
            max_connections: 5,
        },
        auth: AuthConfig {
            provider: AuthProviderConfig::Local {
                jwt_secret: JWT_SECRET.to_string(),
            },
            identity_timeout: Duration::from_secs(5),
        },
        storage: StorageConfig {
            backend: StorageBackendConfig::Local {
                upload_dir: std::env::temp_dir().join(format!("dailytask-it-{}", Uuid::new_v4())),
            },
            max_file_size,
            max_files_per_task: 5,
            upload_timeout: Duration::from_secs(10),
        },
    }
}

impl TestContext {
    /// `None` when `DATABASE_URL` is not set
    pub async fn new() -> Option<Self> {
        Self::with_max_file_size(5 * 1024 * 1024).await
    }

    pub async fn with_max_file_size(max_file_size: usize) -> Option<Self> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping database-backed test");
            return None;
        };

        let db = PgPool::connect(&url).await.expect("connect to test database");
        run_migrations(&db).await.expect("run migrations");

        let config = test_config(url, max_file_size);
        let StorageBackendConfig::Local { upload_dir } = &config.storage.backend else {
            unreachable!("test config always uses local storage");
        };
        let storage = LocalDiskStorage::new(upload_dir.clone())
            .await
            .expect("create upload dir");

        let state = AppState::new(
            db.clone(),
            config.clone(),
            AuthStrategy::Local {
                secret: JWT_SECRET.to_string(),
            },
            Arc::new(storage),
        );

        Some(Self {
            db,
            app: build_router(state),
            config,
        })
    }

    /// Inserts a user with `role` and returns it with an access token
    pub async fn create_user(&self, role: UserRole) -> TestUser {
        let user = User::create(
            &self.db,
            CreateUser {
                email: format!("{}-{}@example.com", role, Uuid::new_v4()),
                password_hash: Some(hash_password(PASSWORD).expect("hash password")),
                external_id: None,
                name: Some(format!("Test {}", role)),
                role,
                profile_complete: true,
            },
        )
        .await
        .expect("create user");

        let token = issue_token_pair(user.id, &user.email, JWT_SECRET)
            .expect("issue token")
            .token;

        TestUser { user, token }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.expect("router call");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        user: Option<&TestUser>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("authorization", user.bearer());
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        self.send(request).await
    }

    /// Submits a task with the given research text and file parts
    /// `(filename, content_type, bytes)`
    pub async fn submit(
        &self,
        user: &TestUser,
        research: &str,
        files: &[(&str, &str, Vec<u8>)],
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/tasks/submit")
            .header("authorization", user.bearer())
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(research, files)))
            .expect("build request");

        self.send(request).await
    }

    /// Directory the local storage backend writes attachments to
    pub fn upload_dir(&self) -> &Path {
        match &self.config.storage.backend {
            StorageBackendConfig::Local { upload_dir } => upload_dir,
            StorageBackendConfig::Cloudinary(_) => unreachable!("test config always uses local storage"),
        }
    }

    pub async fn comment_count(&self, task_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE task_id = $1")
            .bind(task_id)
            .fetch_one(&self.db)
            .await
            .expect("count comments")
    }

    pub async fn cleanup_users(&self, users: &[&TestUser]) {
        for user in users {
            sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(user.user.id)
                .execute(&self.db)
                .await
                .expect("delete test user");
        }
    }
}

pub fn multipart_body(research: &str, files: &[(&str, &str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();

    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"research\"\r\n\r\n{research}\r\n"
        )
        .as_bytes(),
    );

    for (filename, content_type, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
