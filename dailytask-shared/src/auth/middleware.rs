/// Authentication gate for Axum
///
/// Turns the `Authorization: Bearer <token>` header into an [`AuthContext`]
/// describing the current user, or rejects the request with 401. Which kind of
/// token is accepted is decided once per deployment by [`AuthStrategy`]:
///
/// - **Local**: an HS256 access token issued by this service at login
/// - **External**: an identity-provider token checked by an [`IdentityVerifier`]
///
/// Either way the user row is read from the database on every request, so role
/// changes and deletions take effect immediately. The gate never changes a
/// user's role.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use dailytask_shared::auth::middleware::{require_auth, AuthContext, AuthGate, AuthStrategy};
/// use sqlx::PgPool;
/// use std::time::Duration;
///
/// async fn me(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, {}", auth.email)
/// }
///
/// fn router(pool: PgPool) -> Router {
///     let gate = AuthGate::new(
///         pool,
///         AuthStrategy::Local { secret: "a-secret-key-that-is-at-least-32-bytes".into() },
///         Duration::from_secs(5),
///     );
///
///     Router::new()
///         .route("/me", get(me))
///         .layer(middleware::from_fn_with_state(gate, require_auth))
/// }
/// ```

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::identity::{IdentityError, IdentityVerifier};
use super::jwt::{validate_access_token, JwtError};
use crate::models::user::{emails_match, User, UserRole};

/// How the caller proved who they are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Locally issued JWT
    Local,

    /// Identity-provider token
    External,
}

/// Authenticated caller, attached to request extensions
///
/// Handlers extract it with `Extension<AuthContext>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub user_id: Uuid,

    /// Lower-cased email
    pub email: String,

    pub name: Option<String>,

    pub role: UserRole,

    pub method: AuthMethod,
}

impl AuthContext {
    pub fn from_user(user: &User, method: AuthMethod) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            method,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Supporter or admin
    pub fn is_reviewer(&self) -> bool {
        self.role.is_reviewer()
    }

    /// Case-insensitive comparison against the caller's email
    pub fn has_email(&self, email: &str) -> bool {
        emails_match(&self.email, email)
    }
}

/// Token kind accepted by this deployment
#[derive(Clone)]
pub enum AuthStrategy {
    /// HS256 tokens signed with `secret`
    Local { secret: String },

    /// Tokens verified by an external identity provider
    External(Arc<dyn IdentityVerifier>),
}

impl AuthStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            AuthStrategy::Local { .. } => "local",
            AuthStrategy::External(verifier) => verifier.provider(),
        }
    }

    /// The local signing secret, when tokens are issued by this service
    pub fn local_secret(&self) -> Option<&str> {
        match self {
            AuthStrategy::Local { secret } => Some(secret),
            AuthStrategy::External(_) => None,
        }
    }
}

impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret
        f.debug_tuple("AuthStrategy").field(&self.name()).finish()
    }
}

/// Error type for the authentication gate
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidToken(String),

    /// Token is valid but names no (or a conflicting) local account
    #[error("{0}")]
    UnknownUser(String),

    /// Identity provider timed out or could not be reached
    #[error("{0}")]
    ProviderUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials
            | AuthError::InvalidFormat(_)
            | AuthError::InvalidToken(_)
            | AuthError::UnknownUser(_) => StatusCode::UNAUTHORIZED,
            AuthError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::ProviderUnavailable(_) => "service_unavailable",
            AuthError::DatabaseError(_) => "internal_error",
            _ => "unauthorized",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            AuthError::DatabaseError(detail) => {
                tracing::error!(error = %detail, "Database error during authentication");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (
            status,
            Json(serde_json::json!({
                "error": self.error_code(),
                "message": message,
            })),
        )
            .into_response();

        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, header::HeaderValue::from_static("5"));
        }

        response
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::DatabaseError(err.to_string())
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat("Invalid Authorization header".to_string()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidFormat("Expected Bearer token".to_string()));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}

/// Everything the gate needs, shared across requests
#[derive(Clone, Debug)]
pub struct AuthGate {
    pub pool: PgPool,
    pub strategy: AuthStrategy,

    /// Upper bound on one external verification
    pub verify_timeout: Duration,
}

impl AuthGate {
    pub fn new(pool: PgPool, strategy: AuthStrategy, verify_timeout: Duration) -> Self {
        Self {
            pool,
            strategy,
            verify_timeout,
        }
    }

    /// Resolves a bearer token to the caller's context
    pub async fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        match &self.strategy {
            AuthStrategy::Local { secret } => {
                let claims = validate_access_token(token, secret).map_err(|e| match e {
                    JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
                    JwtError::ForeignIssuer => {
                        AuthError::InvalidToken("Invalid issuer".to_string())
                    }
                    other => AuthError::InvalidToken(format!("Invalid token: {}", other)),
                })?;

                let user = User::find_by_id(&self.pool, claims.sub)
                    .await?
                    .ok_or_else(|| AuthError::UnknownUser("User not found".to_string()))?;

                Ok(AuthContext::from_user(&user, AuthMethod::Local))
            }
            AuthStrategy::External(verifier) => {
                let identity = tokio::time::timeout(self.verify_timeout, verifier.verify(token))
                    .await
                    .map_err(|_| {
                        tracing::warn!(
                            provider = verifier.provider(),
                            timeout_ms = self.verify_timeout.as_millis() as u64,
                            "Identity verification timed out"
                        );
                        AuthError::ProviderUnavailable(
                            "Identity provider timed out, retry later".to_string(),
                        )
                    })?
                    .map_err(|e| match e {
                        IdentityError::Invalid(msg) => AuthError::InvalidToken(msg),
                        IdentityError::Unavailable(msg) => {
                            tracing::warn!(provider = verifier.provider(), error = %msg, "Identity provider unavailable");
                            AuthError::ProviderUnavailable(
                                "Identity provider unavailable, retry later".to_string(),
                            )
                        }
                    })?;

                let user = User::reconcile_external(&self.pool, &identity)
                    .await?
                    .ok_or_else(|| {
                        tracing::warn!(
                            subject_id = %identity.subject_id,
                            "Email already linked to a different identity"
                        );
                        AuthError::UnknownUser(
                            "Email is linked to a different account".to_string(),
                        )
                    })?;

                Ok(AuthContext::from_user(&user, AuthMethod::External))
            }
        }
    }
}

/// Axum middleware: authenticate and attach [`AuthContext`]
pub async fn require_auth(
    State(gate): State<AuthGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_bearer_token(req.headers())?;
    let auth = gate.authenticate(token).await?;

    tracing::debug!(user_id = %auth.user_id, role = %auth.role, "Authenticated request");

    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}
