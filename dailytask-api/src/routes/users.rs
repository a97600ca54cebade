/// User endpoints
///
/// # Public
///
/// - `POST /api/users/register`: create a password account
/// - `POST /api/users/login`: exchange email and password for tokens
/// - `POST /api/users/refresh`: exchange a refresh token for new tokens
///
/// # Authenticated
///
/// - `GET  /api/users/me`
/// - `POST /api/users/complete-profile`
///
/// # Admin
///
/// - `GET  /api/users`
/// - `POST /api/users/:id/promote`, `/promote-supporter`, `/demote`, `/delete`
///
/// Register, login and refresh exist only with local authentication. Under an
/// external identity provider accounts are created on first sign-in.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use dailytask_shared::{
    auth::{authorization::RoleChange, jwt::TokenPair, middleware::AuthContext},
    models::user::User,
    services::users::{self, Registration, Session},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 5, max = 128, message = "Password must be 5 to 128 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,

    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

/// Tokens plus the signed-in user
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,

    #[serde(flatten)]
    pub tokens: TokenPair,

    pub user: User,
}

impl AuthResponse {
    fn new(message: &'static str, session: Session) -> Self {
        Self {
            message,
            tokens: session.tokens,
            user: session.user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn local_secret(state: &AppState) -> ApiResult<&str> {
    state.config.jwt_secret().ok_or_else(|| {
        ApiError::bad_request("Password accounts are disabled; sign in with the identity provider")
    })
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let secret = local_secret(&state)?;

    let session = users::register(
        &state.db,
        secret,
        Registration {
            email: req.email,
            password: req.password,
            name: req.name,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::new("User registered successfully", session)),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let secret = local_secret(&state)?;
    let session = users::login(&state.db, secret, &req.email, &req.password).await?;

    Ok(Json(AuthResponse::new("Login successful", session)))
}

pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let secret = local_secret(&state)?;
    let session = users::refresh(&state.db, secret, &req.refresh_token).await?;

    Ok(Json(AuthResponse::new("Token refreshed", session)))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserResponse>> {
    let user = users::current_user(&state.db, &auth).await?;

    Ok(Json(UserResponse {
        message: None,
        user,
    }))
}

pub async fn complete_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CompleteProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = users::complete_profile(&state.db, &auth, &req.name).await?;

    Ok(Json(UserResponse {
        message: Some("Profile completed"),
        user,
    }))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<UsersResponse>> {
    let users = users::list_users(&state.db, &auth, query.limit, query.offset).await?;
    Ok(Json(UsersResponse { users }))
}

async fn change_role(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
    change: RoleChange,
    message: &'static str,
) -> ApiResult<Json<UserResponse>> {
    let user = users::change_role(&state.db, auth, id, change).await?;

    Ok(Json(UserResponse {
        message: Some(message),
        user,
    }))
}

pub async fn promote(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    change_role(&state, &auth, id, RoleChange::PromoteAdmin, "User promoted to admin").await
}

pub async fn promote_supporter(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    change_role(
        &state,
        &auth,
        id,
        RoleChange::PromoteSupporter,
        "User promoted to supporter",
    )
    .await
}

pub async fn demote(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    change_role(&state, &auth, id, RoleChange::Demote, "User demoted to user").await
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    users::delete_user(&state.db, state.storage.as_ref(), &auth, id).await?;

    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}
