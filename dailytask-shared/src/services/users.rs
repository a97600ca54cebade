//! Accounts: registration, login, profile and admin user management.

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::authorization::{
    can_manage_users, check_role_change, check_user_deletion, RoleChange,
};
use crate::auth::jwt::{issue_token_pair, validate_refresh_token, TokenPair};
use crate::auth::middleware::AuthContext;
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::error::{is_unique_violation, ServiceError, ServiceResult};
use crate::models::task::{AttachmentDescriptor, Task};
use crate::models::user::{normalize_email, CreateUser, User, UserRole};
use crate::storage::upload::discard;
use crate::storage::StorageBackend;

const EMAIL_INDEX: &str = "users_email_key";

/// Upper bound on one page of the admin user list
pub const MAX_USER_PAGE: i64 = 500;

/// User plus fresh tokens
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// Runs the Argon2 hash on the blocking pool
async fn hash_blocking(password: String) -> ServiceResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::Internal(format!("hash task failed: {e}")))?
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

async fn verify_blocking(password: String, hash: String) -> ServiceResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ServiceError::Internal(format!("verify task failed: {e}")))?
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

fn session_for(user: User, secret: &str) -> ServiceResult<Session> {
    let tokens = issue_token_pair(user.id, &user.email, secret)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    Ok(Session { user, tokens })
}

/// Creates a password account with role `user`
///
/// A duplicate email is reported as invalid input.
pub async fn register(pool: &PgPool, secret: &str, input: Registration) -> ServiceResult<Session> {
    validate_password_strength(&input.password).map_err(ServiceError::InvalidInput)?;

    let email = normalize_email(&input.email);
    let name = input
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let password_hash = hash_blocking(input.password).await?;

    let user = User::create(
        pool,
        CreateUser {
            email,
            password_hash: Some(password_hash),
            external_id: None,
            profile_complete: name.is_some(),
            name,
            role: UserRole::User,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e, EMAIL_INDEX) {
            ServiceError::InvalidInput("Email already registered".to_string())
        } else {
            ServiceError::Database(e)
        }
    })?;

    tracing::info!(user_id = %user.id, "User registered");
    session_for(user, secret)
}

/// Checks email and password and issues tokens
///
/// Unknown emails, wrong passwords and provider-only accounts all fail with
/// the same message.
pub async fn login(pool: &PgPool, secret: &str, email: &str, password: &str) -> ServiceResult<Session> {
    let invalid = || ServiceError::Unauthenticated("Invalid email or password".to_string());

    let user = User::find_by_email(pool, email).await?.ok_or_else(invalid)?;
    let hash = user.password_hash.clone().ok_or_else(invalid)?;

    if !verify_blocking(password.to_string(), hash).await? {
        tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    User::update_last_login(pool, user.id).await?;

    tracing::info!(user_id = %user.id, "User logged in");
    session_for(user, secret)
}

/// Exchanges a refresh token for a new token pair
///
/// The user is re-read, so a deleted account cannot refresh.
pub async fn refresh(pool: &PgPool, secret: &str, refresh_token: &str) -> ServiceResult<Session> {
    let claims = validate_refresh_token(refresh_token, secret)
        .map_err(|e| ServiceError::Unauthenticated(e.to_string()))?;

    let user = User::find_by_id(pool, claims.sub)
        .await?
        .ok_or_else(|| ServiceError::Unauthenticated("User not found".to_string()))?;

    session_for(user, secret)
}

pub async fn current_user(pool: &PgPool, actor: &AuthContext) -> ServiceResult<User> {
    User::find_by_id(pool, actor.user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("User"))
}

/// Sets the caller's display name and marks the profile complete
pub async fn complete_profile(pool: &PgPool, actor: &AuthContext, name: &str) -> ServiceResult<User> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("Name is required".to_string()));
    }

    let user = User::complete_profile(pool, actor.user_id, name)
        .await?
        .ok_or_else(|| ServiceError::not_found("User"))?;

    tracing::info!(user_id = %user.id, role = %user.role, "Profile completed");
    Ok(user)
}

fn require_user_manager(actor: &AuthContext) -> ServiceResult<()> {
    if can_manage_users(actor) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden("Only admins can manage users".to_string()))
    }
}

pub async fn list_users(
    pool: &PgPool,
    actor: &AuthContext,
    limit: i64,
    offset: i64,
) -> ServiceResult<Vec<User>> {
    require_user_manager(actor)?;

    let limit = limit.clamp(1, MAX_USER_PAGE);
    Ok(User::list(pool, limit, offset.max(0)).await?)
}

/// Applies an admin role change to `target_id`
///
/// The write only succeeds if the target still holds the role the policy
/// looked at; a concurrent change is reported as a conflict.
pub async fn change_role(
    pool: &PgPool,
    actor: &AuthContext,
    target_id: Uuid,
    change: RoleChange,
) -> ServiceResult<User> {
    require_user_manager(actor)?;

    let target = User::find_by_id(pool, target_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("User"))?;

    check_role_change(actor.role, target.role, change)?;

    let new_role = change.target_role();
    let updated = User::set_role(pool, target_id, target.role, new_role)
        .await?
        .ok_or_else(|| {
            ServiceError::Conflict("User changed concurrently, reload and retry".to_string())
        })?;

    tracing::info!(
        user_id = %target_id,
        admin_id = %actor.user_id,
        from = %target.role,
        to = %new_role,
        "User role changed"
    );
    Ok(updated)
}

/// Deletes a non-admin user together with their tasks, comments and files
///
/// Rows go through `ON DELETE CASCADE`; the stored attachments of the user's
/// tasks are removed once the rows are gone.
pub async fn delete_user(
    pool: &PgPool,
    storage: &dyn StorageBackend,
    actor: &AuthContext,
    target_id: Uuid,
) -> ServiceResult<()> {
    require_user_manager(actor)?;

    let target = User::find_by_id(pool, target_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("User"))?;

    check_user_deletion(actor.role, target.role)?;

    let attachments: Vec<AttachmentDescriptor> = Task::list_by_owner(pool, &target.email)
        .await?
        .into_iter()
        .flat_map(|task| task.attachments.0)
        .collect();

    if !User::delete_non_admin(pool, target_id).await? {
        return Err(ServiceError::Conflict(
            "User changed concurrently, reload and retry".to_string(),
        ));
    }

    discard(storage, &attachments).await;

    tracing::info!(
        user_id = %target_id,
        admin_id = %actor.user_id,
        files = attachments.len(),
        "User deleted"
    );
    Ok(())
}
