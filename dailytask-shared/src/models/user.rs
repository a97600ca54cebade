/// User model and database operations
///
/// Accounts are keyed by a lower-cased email. Password-based accounts carry an
/// Argon2id hash; accounts created through the external identity provider carry
/// the provider's subject id instead and start as `guest` until they complete
/// their profile.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('guest', 'user', 'supporter', 'admin');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL,          -- unique, lower-cased
///     password_hash VARCHAR(255),
///     external_id VARCHAR(255),             -- unique when present
///     name VARCHAR(255),
///     role user_role NOT NULL DEFAULT 'user',
///     profile_complete BOOLEAN NOT NULL DEFAULT FALSE,
///     last_task_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use dailytask_shared::models::user::{User, CreateUser, UserRole};
/// use dailytask_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "Ada@Example.com".to_string(),
///     password_hash: Some("$argon2id$...".to_string()),
///     external_id: None,
///     name: Some("Ada".to_string()),
///     role: UserRole::User,
///     profile_complete: true,
/// }).await?;
///
/// // Emails are normalized on the way in
/// assert_eq!(user.email, "ada@example.com");
/// let found = User::find_by_email(&pool, "ADA@example.com").await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use std::fmt;
use uuid::Uuid;

use crate::auth::identity::ExternalIdentity;

/// Closed set of account roles
///
/// Variants are declared in privilege order, so the derived `Ord` gives
/// `Guest < User < Supporter < Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Signed in through the identity provider, profile not completed yet
    Guest,

    /// Regular member who submits daily tasks
    User,

    /// Reviewer with read access to every task and the dashboard
    Supporter,

    /// Full control, including user management and task approval
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Guest => "guest",
            UserRole::User => "user",
            UserRole::Supporter => "supporter",
            UserRole::Admin => "admin",
        }
    }

    /// Supporters and admins review other people's work
    pub fn is_reviewer(&self) -> bool {
        *self >= UserRole::Supporter
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,

    /// Lower-cased, unique
    pub email: String,

    /// Argon2id hash; `None` for provider-managed accounts
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,

    /// Identity-provider subject id
    #[serde(skip_serializing, default)]
    pub external_id: Option<String>,

    pub name: Option<String>,

    pub role: UserRole,

    pub profile_complete: bool,

    /// When the user last submitted a task (drives the daily reminder)
    pub last_task_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// Normalized by `User::create`
    pub email: String,
    pub password_hash: Option<String>,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub role: UserRole,
    pub profile_complete: bool,
}

/// Canonical form of an email address used for storage and comparison
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Case-insensitive email equality
pub fn emails_match(a: &str, b: &str) -> bool {
    normalize_email(a) == normalize_email(b)
}

impl User {
    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// A duplicate email surfaces as a unique-violation database error on the
    /// `users_email_key` index.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, external_id, name, role, profile_complete)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, password_hash, external_id, name, role, profile_complete,
                      last_task_at, created_at, updated_at, last_login_at
            "#,
        )
        .bind(normalize_email(&data.email))
        .bind(data.password_hash)
        .bind(data.external_id)
        .bind(data.name)
        .bind(data.role)
        .bind(data.profile_complete)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, external_id, name, role, profile_complete,
                   last_task_at, created_at, updated_at, last_login_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by email, ignoring case
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, external_id, name, role, profile_complete,
                   last_task_at, created_at, updated_at, last_login_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_external_id(
        pool: &PgPool,
        external_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, external_id, name, role, profile_complete,
                   last_task_at, created_at, updated_at, last_login_at
            FROM users
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds or creates the local account for a verified external identity
    ///
    /// Lookup order:
    /// 1. by provider subject id
    /// 2. by email, linking the subject id onto an existing password account
    /// 3. otherwise a new `guest` with `profile_complete = false`
    ///
    /// Steps 2 and 3 are one upsert on the email index, so two first requests
    /// racing for the same identity end up on the same row. Returns `None`
    /// when the email already belongs to a different subject.
    pub async fn reconcile_external(
        pool: &PgPool,
        identity: &ExternalIdentity,
    ) -> Result<Option<Self>, sqlx::Error> {
        if let Some(user) = Self::find_by_external_id(pool, &identity.subject_id).await? {
            return Ok(Some(user));
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, external_id, name, role, profile_complete, last_login_at)
            VALUES ($1, $2, $3, 'guest', FALSE, NOW())
            ON CONFLICT (email) DO UPDATE
            SET external_id = COALESCE(users.external_id, EXCLUDED.external_id),
                name = COALESCE(users.name, EXCLUDED.name),
                last_login_at = NOW(),
                updated_at = NOW()
            RETURNING id, email, password_hash, external_id, name, role, profile_complete,
                      last_task_at, created_at, updated_at, last_login_at
            "#,
        )
        .bind(normalize_email(&identity.email))
        .bind(&identity.subject_id)
        .bind(&identity.display_name)
        .fetch_one(pool)
        .await?;

        if user.external_id.as_deref() == Some(identity.subject_id.as_str()) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Sets the display name and marks the profile complete
    ///
    /// A `guest` finishing their profile becomes a regular `user`; other roles
    /// are left alone.
    pub async fn complete_profile(
        pool: &PgPool,
        id: Uuid,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $2,
                profile_complete = TRUE,
                role = CASE WHEN role = 'guest' THEN 'user'::user_role ELSE role END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, password_hash, external_id, name, role, profile_complete,
                      last_task_at, created_at, updated_at, last_login_at
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Changes a user's role only if it still holds `expected`
    ///
    /// Returns `None` when the user is gone or its role changed concurrently.
    pub async fn set_role(
        pool: &PgPool,
        id: Uuid,
        expected: UserRole,
        role: UserRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET role = $3,
                updated_at = NOW()
            WHERE id = $1 AND role = $2
            RETURNING id, email, password_hash, external_id, name, role, profile_complete,
                      last_task_at, created_at, updated_at, last_login_at
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(role)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Deletes a non-admin user
    ///
    /// The role guard is part of the statement, so an admin row is never
    /// removed even if it was promoted after the caller's policy check.
    /// Tasks and comments go with the user through `ON DELETE CASCADE`.
    pub async fn delete_non_admin(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1 AND role <> 'admin'")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stamps `last_task_at`; runs inside the submission transaction
    pub async fn record_task_submission<'e, E>(executor: E, email: &str) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("UPDATE users SET last_task_at = NOW() WHERE email = $1")
            .bind(normalize_email(email))
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists users, newest first
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, external_id, name, role, profile_complete,
                   last_task_at, created_at, updated_at, last_login_at
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    /// Users at `min_role` or above whose last submission is older than
    /// `since` (or who never submitted)
    pub async fn list_without_submission_since(
        pool: &PgPool,
        since: DateTime<Utc>,
        min_role: UserRole,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, external_id, name, role, profile_complete,
                   last_task_at, created_at, updated_at, last_login_at
            FROM users
            WHERE role >= $2
              AND (last_task_at IS NULL OR last_task_at < $1)
            ORDER BY email
            "#,
        )
        .bind(since)
        .bind(min_role)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }
}
