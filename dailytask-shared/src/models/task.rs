/// Task model and database operations
///
/// A task is one daily research submission. It moves between three review
/// states; every state change is a single conditional `UPDATE ... RETURNING`
/// so two reviewers acting at once cannot silently overwrite each other.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('pending', 'review', 'completed');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     owner_email VARCHAR(255) NOT NULL REFERENCES users(email),
///     research TEXT NOT NULL,
///     challenges TEXT,
///     attachments JSONB NOT NULL DEFAULT '[]',
///     status task_status NOT NULL DEFAULT 'pending',
///     submitted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use dailytask_shared::models::task::{Task, CreateTask, TaskStatus};
/// use dailytask_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let task = Task::create(&pool, CreateTask {
///     owner_email: "ada@example.com".to_string(),
///     research: "Read the tokio scheduler docs".to_string(),
///     challenges: None,
///     attachments: vec![],
/// }).await?;
///
/// // Only succeeds while the task is still pending
/// let moved = Task::compare_and_set_status(&pool, task.id, TaskStatus::Pending, TaskStatus::Review).await?;
/// assert!(moved.is_some());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::user::normalize_email;

/// Review state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Submitted, waiting for a reviewer
    Pending,

    /// Sent back to the owner for another pass
    Review,

    /// Approved by an admin
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Pending, TaskStatus::Review, TaskStatus::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Review => "review",
            TaskStatus::Completed => "completed",
        }
    }

    /// Statuses an owner may set through the generic status update
    pub fn owner_settable(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Review)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a status string is not one of the three known values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid status '{0}': expected one of pending, review, completed")]
pub struct ParseStatusError(pub String);

impl FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "review" => Ok(TaskStatus::Review),
            "completed" => Ok(TaskStatus::Completed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Stored file reference, written once at submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDescriptor {
    /// Original file name as uploaded
    pub name: String,

    /// Public URL or local `/uploads/...` path
    pub locator: String,

    pub mime_type: String,

    /// Size in bytes
    pub size: u64,

    /// Key the storage backend needs to delete the object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

/// Task row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,

    /// Lower-cased email of the submitting user, never changes
    pub owner_email: String,

    pub research: String,

    pub challenges: Option<String>,

    pub attachments: Json<Vec<AttachmentDescriptor>>,

    pub status: TaskStatus,

    pub submitted_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Task with the reviewer-facing projections
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub task: Task,

    /// Display name of the owner, if set
    pub owner_name: Option<String>,

    pub comment_count: i64,
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub owner_email: String,
    pub research: String,
    pub challenges: Option<String>,
    pub attachments: Vec<AttachmentDescriptor>,
}

impl Task {
    /// Whether `email` owns this task (case-insensitive)
    pub fn is_owned_by(&self, email: &str) -> bool {
        self.owner_email == normalize_email(email)
    }

    /// Inserts a task in `pending`
    ///
    /// Takes any executor so submission can run inside a transaction.
    pub async fn create<'e, E>(executor: E, data: CreateTask) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (owner_email, research, challenges, attachments)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_email, research, challenges, attachments, status,
                      submitted_at, updated_at
            "#,
        )
        .bind(normalize_email(&data.owner_email))
        .bind(data.research)
        .bind(data.challenges)
        .bind(Json(data.attachments))
        .fetch_one(executor)
        .await?;

        Ok(task)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, owner_email, research, challenges, attachments, status,
                   submitted_at, updated_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Tasks of one owner, newest first
    pub async fn list_by_owner(pool: &PgPool, owner_email: &str) -> Result<Vec<Self>, sqlx::Error> {
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, owner_email, research, challenges, attachments, status,
                   submitted_at, updated_at
            FROM tasks
            WHERE owner_email = $1
            ORDER BY submitted_at DESC
            "#,
        )
        .bind(normalize_email(owner_email))
        .fetch_all(pool)
        .await?;

        Ok(tasks)
    }

    /// The task whose attachments include the stored object `provider_id`
    pub async fn find_by_attachment(
        pool: &PgPool,
        provider_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, owner_email, research, challenges, attachments, status,
                   submitted_at, updated_at
            FROM tasks
            WHERE attachments @> jsonb_build_array(jsonb_build_object('providerId', $1::text))
            LIMIT 1
            "#,
        )
        .bind(provider_id)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Tasks with owner name and comment count, newest first
    ///
    /// `status = None` returns every task.
    pub async fn list_summaries(
        pool: &PgPool,
        status: Option<TaskStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<TaskSummary>, sqlx::Error> {
        let tasks = sqlx::query_as::<_, TaskSummary>(
            r#"
            SELECT t.id, t.owner_email, t.research, t.challenges, t.attachments, t.status,
                   t.submitted_at, t.updated_at,
                   u.name AS owner_name,
                   (SELECT COUNT(*) FROM comments c WHERE c.task_id = t.id) AS comment_count
            FROM tasks t
            LEFT JOIN users u ON u.email = t.owner_email
            WHERE $1::task_status IS NULL OR t.status = $1
            ORDER BY t.submitted_at DESC
            LIMIT $2
            "#,
        )
        .bind(status)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(tasks)
    }

    /// Moves a task to `status` only if it is currently `expected`
    ///
    /// Returns `None` if the task is gone or its status changed underneath us.
    pub async fn compare_and_set_status(
        pool: &PgPool,
        id: Uuid,
        expected: TaskStatus,
        status: TaskStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET status = $3,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING id, owner_email, research, challenges, attachments, status,
                      submitted_at, updated_at
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(status)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Sets the status from any current value in one statement
    ///
    /// Used by admin review actions, which are valid from every state.
    pub async fn set_status(
        pool: &PgPool,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET status = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, owner_email, research, challenges, attachments, status,
                      submitted_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Deletes a task; comments go with it through `ON DELETE CASCADE`
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Per-status counts in one grouped scan
    pub async fn count_by_status(pool: &PgPool) -> Result<Vec<(TaskStatus, i64)>, sqlx::Error> {
        let rows: Vec<(TaskStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM tasks GROUP BY status")
                .fetch_all(pool)
                .await?;

        Ok(rows)
    }

    /// Number of distinct users owning at least one task
    pub async fn count_distinct_owners(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT owner_email) FROM tasks")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_task(owner: &str, status: TaskStatus) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            owner_email: normalize_email(owner),
            research: "Looked into connection pooling".to_string(),
            challenges: None,
            attachments: Json(vec![]),
            status,
            submitted_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("pending".parse::<TaskStatus>(), Ok(TaskStatus::Pending));
        assert_eq!("Review".parse::<TaskStatus>(), Ok(TaskStatus::Review));
        assert_eq!(" completed ".parse::<TaskStatus>(), Ok(TaskStatus::Completed));
        assert_eq!(
            "approved".parse::<TaskStatus>(),
            Err(ParseStatusError("approved".to_string()))
        );
        assert!("".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_as_str_matches_serde() {
        for status in TaskStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_owner_settable() {
        assert!(TaskStatus::Pending.owner_settable());
        assert!(TaskStatus::Review.owner_settable());
        assert!(!TaskStatus::Completed.owner_settable());
    }

    #[test]
    fn test_is_owned_by_ignores_case() {
        let task = sample_task("U1@x.com", TaskStatus::Pending);
        assert!(task.is_owned_by("u1@X.COM"));
        assert!(!task.is_owned_by("u2@x.com"));
    }

    #[test]
    fn test_summary_serializes_flat() {
        let summary = TaskSummary {
            task: sample_task("u1@x.com", TaskStatus::Review),
            owner_name: Some("U One".to_string()),
            comment_count: 2,
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["ownerEmail"], "u1@x.com");
        assert_eq!(json["status"], "review");
        assert_eq!(json["ownerName"], "U One");
        assert_eq!(json["commentCount"], 2);
        assert!(json["attachments"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_attachment_descriptor_json() {
        let attachment = AttachmentDescriptor {
            name: "notes.pdf".to_string(),
            locator: "/uploads/abc.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size: 1024,
            provider_id: None,
        };

        let json = serde_json::to_value(&attachment).unwrap();
        assert_eq!(json["mimeType"], "application/pdf");
        assert!(json.get("providerId").is_none());
    }
}
