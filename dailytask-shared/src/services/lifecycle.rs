//! Task lifecycle.
//!
//! ```text
//!            submit
//!              │
//!              ▼
//!   ┌──────► pending ◄──────┐
//!   │          │            │ revert (owner)
//!   │ approve  │ reject     │
//!   │ (admin)  ▼ (admin)    │
//!   │        review ────────┘
//!   │          │
//!   └───── completed ◄─ approve (admin, from any state)
//! ```
//!
//! Single-task operations load the task first (missing → `NotFound`), then ask
//! the policy (refused → `Forbidden`), then write with one conditional update.

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::authorization::{
    can_view_all_tasks, can_view_task, require_task_action, TaskAction,
};
use crate::auth::middleware::AuthContext;
use crate::error::{ServiceError, ServiceResult};
use crate::models::task::{CreateTask, Task, TaskStatus, TaskSummary};
use crate::models::user::User;
use crate::storage::upload::{discard, store_all, PendingUpload, UploadPolicy};
use crate::storage::StorageBackend;

/// Longest accepted research or challenges text, in characters
pub const MAX_TEXT_LENGTH: usize = 20_000;

/// A task submission as received from the client
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub research: String,
    pub challenges: Option<String>,
    pub uploads: Vec<PendingUpload>,
}

impl Submission {
    fn validate(&self) -> ServiceResult<()> {
        if self.research.trim().is_empty() {
            return Err(ServiceError::InvalidInput("Research is required".to_string()));
        }

        let too_long = |text: &str| text.chars().count() > MAX_TEXT_LENGTH;
        if too_long(&self.research) || self.challenges.as_deref().is_some_and(too_long) {
            return Err(ServiceError::InvalidInput(format!(
                "Research and challenges are limited to {} characters",
                MAX_TEXT_LENGTH
            )));
        }

        Ok(())
    }
}

async fn load_task(pool: &PgPool, id: Uuid) -> ServiceResult<Task> {
    Task::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task"))
}

/// Creates a pending task owned by the caller
///
/// Attachments are stored first; the task row and the owner's `last_task_at`
/// are written in one transaction. If that transaction fails, the stored
/// attachments are removed again, so a failed submission leaves nothing behind.
pub async fn submit(
    pool: &PgPool,
    storage: &dyn StorageBackend,
    policy: &UploadPolicy,
    actor: &AuthContext,
    submission: Submission,
) -> ServiceResult<Task> {
    submission.validate()?;

    let file_count = submission.uploads.len();
    let attachments = store_all(storage, submission.uploads, policy).await?;

    let data = CreateTask {
        owner_email: actor.email.clone(),
        research: submission.research.trim().to_string(),
        challenges: submission
            .challenges
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
        attachments: attachments.clone(),
    };

    let created = async {
        let mut tx = pool.begin().await?;
        let task = Task::create(&mut *tx, data).await?;
        User::record_task_submission(&mut *tx, &actor.email).await?;
        tx.commit().await?;
        Ok::<_, sqlx::Error>(task)
    }
    .await;

    match created {
        Ok(task) => {
            tracing::info!(
                task_id = %task.id,
                user_id = %actor.user_id,
                files = file_count,
                "Task submitted"
            );
            Ok(task)
        }
        Err(e) => {
            tracing::error!(user_id = %actor.user_id, error = %e, "Task insert failed, removing stored files");
            discard(storage, &attachments).await;
            Err(e.into())
        }
    }
}

/// One task, if the caller may see it
pub async fn get_task(pool: &PgPool, actor: &AuthContext, id: Uuid) -> ServiceResult<Task> {
    let task = load_task(pool, id).await?;

    if !can_view_task(actor, &task) {
        return Err(ServiceError::Forbidden(
            "You do not have access to this task".to_string(),
        ));
    }

    Ok(task)
}

/// Checks the caller may download the stored file `provider_id`
///
/// The file belongs to whichever task lists it; files no task references
/// are treated as missing.
pub async fn authorize_attachment(
    pool: &PgPool,
    actor: &AuthContext,
    provider_id: &str,
) -> ServiceResult<Task> {
    let task = Task::find_by_attachment(pool, provider_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("File"))?;

    if !can_view_task(actor, &task) {
        return Err(ServiceError::Forbidden(
            "You do not have access to this file".to_string(),
        ));
    }

    Ok(task)
}

/// Tasks of `email`, which must be the caller's own address
pub async fn list_own_tasks(
    pool: &PgPool,
    actor: &AuthContext,
    email: &str,
) -> ServiceResult<Vec<Task>> {
    if !actor.has_email(email) {
        return Err(ServiceError::Forbidden(
            "You can only fetch your own tasks".to_string(),
        ));
    }

    Ok(Task::list_by_owner(pool, &actor.email).await?)
}

/// Task listing filtered by role
///
/// Guests and users see completed tasks only; supporters and admins see all.
pub async fn list_tasks(pool: &PgPool, actor: &AuthContext) -> ServiceResult<Vec<TaskSummary>> {
    let filter = if can_view_all_tasks(actor) {
        None
    } else {
        Some(TaskStatus::Completed)
    };

    Ok(Task::list_summaries(pool, filter, None).await?)
}

/// Owner-driven status change
///
/// The requested value must parse to a known status (`InvalidStatus`), and
/// owners may only choose `pending` or `review`.
pub async fn update_status(
    pool: &PgPool,
    actor: &AuthContext,
    id: Uuid,
    requested: &str,
) -> ServiceResult<Task> {
    let target: TaskStatus = requested.parse()?;

    let task = load_task(pool, id).await?;
    require_task_action(actor, &task, TaskAction::UpdateStatus)?;

    if !target.owner_settable() {
        return Err(ServiceError::Forbidden(format!(
            "Owners cannot set a task to {}",
            target
        )));
    }

    let updated = Task::compare_and_set_status(pool, id, task.status, target)
        .await?
        .ok_or_else(|| {
            ServiceError::Conflict("Task status changed concurrently, reload and retry".to_string())
        })?;

    tracing::info!(task_id = %id, from = %task.status, to = %target, "Task status updated");
    Ok(updated)
}

/// Owner sends a task in `review` back to `pending`
pub async fn revert(pool: &PgPool, actor: &AuthContext, id: Uuid) -> ServiceResult<Task> {
    let task = load_task(pool, id).await?;
    require_task_action(actor, &task, TaskAction::Revert)?;

    let updated = Task::compare_and_set_status(pool, id, TaskStatus::Review, TaskStatus::Pending)
        .await?
        .ok_or_else(|| {
            ServiceError::Conflict(format!(
                "Only tasks in review can be reverted (current status: {})",
                task.status
            ))
        })?;

    tracing::info!(task_id = %id, "Task reverted to pending");
    Ok(updated)
}

async fn review(
    pool: &PgPool,
    actor: &AuthContext,
    id: Uuid,
    action: TaskAction,
    target: TaskStatus,
) -> ServiceResult<Task> {
    let task = load_task(pool, id).await?;
    require_task_action(actor, &task, action)?;

    let updated = Task::set_status(pool, id, target)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task"))?;

    tracing::info!(
        task_id = %id,
        reviewer_id = %actor.user_id,
        from = %task.status,
        to = %target,
        "Task reviewed"
    );
    Ok(updated)
}

/// Admin marks a task completed
pub async fn approve(pool: &PgPool, actor: &AuthContext, id: Uuid) -> ServiceResult<Task> {
    review(pool, actor, id, TaskAction::Approve, TaskStatus::Completed).await
}

/// Admin sends a task back for review
pub async fn reject(pool: &PgPool, actor: &AuthContext, id: Uuid) -> ServiceResult<Task> {
    review(pool, actor, id, TaskAction::Reject, TaskStatus::Review).await
}

/// Removes a task, its comments and its stored files
pub async fn delete(
    pool: &PgPool,
    storage: &dyn StorageBackend,
    actor: &AuthContext,
    id: Uuid,
) -> ServiceResult<()> {
    let task = load_task(pool, id).await?;
    require_task_action(actor, &task, TaskAction::Delete)?;

    if !Task::delete(pool, id).await? {
        return Err(ServiceError::not_found("Task"));
    }

    discard(storage, &task.attachments.0).await;

    tracing::info!(task_id = %id, user_id = %actor.user_id, "Task deleted");
    Ok(())
}
