//! Review comments.
//!
//! Anyone who can view a task can read and add comments on it. Editing and
//! deleting is limited to the author and admins.

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::authorization::{can_modify_comment, can_view_task};
use crate::auth::middleware::AuthContext;
use crate::error::{ServiceError, ServiceResult};
use crate::models::comment::{Comment, CreateComment};
use crate::models::task::Task;

/// Longest accepted comment, in characters
pub const MAX_COMMENT_LENGTH: usize = 5_000;

fn validate_content(content: &str) -> ServiceResult<&str> {
    let content = content.trim();

    if content.is_empty() {
        return Err(ServiceError::InvalidInput(
            "Comment content is required".to_string(),
        ));
    }

    if content.chars().count() > MAX_COMMENT_LENGTH {
        return Err(ServiceError::InvalidInput(format!(
            "Comments are limited to {} characters",
            MAX_COMMENT_LENGTH
        )));
    }

    Ok(content)
}

async fn viewable_task(pool: &PgPool, actor: &AuthContext, task_id: Uuid) -> ServiceResult<Task> {
    let task = Task::find_by_id(pool, task_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task"))?;

    if !can_view_task(actor, &task) {
        return Err(ServiceError::Forbidden(
            "You do not have access to comments on this task".to_string(),
        ));
    }

    Ok(task)
}

async fn modifiable_comment(
    pool: &PgPool,
    actor: &AuthContext,
    comment_id: Uuid,
) -> ServiceResult<Comment> {
    let comment = Comment::find_by_id(pool, comment_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Comment"))?;

    if !can_modify_comment(actor, &comment) {
        return Err(ServiceError::Forbidden(
            "Only the author or an admin can change this comment".to_string(),
        ));
    }

    Ok(comment)
}

pub async fn add_comment(
    pool: &PgPool,
    actor: &AuthContext,
    task_id: Uuid,
    content: &str,
) -> ServiceResult<Comment> {
    viewable_task(pool, actor, task_id).await?;
    let content = validate_content(content)?;

    let comment = Comment::create(
        pool,
        CreateComment {
            task_id,
            author_email: actor.email.clone(),
            content: content.to_string(),
        },
    )
    .await?;

    tracing::info!(comment_id = %comment.id, task_id = %task_id, user_id = %actor.user_id, "Comment added");
    Ok(comment)
}

/// Comments on a task, newest first
pub async fn list_comments(
    pool: &PgPool,
    actor: &AuthContext,
    task_id: Uuid,
) -> ServiceResult<Vec<Comment>> {
    viewable_task(pool, actor, task_id).await?;
    Ok(Comment::list_by_task(pool, task_id).await?)
}

pub async fn update_comment(
    pool: &PgPool,
    actor: &AuthContext,
    comment_id: Uuid,
    content: &str,
) -> ServiceResult<Comment> {
    modifiable_comment(pool, actor, comment_id).await?;
    let content = validate_content(content)?;

    let comment = Comment::update_content(pool, comment_id, content)
        .await?
        .ok_or_else(|| ServiceError::not_found("Comment"))?;

    tracing::info!(comment_id = %comment_id, user_id = %actor.user_id, "Comment updated");
    Ok(comment)
}

pub async fn delete_comment(
    pool: &PgPool,
    actor: &AuthContext,
    comment_id: Uuid,
) -> ServiceResult<()> {
    modifiable_comment(pool, actor, comment_id).await?;

    if !Comment::delete(pool, comment_id).await? {
        return Err(ServiceError::not_found("Comment"));
    }

    tracing::info!(comment_id = %comment_id, user_id = %actor.user_id, "Comment deleted");
    Ok(())
}
