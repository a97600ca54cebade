/// Comment endpoints
///
/// The path id is a task id for `GET`/`POST` and a comment id for
/// `PUT`/`DELETE`:
///
/// ```text
/// GET    /api/comments/:taskId
/// POST   /api/comments/:taskId        { "content": "..." }
/// PUT    /api/comments/:commentId     { "content": "..." }
/// DELETE /api/comments/:commentId
/// ```

use crate::{app::AppState, error::ApiResult, extract::ValidatedJson};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use dailytask_shared::{
    auth::middleware::AuthContext,
    models::comment::Comment,
    services::comments,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, message = "Comment content is required"))]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub message: &'static str,
    pub comment: Comment,
}

#[derive(Debug, Serialize)]
pub struct CommentsResponse {
    pub comments: Vec<Comment>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub async fn list_comments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<CommentsResponse>> {
    let comments = comments::list_comments(&state.db, &auth, task_id).await?;
    Ok(Json(CommentsResponse { comments }))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    let comment = comments::add_comment(&state.db, &auth, task_id, &req.content).await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            message: "Comment added",
            comment,
        }),
    ))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(comment_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    let comment = comments::update_comment(&state.db, &auth, comment_id, &req.content).await?;

    Ok(Json(CommentResponse {
        message: "Comment updated",
        comment,
    }))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    comments::delete_comment(&state.db, &auth, comment_id).await?;

    Ok(Json(MessageResponse {
        message: "Comment deleted",
    }))
}
