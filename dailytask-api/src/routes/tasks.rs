/// Task endpoints
///
/// ```text
/// POST   /api/tasks/submit              multipart: research, challenges, files[]
/// GET    /api/tasks/my-tasks/:email
/// GET    /api/tasks/all
/// GET    /api/tasks/stats               supporter or admin
/// GET    /api/tasks/:id
/// PATCH  /api/tasks/:id/status          owner, { "status": "review" }
/// POST   /api/tasks/:id/approve         admin
/// POST   /api/tasks/:id/reject          admin
/// POST   /api/tasks/:id/revert          owner, review -> pending
/// DELETE /api/tasks/:id                 owner or admin
/// ```

use crate::{
    app::AppState,
    error::ApiResult,
    extract::ValidatedJson,
};
use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use bytes::BytesMut;
use dailytask_shared::{
    auth::middleware::AuthContext,
    models::{
        stats::StatsReport,
        task::{Task, TaskSummary},
    },
    services::{
        lifecycle::{self, Submission},
        stats,
    },
    storage::{PendingUpload, UploadPolicy},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Form field names accepted for attachments
const FILE_FIELDS: [&str; 2] = ["files", "files[]"];

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub task: Task,
}

impl TaskResponse {
    fn with_message(message: &'static str, task: Task) -> Self {
        Self {
            message: Some(message),
            task,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TasksResponse<T> {
    pub tasks: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Reads one file part, failing as soon as it grows past the size limit
async fn read_file_part(
    mut field: Field<'_>,
    policy: &UploadPolicy,
    files_so_far: usize,
) -> ApiResult<PendingUpload> {
    let name = field.file_name().unwrap_or("attachment").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    policy.check_part(files_so_far, &content_type)?;

    let mut data = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        data.extend_from_slice(&chunk);
        policy.check_size(&name, data.len())?;
    }

    Ok(PendingUpload {
        name,
        content_type,
        data: data.freeze(),
    })
}

/// Collects the text fields and file parts of a submission
///
/// Nothing is stored here; any rejected part fails the whole request.
async fn read_submission(mut multipart: Multipart, policy: &UploadPolicy) -> ApiResult<Submission> {
    let mut submission = Submission::default();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            "research" => submission.research = field.text().await?,
            "challenges" => submission.challenges = Some(field.text().await?),
            name if FILE_FIELDS.contains(&name) => {
                let upload = read_file_part(field, policy, submission.uploads.len()).await?;
                submission.uploads.push(upload);
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok(submission)
}

pub async fn submit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let submission = read_submission(multipart, &state.upload_policy).await.map_err(|e| {
        tracing::info!(user_id = %auth.user_id, error = %e, "Submission rejected");
        e
    })?;

    let task = lifecycle::submit(
        &state.db,
        state.storage.as_ref(),
        &state.upload_policy,
        &auth,
        submission,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(TaskResponse::with_message("Task submitted successfully", task)),
    ))
}

pub async fn my_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(email): Path<String>,
) -> ApiResult<Json<TasksResponse<Task>>> {
    let tasks = lifecycle::list_own_tasks(&state.db, &auth, &email).await?;
    Ok(Json(TasksResponse { tasks }))
}

pub async fn all_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<TasksResponse<TaskSummary>>> {
    let tasks = lifecycle::list_tasks(&state.db, &auth).await?;
    Ok(Json(TasksResponse { tasks }))
}

pub async fn task_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<StatsReport>> {
    let report = stats::compute_stats(&state.db, &auth).await?;
    Ok(Json(report))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskResponse>> {
    let task = lifecycle::get_task(&state.db, &auth, id).await?;
    Ok(Json(TaskResponse {
        message: None,
        task,
    }))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateStatusRequest>,
) -> ApiResult<Json<TaskResponse>> {
    let task = lifecycle::update_status(&state.db, &auth, id, &req.status).await?;
    Ok(Json(TaskResponse::with_message("Task status updated", task)))
}

pub async fn approve(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskResponse>> {
    let task = lifecycle::approve(&state.db, &auth, id).await?;
    Ok(Json(TaskResponse::with_message("Task approved", task)))
}

pub async fn reject(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskResponse>> {
    let task = lifecycle::reject(&state.db, &auth, id).await?;
    Ok(Json(TaskResponse::with_message("Task sent back for review", task)))
}

pub async fn revert(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskResponse>> {
    let task = lifecycle::revert(&state.db, &auth, id).await?;
    Ok(Json(TaskResponse::with_message("Task reverted to pending", task)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    lifecycle::delete(&state.db, state.storage.as_ref(), &auth, id).await?;
    Ok(Json(MessageResponse {
        message: "Task deleted successfully",
    }))
}
