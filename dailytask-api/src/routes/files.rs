/// Attachment file serving
///
/// - `GET /uploads/:filename`: inline, for previews
/// - `GET /download/:filename`: `Content-Disposition: attachment`, only for
///   callers who may view the task the file belongs to
///
/// Only backends that keep files on this host can serve them; with a remote
/// store the attachment locator is already a public URL and these routes
/// answer 404. File names must be a single safe path component.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension,
};
use dailytask_shared::{
    auth::middleware::AuthContext, services::lifecycle, storage::mime_for_filename,
};
use tokio_util::io::ReaderStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Inline,
    Attachment,
}

async fn stream_file(state: &AppState, filename: &str, disposition: Disposition) -> ApiResult<Response> {
    let not_found = || ApiError::NotFound("File not found".to_string());

    let path = state.storage.local_path(filename).ok_or_else(not_found)?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(ApiError::InternalError(format!("Failed to open upload: {}", e))),
    };

    let metadata = file
        .metadata()
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to stat upload: {}", e)))?;

    if !metadata.is_file() {
        return Err(not_found());
    }

    let kind = match disposition {
        Disposition::Inline => "inline",
        Disposition::Attachment => "attachment",
    };
    let content_disposition = HeaderValue::from_str(&format!("{}; filename=\"{}\"", kind, filename))
        .map_err(|_| not_found())?;

    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(mime_for_filename(filename)),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(metadata.len())),
            (header::CONTENT_DISPOSITION, content_disposition),
        ],
        body,
    )
        .into_response())
}

pub async fn serve_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    stream_file(&state, &filename, Disposition::Inline).await
}

pub async fn download(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let task = lifecycle::authorize_attachment(&state.db, &auth, &filename).await?;

    tracing::debug!(
        user_id = %auth.user_id,
        task_id = %task.id,
        file = %filename,
        "Attachment download"
    );
    stream_file(&state, &filename, Disposition::Attachment).await
}
