/// Development-only error detail
///
/// `ApiError::InternalError` hides its cause behind a generic message and
/// stores the cause as an [`InternalErrorDetail`] response extension. Outside
/// production this middleware rewrites such responses so the body also
/// carries the cause as `debug`:
///
/// ```json
/// {
///   "error": "internal_error",
///   "message": "An internal error occurred",
///   "debug": "Database error: pool timed out while waiting for an open connection"
/// }
/// ```
///
/// It is not installed in production.

use axum::{extract::Request, middleware::Next, response::IntoResponse, response::Response, Json};

use crate::error::{ErrorResponse, InternalErrorDetail};

pub async fn attach_error_detail(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let Some(detail) = response.extensions().get::<InternalErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);

    let body = Json(ErrorResponse {
        error: "internal_error".to_string(),
        message: "An internal error occurred".to_string(),
        details: None,
        debug: Some(detail.0),
    });

    (parts, body).into_response()
}
