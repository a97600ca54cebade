/// HTTP error mapping
///
/// All handlers return `Result<T, ApiError>`; service, auth and validation
/// errors convert into it with `?`.
///
/// Every error body has the same shape:
///
/// ```json
/// { "error": "not_found", "message": "Task not found" }
/// ```
///
/// # Example
///
/// ```no_run
/// use dailytask_api::error::ApiResult;
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler() -> ApiResult<Json<Value>> {
///     Ok(Json(json!({ "message": "ok" })))
/// }
/// ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dailytask_shared::{auth::middleware::AuthError, error::ServiceError};
use serde::{Deserialize, Serialize};

pub type ApiResult<T> = Result<T, ApiError>;

/// Seconds clients are told to wait before retrying a 503
const RETRY_AFTER_SECS: &str = "5";

/// Every way a request can fail, one variant per status code
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400 with a stable machine-readable `code`
    #[error("Bad request: {message}")]
    BadRequest { code: &'static str, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// 409: a concurrent change won
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 422: field validation errors
    #[error("Validation failed: {} errors", .0.len())]
    ValidationError(Vec<ValidationErrorDetail>),

    /// 502: an upstream service failed
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// 503: retryable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code: "bad_request",
            message: message.into(),
        }
    }
}

/// One rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code (e.g. "bad_request", "forbidden")
    pub error: String,

    pub message: String,

    /// Field-level validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,

    /// Underlying cause of an internal error, outside production only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

/// Underlying message of a 500, carried in the response extensions so the
/// error-detail middleware can surface it in development
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut internal_detail = None;

        let (status, error_code, message, details) = match self {
            ApiError::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, code, message, None)
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::BadGateway(msg) => {
                tracing::warn!(error = %msg, "Upstream failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "bad_gateway",
                    "An upstream service failed".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg,
                None,
            ),
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal_detail = Some(InternalErrorDetail(msg));
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
            debug: None,
        });

        let mut response = (status, body).into_response();

        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }

        if let Some(detail) = internal_detail {
            response.extensions_mut().insert(detail);
        }

        response
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthenticated(msg) => ApiError::Unauthorized(msg),
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::Forbidden(msg) => ApiError::Forbidden(msg),
            ServiceError::InvalidInput(msg) => ApiError::bad_request(msg),
            ServiceError::InvalidStatus(msg) => ApiError::BadRequest {
                code: "invalid_status",
                message: msg,
            },
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::Upstream(msg) => ApiError::BadGateway(msg),
            ServiceError::Timeout(msg) => ApiError::ServiceUnavailable(msg),
            ServiceError::Database(err) => ApiError::InternalError(format!("Database error: {}", err)),
            ServiceError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => {
                ApiError::Unauthorized("Missing credentials".to_string())
            }
            AuthError::InvalidFormat(msg) => ApiError::Unauthorized(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
            AuthError::UnknownUser(msg) => ApiError::Unauthorized(msg),
            AuthError::ProviderUnavailable(msg) => ApiError::ServiceUnavailable(msg),
            AuthError::DatabaseError(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<dailytask_shared::storage::StorageError> for ApiError {
    fn from(err: dailytask_shared::storage::StorageError) -> Self {
        ServiceError::from(err).into()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::InternalError(format!("Database error: {}", err))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {}", field)),
                })
            })
            .collect();

        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        ApiError::bad_request(format!("Malformed multipart body: {}", err.body_text()))
    }
}
