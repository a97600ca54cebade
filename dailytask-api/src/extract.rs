/// Request extractors
///
/// [`ValidatedJson`] parses a JSON body and runs its `validator` rules, so a
/// malformed body becomes a 400 and a rule violation becomes a 422, both in
/// the standard error shape.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, response::IntoResponse, routing::post, Router};
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize, Validate)]
    struct NameBody {
        #[validate(length(min = 1, message = "Name is required"))]
        name: String,
    }

    async fn echo(ValidatedJson(body): ValidatedJson<NameBody>) -> impl IntoResponse {
        body.name
    }

    async fn status_for(body: &'static str) -> StatusCode {
        let app = Router::new().route("/", post(echo));
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_valid_body_passes() {
        assert_eq!(status_for(r#"{"name":"Ada"}"#).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rule_violation_is_422() {
        assert_eq!(
            status_for(r#"{"name":""}"#).await,
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        assert_eq!(status_for("{not json").await, StatusCode::BAD_REQUEST);
    }
}
