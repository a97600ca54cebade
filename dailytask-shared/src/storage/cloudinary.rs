//! Cloudinary upload API backend.
//!
//! Uses signed uploads: every request carries a timestamp and a SHA-256
//! signature over the sorted request parameters plus the API secret, so the
//! secret itself never leaves the server.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

use super::{StorageBackend, StorageError, StoredObject};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Folder all task attachments are uploaded into
const UPLOAD_FOLDER: &str = "dailytask";

#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

pub struct CloudinaryStorage {
    http_client: reqwest::Client,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

impl CloudinaryStorage {
    pub fn new(config: CloudinaryConfig, http_timeout: Duration) -> anyhow::Result<Self> {
        if config.cloud_name.is_empty() || config.api_key.is_empty() || config.api_secret.is_empty() {
            anyhow::bail!("Cloudinary cloud name, API key and API secret are all required");
        }

        let http_client = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed building storage HTTP client: {e}"))?;

        tracing::info!(cloud_name = %config.cloud_name, "Using Cloudinary attachment storage");

        Ok(Self {
            http_client,
            config,
        })
    }

    fn endpoint(&self, action: &str) -> String {
        // PDFs are accepted by the image pipeline, so one resource type covers the allow-list
        format!("{}/{}/image/{}", API_BASE, self.config.cloud_name, action)
    }

    async fn upstream_error(response: reqwest::Response) -> StorageError {
        let status = response.status();
        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.error.message)
            .unwrap_or_else(|_| "no error detail".to_string());

        StorageError::Upstream(format!("status {status}: {message}"))
    }
}

/// Signature over `params` as Cloudinary expects it
///
/// Parameters are sorted by name, joined as `k=v` with `&`, the secret is
/// appended and the whole string is hashed with SHA-256.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn transport_error(e: reqwest::Error) -> StorageError {
    if e.is_timeout() {
        StorageError::Upstream("request to storage provider timed out".to_string())
    } else {
        StorageError::Upstream(format!("request failed: {e}"))
    }
}

#[async_trait]
impl StorageBackend for CloudinaryStorage {
    fn name(&self) -> &'static str {
        "cloudinary"
    }

    async fn store(
        &self,
        key_hint: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<StoredObject, StorageError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let public_id = Uuid::new_v4().to_string();

        let signed = [
            ("folder", UPLOAD_FOLDER.to_string()),
            ("public_id", public_id.clone()),
            ("timestamp", timestamp.clone()),
        ];
        let signature = sign_params(&signed, &self.config.api_secret);

        let file_part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(key_hint.to_string())
            .mime_str(content_type)
            .map_err(|e| StorageError::Rejected(format!("Invalid content type: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("api_key", self.config.api_key.clone())
            .text("folder", UPLOAD_FOLDER)
            .text("public_id", public_id)
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .http_client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Upstream(format!("invalid upload response: {e}")))?;

        tracing::debug!(public_id = %uploaded.public_id, "Uploaded attachment to Cloudinary");

        Ok(StoredObject {
            locator: uploaded.secure_url,
            provider_id: uploaded.public_id,
        })
    }

    async fn delete(&self, provider_id: &str) -> Result<(), StorageError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signed = [
            ("public_id", provider_id.to_string()),
            ("timestamp", timestamp.clone()),
        ];
        let signature = sign_params(&signed, &self.config.api_secret);

        let response = self
            .http_client
            .post(self.endpoint("destroy"))
            .form(&[
                ("public_id", provider_id),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("signature_algorithm", "sha256"),
                ("signature", signature.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let destroyed: DestroyResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Upstream(format!("invalid destroy response: {e}")))?;

        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(StorageError::Upstream(format!("destroy returned '{other}'"))),
        }
    }
}
