//! Attachment storage.
//!
//! Files arrive with a task submission and are written through a
//! [`StorageBackend`]: local disk for development, Cloudinary in production.
//! [`upload`] holds the all-or-nothing logic that stores a batch and removes
//! what it already stored when a later step fails.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;

pub mod cloudinary;
pub mod local;
pub mod upload;

pub use cloudinary::{CloudinaryConfig, CloudinaryStorage};
pub use local::LocalDiskStorage;
pub use upload::{PendingUpload, UploadPolicy};

/// MIME types accepted as attachments.
pub const ALLOWED_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
];

pub fn is_allowed_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    ALLOWED_MIME_TYPES.contains(&essence.as_str())
}

/// File extension used for stored objects of an allowed type.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase().as_str() {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "application/pdf" => Some("pdf"),
        _ => None,
    }
}

/// Content type served for a stored file name.
pub fn mime_for_filename(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Where a stored object ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// URL or path clients use to fetch the file
    pub locator: String,

    /// Key the backend needs to delete the object later
    pub provider_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The file itself is unacceptable (type or size)
    #[error("{0}")]
    Rejected(String),

    /// The store did not answer within the upload timeout
    #[error("Storage operation timed out after {0} seconds")]
    Timeout(u64),

    /// The remote store answered with an error
    #[error("Storage provider error: {0}")]
    Upstream(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Stores `data` under a generated key derived from `key_hint`
    async fn store(
        &self,
        key_hint: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<StoredObject, StorageError>;

    /// Removes a previously stored object; missing objects are not an error
    async fn delete(&self, provider_id: &str) -> Result<(), StorageError>;

    /// Filesystem path for a stored file name, for backends that serve files
    /// themselves. Returns `None` for remote backends and unsafe names.
    fn local_path(&self, _filename: &str) -> Option<PathBuf> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_allow_list() {
        assert!(is_allowed_mime("image/png"));
        assert!(is_allowed_mime("IMAGE/JPEG"));
        assert!(is_allowed_mime("application/pdf; charset=binary"));
        assert!(!is_allowed_mime("application/x-msdownload"));
        assert!(!is_allowed_mime("text/html"));
        assert!(!is_allowed_mime(""));
    }

    #[test]
    fn test_extension_and_content_type() {
        assert_eq!(extension_for_mime("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for_mime("application/zip"), None);

        assert_eq!(mime_for_filename("a.JPG"), "image/jpeg");
        assert_eq!(mime_for_filename("report.pdf"), "application/pdf");
        assert_eq!(mime_for_filename("noext"), "application/octet-stream");
    }
}
