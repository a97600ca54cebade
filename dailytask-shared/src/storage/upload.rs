//! Batch attachment handling for one submission.
//!
//! Every part is validated before anything is stored. Storing is then
//! all-or-nothing: if one store fails (or times out), the objects already
//! written for this batch are deleted again.

use bytes::Bytes;
use std::time::Duration;

use super::{is_allowed_mime, StorageBackend, StorageError};
use crate::models::task::AttachmentDescriptor;

/// Limits applied to uploaded attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Per-file ceiling in bytes
    pub max_file_size: usize,

    pub max_files: usize,

    /// Upper bound on a single store call
    pub store_timeout: Duration,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size: 5 * 1024 * 1024,
            max_files: 5,
            store_timeout: Duration::from_secs(30),
        }
    }
}

impl UploadPolicy {
    /// Checked when a file part starts, before any of its bytes are read
    pub fn check_part(&self, files_so_far: usize, content_type: &str) -> Result<(), StorageError> {
        if files_so_far >= self.max_files {
            return Err(StorageError::Rejected(format!(
                "Too many files: at most {} per task",
                self.max_files
            )));
        }

        if !is_allowed_mime(content_type) {
            return Err(StorageError::Rejected(format!(
                "Unsupported file type '{}': allowed are JPEG, PNG, GIF, WebP and PDF",
                content_type
            )));
        }

        Ok(())
    }

    /// Checked after every chunk so oversized files fail without being buffered
    pub fn check_size(&self, name: &str, bytes_so_far: usize) -> Result<(), StorageError> {
        if bytes_so_far > self.max_file_size {
            return Err(StorageError::Rejected(format!(
                "File '{}' exceeds the {} byte limit",
                name, self.max_file_size
            )));
        }

        Ok(())
    }

    /// Re-checks a fully read batch
    pub fn validate(&self, uploads: &[PendingUpload]) -> Result<(), StorageError> {
        for (index, upload) in uploads.iter().enumerate() {
            self.check_part(index, &upload.content_type)?;
            self.check_size(&upload.name, upload.data.len())?;
        }

        Ok(())
    }
}

/// A validated file waiting to be stored
#[derive(Debug, Clone)]
pub struct PendingUpload {
    /// Original client file name
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Stores every upload or none of them
///
/// Returns the descriptors in input order. On failure, objects stored earlier
/// in the batch are deleted before the error is returned.
pub async fn store_all(
    backend: &dyn StorageBackend,
    uploads: Vec<PendingUpload>,
    policy: &UploadPolicy,
) -> Result<Vec<AttachmentDescriptor>, StorageError> {
    policy.validate(&uploads)?;

    let mut stored: Vec<AttachmentDescriptor> = Vec::with_capacity(uploads.len());

    for upload in uploads {
        let size = upload.data.len() as u64;
        let result = tokio::time::timeout(
            policy.store_timeout,
            backend.store(&upload.name, &upload.content_type, upload.data),
        )
        .await
        .unwrap_or_else(|_| Err(StorageError::Timeout(policy.store_timeout.as_secs())));

        match result {
            Ok(object) => stored.push(AttachmentDescriptor {
                name: upload.name,
                locator: object.locator,
                mime_type: upload.content_type,
                size,
                provider_id: Some(object.provider_id),
            }),
            Err(e) => {
                tracing::warn!(
                    backend = backend.name(),
                    file = %upload.name,
                    stored = stored.len(),
                    error = %e,
                    "Attachment store failed, rolling back batch"
                );
                discard(backend, &stored).await;
                return Err(e);
            }
        }
    }

    Ok(stored)
}

/// Best-effort removal of stored attachments
///
/// Failures are logged and swallowed; the caller is already on an error path.
pub async fn discard(backend: &dyn StorageBackend, attachments: &[AttachmentDescriptor]) {
    for attachment in attachments {
        let Some(provider_id) = attachment.provider_id.as_deref() else {
            continue;
        };

        if let Err(e) = backend.delete(provider_id).await {
            tracing::error!(
                backend = backend.name(),
                provider_id = %provider_id,
                error = %e,
                "Failed to remove orphaned attachment"
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::StoredObject;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory backend that can be told to fail or stall on the n-th store
    #[derive(Default)]
    pub(crate) struct MemoryStorage {
        pub objects: Mutex<Vec<String>>,
        pub fail_on: Option<usize>,
        pub stall_on: Option<usize>,
        calls: AtomicUsize,
    }

    impl MemoryStorage {
        pub fn failing_on(n: usize) -> Self {
            Self {
                fail_on: Some(n),
                ..Default::default()
            }
        }

        pub fn stalling_on(n: usize) -> Self {
            Self {
                stall_on: Some(n),
                ..Default::default()
            }
        }

        pub fn stored(&self) -> Vec<String> {
            self.objects.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StorageBackend for MemoryStorage {
        fn name(&self) -> &'static str {
            "memory"
        }

        async fn store(
            &self,
            key_hint: &str,
            _content_type: &str,
            _data: Bytes,
        ) -> Result<StoredObject, StorageError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(call) {
                return Err(StorageError::Upstream("boom".to_string()));
            }
            if self.stall_on == Some(call) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }

            let id = format!("{call}-{key_hint}");
            self.objects.lock().unwrap().push(id.clone());
            Ok(StoredObject {
                locator: format!("mem://{id}"),
                provider_id: id,
            })
        }

        async fn delete(&self, provider_id: &str) -> Result<(), StorageError> {
            self.objects.lock().unwrap().retain(|id| id != provider_id);
            Ok(())
        }
    }

    pub(crate) fn png(name: &str, len: usize) -> PendingUpload {
        PendingUpload {
            name: name.to_string(),
            content_type: "image/png".to_string(),
            data: Bytes::from(vec![0u8; len]),
        }
    }

    #[test]
    fn test_policy_checks() {
        let policy = UploadPolicy {
            max_file_size: 10,
            max_files: 2,
            ..Default::default()
        };

        assert!(policy.check_part(0, "image/png").is_ok());
        assert!(matches!(
            policy.check_part(0, "application/x-msdownload"),
            Err(StorageError::Rejected(_))
        ));
        assert!(policy.check_part(2, "image/png").is_err());

        assert!(policy.check_size("a.png", 10).is_ok());
        assert!(policy.check_size("a.png", 11).is_err());
    }

    #[tokio::test]
    async fn test_store_all_success() {
        let backend = MemoryStorage::default();
        let descriptors = store_all(
            &backend,
            vec![png("a.png", 3), png("b.png", 4)],
            &UploadPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].name, "a.png");
        assert_eq!(descriptors[1].size, 4);
        assert_eq!(backend.stored().len(), 2);
    }

    #[tokio::test]
    async fn test_store_all_rolls_back_on_failure() {
        let backend = MemoryStorage::failing_on(2);
        let result = store_all(
            &backend,
            vec![png("a.png", 1), png("b.png", 1), png("c.png", 1)],
            &UploadPolicy::default(),
        )
        .await;

        assert!(matches!(result, Err(StorageError::Upstream(_))));
        assert!(backend.stored().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_all_times_out_and_rolls_back() {
        let backend = MemoryStorage::stalling_on(1);
        let policy = UploadPolicy {
            store_timeout: Duration::from_secs(2),
            ..Default::default()
        };

        let result = store_all(&backend, vec![png("a.png", 1), png("b.png", 1)], &policy).await;

        assert!(matches!(result, Err(StorageError::Timeout(2))));
        assert!(backend.stored().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_batch_stores_nothing() {
        let backend = MemoryStorage::default();
        let policy = UploadPolicy {
            max_file_size: 8,
            ..Default::default()
        };

        let result = store_all(&backend, vec![png("a.png", 4), png("big.png", 9)], &policy).await;

        assert!(matches!(result, Err(StorageError::Rejected(_))));
        assert!(backend.stored().is_empty());
    }
}
