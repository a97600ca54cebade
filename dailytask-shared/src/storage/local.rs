//! Local disk storage under a single upload directory.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{extension_for_mime, StorageBackend, StorageError, StoredObject};

/// Public path prefix under which stored files are served
pub const UPLOADS_ROUTE: &str = "/uploads";

pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    /// Creates the directory if needed
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        tracing::info!(path = %root.display(), "Using local attachment storage");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Whether a client-supplied file name is a plain single component
///
/// Rejects separators, `..`, NUL and leading dots so a name can never
/// escape the upload directory.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
}

#[async_trait]
impl StorageBackend for LocalDiskStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn store(
        &self,
        _key_hint: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<StoredObject, StorageError> {
        let ext = extension_for_mime(content_type)
            .ok_or_else(|| StorageError::Rejected(format!("Unsupported file type: {content_type}")))?;

        // Generated names only; the original file name stays in the descriptor
        let filename = format!("{}.{}", Uuid::new_v4(), ext);
        let path = self.root.join(&filename);

        tokio::fs::write(&path, &data).await?;

        tracing::debug!(file = %filename, bytes = data.len(), "Stored attachment on disk");

        Ok(StoredObject {
            locator: format!("{UPLOADS_ROUTE}/{filename}"),
            provider_id: filename,
        })
    }

    async fn delete(&self, provider_id: &str) -> Result<(), StorageError> {
        let Some(path) = self.local_path(provider_id) else {
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn local_path(&self, filename: &str) -> Option<PathBuf> {
        is_safe_filename(filename).then(|| self.root.join(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("dailytask-storage-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_safe_filenames() {
        assert!(is_safe_filename("3f2a.png"));
        assert!(!is_safe_filename("../etc/passwd"));
        assert!(!is_safe_filename("a/b.png"));
        assert!(!is_safe_filename("a\\b.png"));
        assert!(!is_safe_filename(".env"));
        assert!(!is_safe_filename(""));
        assert!(!is_safe_filename("x..png"));
    }

    #[tokio::test]
    async fn test_store_and_delete() {
        let root = temp_root();
        let storage = LocalDiskStorage::new(&root).await.unwrap();

        let stored = storage
            .store("scan.pdf", "application/pdf", Bytes::from_static(b"%PDF-1.4"))
            .await
            .unwrap();

        assert!(stored.locator.starts_with("/uploads/"));
        assert!(stored.provider_id.ends_with(".pdf"));

        let path = storage.local_path(&stored.provider_id).unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1.4");

        storage.delete(&stored.provider_id).await.unwrap();
        assert!(!path.exists());

        // Deleting twice is fine
        storage.delete(&stored.provider_id).await.unwrap();

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_unknown_type_and_unsafe_paths() {
        let root = temp_root();
        let storage = LocalDiskStorage::new(&root).await.unwrap();

        let result = storage
            .store("evil.exe", "application/x-msdownload", Bytes::from_static(b"MZ"))
            .await;
        assert!(matches!(result, Err(StorageError::Rejected(_))));

        assert!(storage.local_path("../secret").is_none());

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
