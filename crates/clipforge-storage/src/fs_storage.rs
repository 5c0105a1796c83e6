//! Filesystem-backed [`FileStorageRepository`].
//!
//! Every path accepted by these methods is relative and is joined onto a
//! fixed root; `..` components are rejected outright rather than resolved,
//! since the paths stored alongside [`DownloadedFile`](clipforge_core::DownloadedFile)
//! are generated by this service, never echoed back from an untrusted client.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use clipforge_core::{DomainError, DomainResult, FileStorageRepository};
use tracing::warn;

use crate::error::FsStorageError;

/// Stores completed download artifacts under a fixed root directory.
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    base_path: String,
}

impl FilesystemStorage {
    /// Construct a storage adapter rooted at `base_path`.
    ///
    /// Does not create the directory; call [`Self::ensure_base_path`] at
    /// startup if the directory might not yet exist.
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Create the base directory, and any missing parents, if absent.
    ///
    /// # Errors
    ///
    /// Returns [`FsStorageError::Io`] if directory creation fails.
    pub async fn ensure_base_path(&self) -> Result<(), FsStorageError> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|source| FsStorageError::io("create_dir_all", &self.base_path, source))
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, FsStorageError> {
        let relative_path = Path::new(relative);
        if relative_path
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::RootDir))
        {
            return Err(FsStorageError::PathTraversal {
                requested: relative.to_string(),
            });
        }
        Ok(Path::new(&self.base_path).join(relative_path))
    }
}

fn into_domain<T>(result: Result<T, FsStorageError>) -> DomainResult<T> {
    result.map_err(|error| DomainError::PersistenceFailure(error.to_string()))
}

#[async_trait]
impl FileStorageRepository for FilesystemStorage {
    async fn save(&self, path: &str, bytes: &[u8]) -> DomainResult<bool> {
        let resolved = into_domain(self.resolve(path))?;
        if let Some(parent) = resolved.parent() {
            if let Err(source) = tokio::fs::create_dir_all(parent).await {
                return into_domain(Err(FsStorageError::io("create_dir_all", parent, source)));
            }
        }
        match tokio::fs::write(&resolved, bytes).await {
            Ok(()) => Ok(true),
            Err(source) => into_domain(Err(FsStorageError::io("write", resolved, source))),
        }
    }

    async fn get(&self, path: &str) -> DomainResult<Option<Vec<u8>>> {
        let resolved = into_domain(self.resolve(path))?;
        match tokio::fs::read(&resolved).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => into_domain(Err(FsStorageError::io("read", resolved, source))),
        }
    }

    async fn delete(&self, path: &str) -> DomainResult<bool> {
        let resolved = into_domain(self.resolve(path))?;
        match tokio::fs::remove_file(&resolved).await {
            Ok(()) => Ok(true),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => {
                warn!(path = %resolved.display(), %source, "failed to delete stored file");
                into_domain(Err(FsStorageError::io("remove_file", resolved, source)))
            }
        }
    }

    async fn exists(&self, path: &str) -> DomainResult<bool> {
        let resolved = into_domain(self.resolve(path))?;
        Ok(tokio::fs::try_exists(&resolved).await.unwrap_or(false))
    }

    async fn get_size(&self, path: &str) -> DomainResult<Option<u64>> {
        let resolved = into_domain(self.resolve(path))?;
        match tokio::fs::metadata(&resolved).await {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => into_domain(Err(FsStorageError::io("metadata", resolved, source))),
        }
    }

    fn base_path(&self) -> &str {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> (FilesystemStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (
            FilesystemStorage::new(dir.path().to_string_lossy().to_string()),
            dir,
        )
    }

    #[tokio::test]
    async fn save_then_get_round_trips_bytes() {
        let (storage, _dir) = storage();
        storage.save("clip.mp4", b"payload").await.unwrap();
        let bytes = storage.get("clip.mp4").await.unwrap();
        assert_eq!(bytes, Some(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn get_missing_path_returns_none() {
        let (storage, _dir) = storage();
        assert_eq!(storage.get("missing.mp4").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (storage, _dir) = storage();
        storage.save("clip.mp4", b"payload").await.unwrap();
        assert!(storage.delete("clip.mp4").await.unwrap());
        assert!(!storage.delete("clip.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn save_creates_nested_parent_directories() {
        let (storage, _dir) = storage();
        storage
            .save("jobs/abc/clip.mp4", b"payload")
            .await
            .unwrap();
        assert!(storage.exists("jobs/abc/clip.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn get_size_matches_written_length() {
        let (storage, _dir) = storage();
        storage.save("clip.mp4", b"0123456789").await.unwrap();
        assert_eq!(storage.get_size("clip.mp4").await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn rejects_parent_directory_traversal() {
        let (storage, _dir) = storage();
        let err = storage.save("../escape.mp4", b"x").await.unwrap_err();
        assert!(matches!(err, DomainError::PersistenceFailure(_)));
    }
}
