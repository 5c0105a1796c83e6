//! Registers and retrieves downloadable artifacts behind opaque tokens.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{DomainError, DomainResult};
use crate::model::{DownloadToken, DownloadedFile, JobId};
use crate::repository::{FileRepository, FileStorageRepository};

/// Coordinates [`DownloadedFile`] registration, retrieval, and expiry against
/// a [`FileRepository`] (metadata) and [`FileStorageRepository`] (bytes).
pub struct FileManager<R, S> {
    repository: Arc<R>,
    storage: Arc<S>,
}

impl<R, S> FileManager<R, S>
where
    R: FileRepository,
    S: FileStorageRepository,
{
    /// Construct a manager over the given repository and storage backend.
    pub const fn new(repository: Arc<R>, storage: Arc<S>) -> Self {
        Self { repository, storage }
    }

    /// Register a freshly downloaded artifact, persisting its bytes and metadata.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidValue`] if `expires_at <= created_at`, or
    /// propagates storage/repository failures.
    pub async fn register(
        &self,
        job_id: JobId,
        relative_path: impl Into<String>,
        filename: impl Into<String>,
        bytes: &[u8],
        created_at: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> DomainResult<(DownloadedFile, DownloadToken)> {
        let relative_path = relative_path.into();
        self.storage.save(&relative_path, bytes).await?;
        let token = DownloadToken::generate();
        let file = DownloadedFile::register(
            token.clone(),
            relative_path,
            job_id,
            filename,
            Some(bytes.len() as u64),
            created_at,
            created_at + ttl,
        )?;
        self.repository.register(&file).await?;
        Ok((file, token))
    }

    /// Resolve a download token to its bytes, rejecting absent or expired entries.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::FileNotFound`] if the token is unknown, or
    /// [`DomainError::FileExpired`] if its TTL has elapsed.
    pub async fn fetch(&self, token: &DownloadToken) -> DomainResult<(DownloadedFile, Vec<u8>)> {
        let file = self
            .repository
            .find_by_token(token)
            .await?
            .ok_or(DomainError::FileNotFound)?;
        if file.is_expired(Utc::now()) {
            return Err(DomainError::FileExpired);
        }
        let bytes = self
            .storage
            .get(&file.file_path)
            .await?
            .ok_or(DomainError::FileNotFound)?;
        Ok((file, bytes))
    }

    /// Look up the file registered for a job, if any, without reading bytes.
    ///
    /// # Errors
    ///
    /// Propagates repository failures only.
    pub async fn find_by_job(&self, job_id: JobId) -> DomainResult<Option<DownloadedFile>> {
        self.repository.find_by_job_id(job_id).await
    }

    /// Delete both the metadata entry and the underlying bytes for a token.
    ///
    /// Idempotent: deleting an already-absent token is not an error.
    ///
    /// # Errors
    ///
    /// Propagates storage/repository failures.
    pub async fn delete(&self, token: &DownloadToken) -> DomainResult<()> {
        if let Some(file) = self.repository.find_by_token(token).await? {
            self.storage.delete(&file.file_path).await?;
        }
        self.repository.delete_by_token(token).await?;
        Ok(())
    }

    /// List every registration whose TTL has elapsed, for the reaper sweep.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn list_expired(&self) -> DomainResult<Vec<DownloadedFile>> {
        self.repository.list_expired(Utc::now()).await
    }

    /// Delete the metadata entry and bytes for an already-expired file.
    ///
    /// Used by the reaper after [`Self::list_expired`]; does not re-check
    /// expiry, so callers must only pass entries they already know are due.
    ///
    /// # Errors
    ///
    /// Propagates storage/repository failures.
    pub async fn reap(&self, file: &DownloadedFile) -> DomainResult<()> {
        self.storage.delete(&file.file_path).await?;
        self.repository.delete_by_token(&file.token).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct InMemoryFiles {
        by_token: Mutex<HashMap<String, DownloadedFile>>,
    }

    #[async_trait]
    impl FileRepository for InMemoryFiles {
        async fn register(&self, file: &DownloadedFile) -> DomainResult<()> {
            self.by_token
                .lock()
                .unwrap()
                .insert(file.token.as_str().to_string(), file.clone());
            Ok(())
        }

        async fn find_by_token(&self, token: &DownloadToken) -> DomainResult<Option<DownloadedFile>> {
            Ok(self.by_token.lock().unwrap().get(token.as_str()).cloned())
        }

        async fn find_by_job_id(&self, job_id: JobId) -> DomainResult<Option<DownloadedFile>> {
            Ok(self
                .by_token
                .lock()
                .unwrap()
                .values()
                .find(|f| f.job_id == job_id)
                .cloned())
        }

        async fn delete_by_token(&self, token: &DownloadToken) -> DomainResult<bool> {
            Ok(self.by_token.lock().unwrap().remove(token.as_str()).is_some())
        }

        async fn list_expired(&self, now: DateTime<Utc>) -> DomainResult<Vec<DownloadedFile>> {
            Ok(self
                .by_token
                .lock()
                .unwrap()
                .values()
                .filter(|f| f.is_expired(now))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct InMemoryStorage {
        bytes: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl FileStorageRepository for InMemoryStorage {
        async fn save(&self, path: &str, bytes: &[u8]) -> DomainResult<bool> {
            self.bytes.lock().unwrap().insert(path.to_string(), bytes.to_vec());
            Ok(true)
        }

        async fn get(&self, path: &str) -> DomainResult<Option<Vec<u8>>> {
            Ok(self.bytes.lock().unwrap().get(path).cloned())
        }

        async fn delete(&self, path: &str) -> DomainResult<bool> {
            Ok(self.bytes.lock().unwrap().remove(path).is_some())
        }

        async fn exists(&self, path: &str) -> DomainResult<bool> {
            Ok(self.bytes.lock().unwrap().contains_key(path))
        }

        async fn get_size(&self, path: &str) -> DomainResult<Option<u64>> {
            Ok(self.bytes.lock().unwrap().get(path).map(|b| b.len() as u64))
        }

        fn base_path(&self) -> &str {
            "/tmp/test-downloads"
        }
    }

    fn manager() -> FileManager<InMemoryFiles, InMemoryStorage> {
        FileManager::new(
            Arc::new(InMemoryFiles::default()),
            Arc::new(InMemoryStorage::default()),
        )
    }

    #[tokio::test]
    async fn register_then_fetch_round_trips_bytes() {
        let manager = manager();
        let (file, token) = manager
            .register(
                Uuid::new_v4(),
                "jobs/a/video.mp4",
                "video.mp4",
                b"hello",
                Utc::now(),
                chrono::Duration::minutes(10),
            )
            .await
            .unwrap();
        let (fetched, bytes) = manager.fetch(&token).await.unwrap();
        assert_eq!(fetched.token, file.token);
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn fetch_unknown_token_is_not_found() {
        let manager = manager();
        let err = manager.fetch(&DownloadToken::generate()).await.unwrap_err();
        assert!(matches!(err, DomainError::FileNotFound));
    }

    #[tokio::test]
    async fn fetch_expired_entry_errors() {
        let manager = manager();
        let created = Utc::now() - chrono::Duration::minutes(20);
        let (_, token) = manager
            .register(
                Uuid::new_v4(),
                "jobs/b/video.mp4",
                "video.mp4",
                b"data",
                created,
                chrono::Duration::minutes(10),
            )
            .await
            .unwrap();
        let err = manager.fetch(&token).await.unwrap_err();
        assert!(matches!(err, DomainError::FileExpired));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let manager = manager();
        let (_, token) = manager
            .register(
                Uuid::new_v4(),
                "jobs/c/video.mp4",
                "video.mp4",
                b"data",
                Utc::now(),
                chrono::Duration::minutes(10),
            )
            .await
            .unwrap();
        manager.delete(&token).await.unwrap();
        manager.delete(&token).await.unwrap();
        let err = manager.fetch(&token).await.unwrap_err();
        assert!(matches!(err, DomainError::FileNotFound));
    }
}
