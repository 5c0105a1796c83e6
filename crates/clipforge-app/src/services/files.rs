//! [`FileDelivery`] backed by [`clipforge_core::service::file_manager::FileManager`].

use std::sync::Arc;

use async_trait::async_trait;
use clipforge_api::FileDelivery;
use clipforge_core::{DomainError, DomainResult, DownloadToken, FileManager};
use clipforge_data::PgFileRepository;
use clipforge_storage::FilesystemStorage;

pub(crate) struct FileDeliveryService {
    files: Arc<FileManager<PgFileRepository, FilesystemStorage>>,
}

impl FileDeliveryService {
    pub(crate) const fn new(files: Arc<FileManager<PgFileRepository, FilesystemStorage>>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl FileDelivery for FileDeliveryService {
    async fn fetch(&self, token: &str) -> DomainResult<(String, Vec<u8>)> {
        let token = DownloadToken::parse(token.to_string())
            .map_err(|_| DomainError::FileNotFound)?;
        let (file, bytes) = self.files.fetch(&token).await?;
        Ok((file.filename, bytes))
    }
}
