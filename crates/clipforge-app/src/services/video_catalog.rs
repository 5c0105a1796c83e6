//! [`VideoCatalog`] backed by the extractor's probe step and the domain
//! format-mapping service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use clipforge_api::VideoCatalog;
use clipforge_core::{DomainError, DomainResult, VideoFormat, VideoMetadata, VideoProcessor};
use clipforge_extractor::{Extractor, YtDlpExtractor};

pub(crate) struct VideoCatalogService {
    processor: Arc<VideoProcessor>,
    extractor: Arc<YtDlpExtractor>,
}

impl VideoCatalogService {
    pub(crate) const fn new(processor: Arc<VideoProcessor>, extractor: Arc<YtDlpExtractor>) -> Self {
        Self {
            processor,
            extractor,
        }
    }
}

#[async_trait]
impl VideoCatalog for VideoCatalogService {
    async fn resolutions(&self, url: &str) -> DomainResult<(VideoMetadata, Vec<VideoFormat>)> {
        if !self.processor.validate_url(url) {
            return Err(DomainError::InvalidValue {
                field: "url",
                reason: "must be an absolute http(s) URL with a host".to_string(),
            });
        }

        let raw = self
            .extractor
            .probe(url)
            .await
            .map_err(|error| DomainError::MetadataExtraction {
                source: Box::new(error),
            })?;

        let metadata = self.processor.extract_metadata(&raw, Utc::now())?;
        let formats = self.processor.available_formats(&raw);
        let client_formats = self.processor.formats_to_client_list(&formats);
        Ok((metadata, client_formats))
    }
}
