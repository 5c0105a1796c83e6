//! Service seams between the HTTP/WebSocket surface and the domain layer.
//!
//! This crate never talks to Postgres or the filesystem directly. Every
//! operation a handler needs is expressed here as a `dyn`-compatible async
//! trait; `clipforge-app` builds the concrete implementations (wrapping
//! [`clipforge_core::service`] types backed by `clipforge-data` and
//! `clipforge-storage`) and injects them at startup via [`AppServices`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clipforge_core::{
    ClientIp, DomainResult, FormatId, JobId, JobStatusInfo, VideoFormat, VideoMetadata,
};

/// Resolves a source URL into metadata and the formats available for download.
#[async_trait]
pub trait VideoCatalog: Send + Sync {
    /// Extract metadata and enumerate the downloadable formats for `url`.
    async fn resolutions(&self, url: &str) -> DomainResult<(VideoMetadata, Vec<VideoFormat>)>;
}

/// Creates, inspects, and cancels download jobs.
#[async_trait]
pub trait JobOrchestrator: Send + Sync {
    /// Submit a new job for `url`/`format_id` on behalf of `client` and return its id.
    ///
    /// `client` is threaded through (rather than dropped once HTTP-level
    /// admission has run) because the format-category rate-limit dimensions
    /// can only be evaluated once the job's format is resolved against the
    /// source, which happens inside the background execution step, well
    /// after the request has been admitted and accepted.
    async fn submit(&self, client: ClientIp, url: String, format_id: FormatId)
    -> DomainResult<JobId>;

    /// Fetch the current status, progress, and download metadata for a job.
    async fn status(&self, job_id: JobId) -> DomainResult<JobStatusInfo>;

    /// Cancel a job. Returns `true` if a job was found and removed.
    async fn cancel(&self, job_id: JobId) -> DomainResult<bool>;
}

/// Serves previously produced files by their download token.
#[async_trait]
pub trait FileDelivery: Send + Sync {
    /// Fetch the file bytes and filename registered under `token`.
    async fn fetch(&self, token: &str) -> DomainResult<(String, Vec<u8>)>;
}

/// Reports whether the service's dependencies (database, storage) are reachable.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Returns `Ok(())` if the service is able to serve traffic.
    async fn check(&self) -> DomainResult<()>;
}

/// Outcome of an admission check against one or more rate-limit dimensions.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// The limit that was evaluated (the tightest one, if several were checked).
    pub limit: u32,
    /// Remaining requests in the current window.
    pub remaining: u32,
    /// When the current window resets.
    pub reset_at: DateTime<Utc>,
    /// Identifier of the dimension that produced this decision, e.g. `daily_total`.
    pub limit_type: String,
}

/// Evaluates API rate limits for an inbound request.
#[async_trait]
pub trait RateLimitGate: Send + Sync {
    /// Check and, if admitted, increment every rate-limit dimension that applies
    /// to `endpoint` for `client`. Returns the decision for the dimension that
    /// is tightest to its limit, or rejects on the first dimension exceeded.
    async fn admit(&self, client: &ClientIp, endpoint: &str) -> RateLimitDecision;
}

/// Bundle of facade implementations an `ApiState` is constructed from.
#[derive(Clone)]
pub struct AppServices {
    /// Metadata and format resolution.
    pub video_catalog: Arc<dyn VideoCatalog>,
    /// Job lifecycle management.
    pub job_orchestrator: Arc<dyn JobOrchestrator>,
    /// File delivery by download token.
    pub file_delivery: Arc<dyn FileDelivery>,
    /// Dependency health reporting.
    pub health_probe: Arc<dyn HealthProbe>,
    /// Rate limit admission.
    pub rate_limit_gate: Arc<dyn RateLimitGate>,
}
