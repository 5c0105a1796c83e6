//! Value objects, entities, and events for the download job domain.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Opaque 128-bit job identifier, globally unique.
pub type JobId = Uuid;

/// Lifecycle state of a [`DownloadJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job has been created but work has not started.
    Pending,
    /// Job is actively being worked by the extractor/download pipeline.
    Processing,
    /// Job finished successfully and an artifact is available.
    Completed,
    /// Job finished unsuccessfully.
    Failed,
}

impl JobStatus {
    /// Terminal states (`Completed`, `Failed`) cannot transition further.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the job is currently being worked.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Stable lowercase wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress snapshot for an in-flight job.
///
/// Immutable; every mutation produces a new value via one of the named
/// constructors below rather than field assignment, mirroring the
/// percentage/phase pairs the extractor reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Completion percentage, always in `[0, 100]`.
    pub percentage: u8,
    /// Human-readable phase label (e.g. `"downloading"`, `"completed"`).
    pub phase: String,
    /// Current transfer speed in bytes/sec, when known.
    pub speed: Option<f64>,
    /// Estimated seconds remaining, when known.
    pub eta_seconds: Option<u64>,
}

impl JobProgress {
    fn new(percentage: u8, phase: impl Into<String>) -> Self {
        Self {
            percentage,
            phase: phase.into(),
            speed: None,
            eta_seconds: None,
        }
    }

    /// Progress for a newly created job.
    #[must_use]
    pub fn initial() -> Self {
        Self::new(0, "pending")
    }

    /// Progress immediately after a job transitions to `PROCESSING`.
    #[must_use]
    pub fn metadata_extraction() -> Self {
        Self::new(0, "metadata_extraction")
    }

    /// Progress while the extractor is transferring bytes.
    ///
    /// `percentage` is clamped to `[0, 100]`; callers computing the
    /// download-phase clamp described in the extractor adapter should do so
    /// before calling this constructor, since this constructor itself only
    /// guards against out-of-range values, not against the `[10, 95]`
    /// business-level clamp.
    #[must_use]
    pub fn downloading(percentage: u8, speed: Option<f64>, eta_seconds: Option<u64>) -> Self {
        Self {
            percentage: percentage.min(100),
            phase: "downloading".to_string(),
            speed,
            eta_seconds,
        }
    }

    /// Progress while a post-processing (e.g. container conversion) step runs.
    #[must_use]
    pub fn processing(percentage: u8) -> Self {
        Self::new(percentage.min(100), "processing")
    }

    /// Terminal progress for a completed job: forced to `(100, "completed")`.
    #[must_use]
    pub fn completed() -> Self {
        Self::new(100, "completed")
    }
}

/// URL-safe, cryptographically random download token, always at least 32
/// characters, restricted to the alphanumeric + `-`/`_` alphabet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadToken(String);

impl DownloadToken {
    const MIN_LENGTH: usize = 32;

    /// Validate and wrap an existing token string (e.g. read back from storage).
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidValue`] if `value` is shorter than 32
    /// characters or contains a character outside `[A-Za-z0-9_-]`.
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.len() < Self::MIN_LENGTH {
            return Err(DomainError::InvalidValue {
                field: "download_token",
                reason: format!("must be at least {} characters", Self::MIN_LENGTH),
            });
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::InvalidValue {
                field: "download_token",
                reason: "must contain only alphanumeric characters, '-', or '_'".to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Generate a fresh token from a cryptographically secure source.
    ///
    /// Produces the base64url (no padding) encoding of 32 random bytes,
    /// which is 43 characters long and, by construction, restricted to the
    /// required alphabet.
    #[must_use]
    pub fn generate() -> Self {
        use base64::Engine as _;
        use rand::RngCore as _;

        let mut bytes = [0_u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
        Self(encoded)
    }

    /// Borrow the underlying token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DownloadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated format selector string (e.g. `"best"`, `"137+140"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatId(String);

impl FormatId {
    /// Validate and wrap a format selector.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidValue`] if `value` is empty.
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidValue {
                field: "format_id",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Borrow the underlying selector string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Domain events emitted by job-lifecycle transitions.
///
/// Every variant carries `occurred_at`, set at construction time, and
/// serializes to a self-describing tagged map for the event bus and
/// client-push layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A job transitioned from `PENDING` to `PROCESSING`.
    JobStarted {
        /// Job identifier.
        job_id: JobId,
        /// Source URL being processed.
        url: String,
        /// Requested format selector.
        format_id: String,
        /// Timestamp the transition occurred.
        occurred_at: DateTime<Utc>,
    },
    /// A job's progress was updated while `PROCESSING`.
    JobProgressUpdated {
        /// Job identifier.
        job_id: JobId,
        /// Updated progress snapshot.
        progress: JobProgress,
        /// Timestamp the update occurred.
        occurred_at: DateTime<Utc>,
    },
    /// A job completed successfully.
    JobCompleted {
        /// Job identifier.
        job_id: JobId,
        /// Download URL for the completed artifact.
        download_url: String,
        /// Expiry timestamp for the download URL.
        expire_at: DateTime<Utc>,
        /// Timestamp the completion occurred.
        occurred_at: DateTime<Utc>,
    },
    /// A job failed.
    JobFailed {
        /// Job identifier.
        job_id: JobId,
        /// Human-readable error message.
        error_message: String,
        /// Stable error category identifier.
        error_category: String,
        /// Timestamp the failure occurred.
        occurred_at: DateTime<Utc>,
    },
    /// A job was cancelled by client request.
    JobCancelled {
        /// Job identifier.
        job_id: JobId,
        /// Timestamp the cancellation occurred.
        occurred_at: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// The job identifier every variant carries.
    #[must_use]
    pub const fn job_id(&self) -> JobId {
        match self {
            Self::JobStarted { job_id, .. }
            | Self::JobProgressUpdated { job_id, .. }
            | Self::JobCompleted { job_id, .. }
            | Self::JobFailed { job_id, .. }
            | Self::JobCancelled { job_id, .. } => *job_id,
        }
    }

    /// Machine-friendly discriminator matching the `type` serde tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::JobStarted { .. } => "job_started",
            Self::JobProgressUpdated { .. } => "job_progress_updated",
            Self::JobCompleted { .. } => "job_completed",
            Self::JobFailed { .. } => "job_failed",
            Self::JobCancelled { .. } => "job_cancelled",
        }
    }
}

/// Aggregate root representing a single download request's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    /// Globally unique job identifier.
    pub job_id: JobId,
    /// Source URL being processed.
    pub url: String,
    /// Requested format selector.
    pub format_id: FormatId,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Current progress snapshot.
    pub progress: JobProgress,
    /// Creation timestamp; immutable after construction.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent mutation; monotonically non-decreasing.
    pub updated_at: DateTime<Utc>,
    /// Human-readable failure description, set only on failure.
    pub error_message: Option<String>,
    /// Stable error category identifier, set only on failure.
    pub error_category: Option<String>,
    /// Download URL, set only on completion.
    pub download_url: Option<String>,
    /// Download token, set only on completion.
    pub download_token: Option<DownloadToken>,
    /// Expiry timestamp for the download URL, set only on completion.
    pub expire_at: Option<DateTime<Utc>>,
}

impl DownloadJob {
    /// Construct a new `PENDING` job with initial progress.
    #[must_use]
    pub fn create(url: impl Into<String>, format_id: FormatId, now: DateTime<Utc>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            url: url.into(),
            format_id,
            status: JobStatus::Pending,
            progress: JobProgress::initial(),
            created_at: now,
            updated_at: now,
            error_message: None,
            error_category: None,
            download_url: None,
            download_token: None,
            expire_at: None,
        }
    }

    /// Transition to `PROCESSING`.
    ///
    /// Idempotent: if already `PROCESSING`, returns `Ok(None)` and leaves the
    /// job unchanged (no event, `updated_at` untouched).
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::JobStateError`] if the job is `COMPLETED` or
    /// `FAILED`.
    pub fn start(&mut self, now: DateTime<Utc>) -> DomainResult<Option<DomainEvent>> {
        match self.status {
            JobStatus::Processing => Ok(None),
            JobStatus::Pending => {
                self.status = JobStatus::Processing;
                self.progress = JobProgress::metadata_extraction();
                self.updated_at = now;
                Ok(Some(DomainEvent::JobStarted {
                    job_id: self.job_id,
                    url: self.url.clone(),
                    format_id: self.format_id.as_str().to_string(),
                    occurred_at: now,
                }))
            }
            JobStatus::Completed | JobStatus::Failed => Err(DomainError::JobStateError {
                state: self.status.as_str(),
                action: "start",
            }),
        }
    }

    /// Update progress while `PROCESSING`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::JobStateError`] if the job is not `PROCESSING`.
    pub fn update_progress(
        &mut self,
        progress: JobProgress,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != JobStatus::Processing {
            return Err(DomainError::JobStateError {
                state: self.status.as_str(),
                action: "update progress for",
            });
        }
        self.progress = progress;
        self.updated_at = now;
        Ok(())
    }

    /// Mark the job `COMPLETED`, forcing progress to `(100, "completed")`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::JobStateError`] if the job is not `PROCESSING`.
    pub fn complete(
        &mut self,
        download_url: impl Into<String>,
        download_token: DownloadToken,
        expire_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<DomainEvent> {
        if self.status != JobStatus::Processing {
            return Err(DomainError::JobStateError {
                state: self.status.as_str(),
                action: "complete",
            });
        }
        self.status = JobStatus::Completed;
        self.progress = JobProgress::completed();
        let download_url = download_url.into();
        self.download_url = Some(download_url.clone());
        self.download_token = Some(download_token);
        self.expire_at = Some(expire_at);
        self.updated_at = now;
        Ok(DomainEvent::JobCompleted {
            job_id: self.job_id,
            download_url,
            expire_at,
            occurred_at: now,
        })
    }

    /// Mark the job `FAILED`. Always legal while the job exists, and always
    /// overwrites any prior error.
    pub fn fail(
        &mut self,
        error_message: impl Into<String>,
        error_category: Option<&'static str>,
        now: DateTime<Utc>,
    ) -> DomainEvent {
        self.status = JobStatus::Failed;
        let error_message = error_message.into();
        self.error_message = Some(error_message.clone());
        self.error_category = error_category.map(str::to_string);
        self.updated_at = now;
        DomainEvent::JobFailed {
            job_id: self.job_id,
            error_message,
            error_category: error_category.unwrap_or("system_error").to_string(),
            occurred_at: now,
        }
    }

    /// Whether the job is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the job is actively processing.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Entity representing a registered, downloadable artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadedFile {
    /// Token authorizing access to this file.
    pub token: DownloadToken,
    /// Storage-relative path to the bytes.
    pub file_path: String,
    /// Owning job identifier.
    pub job_id: JobId,
    /// Display filename presented to the client.
    pub filename: String,
    /// Size in bytes, when known.
    pub filesize: Option<u64>,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp; always strictly greater than `created_at`.
    pub expires_at: DateTime<Utc>,
}

impl DownloadedFile {
    /// Construct a new file registration.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidValue`] if `expires_at <= created_at`.
    pub fn register(
        token: DownloadToken,
        file_path: impl Into<String>,
        job_id: JobId,
        filename: impl Into<String>,
        filesize: Option<u64>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if expires_at <= created_at {
            return Err(DomainError::InvalidValue {
                field: "expires_at",
                reason: "must be strictly after created_at".to_string(),
            });
        }
        Ok(Self {
            token,
            file_path: file_path.into(),
            job_id,
            filename: filename.into(),
            filesize,
            created_at,
            expires_at,
        })
    }

    /// Whether this entry's TTL has elapsed as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Immutable snapshot of a terminal job, kept in the post-mortem archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobArchive {
    /// Archived job identifier.
    pub job_id: JobId,
    /// Source URL that was processed.
    pub url: String,
    /// Requested format selector.
    pub format_id: String,
    /// Terminal status (`completed` or `failed`).
    pub status: JobStatus,
    /// Original creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp the job reached its terminal state.
    pub completed_at: DateTime<Utc>,
    /// Timestamp the archive record was written.
    pub archived_at: DateTime<Utc>,
    /// Failure message, when the job failed.
    pub error_message: Option<String>,
    /// Failure category, when the job failed.
    pub error_category: Option<String>,
    /// Download token, when the job completed.
    pub download_token: Option<String>,
}

impl JobArchive {
    /// Snapshot a terminal job into an archive record.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::JobStateError`] if `job` is not terminal.
    pub fn from_job(job: &DownloadJob, archived_at: DateTime<Utc>) -> DomainResult<Self> {
        if !job.is_terminal() {
            return Err(DomainError::JobStateError {
                state: job.status.as_str(),
                action: "archive",
            });
        }
        Ok(Self {
            job_id: job.job_id,
            url: job.url.clone(),
            format_id: job.format_id.as_str().to_string(),
            status: job.status,
            created_at: job.created_at,
            completed_at: job.updated_at,
            archived_at,
            error_message: job.error_message.clone(),
            error_category: job.error_category.clone(),
            download_token: job.download_token.as_ref().map(DownloadToken::to_string),
        })
    }
}

/// Parsed client source address used as the rate-limiting tenant key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientIp(IpAddr);

impl ClientIp {
    /// Parse a client address from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidValue`] if `value` is not a valid IPv4
    /// or IPv6 address.
    pub fn parse(value: &str) -> DomainResult<Self> {
        value
            .parse::<IpAddr>()
            .map(Self)
            .map_err(|_| DomainError::InvalidValue {
                field: "client_ip",
                reason: format!("{value:?} is not a valid IPv4 or IPv6 address"),
            })
    }

    /// Construct directly from a parsed [`IpAddr`].
    #[must_use]
    pub const fn from_addr(addr: IpAddr) -> Self {
        Self(addr)
    }

    /// Canonical string form of the address.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.0.to_string()
    }

    /// First 16 hex characters of the SHA-256 digest of the canonical form.
    ///
    /// Used as the storage-key component so raw client IPs never appear in
    /// persisted rate-limit keys.
    #[must_use]
    pub fn hash_for_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical().as_bytes());
        let digest = hasher.finalize();
        digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
    }

    /// Whether this address appears (by canonical string match) in `whitelist`.
    #[must_use]
    pub fn is_whitelisted(&self, whitelist: &[String]) -> bool {
        let canonical = self.canonical();
        whitelist.iter().any(|entry| entry.trim() == canonical)
    }
}

impl fmt::Display for ClientIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single configured rate-limit dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum admitted count within the window.
    pub limit: u32,
    /// Window length in seconds.
    pub window_seconds: u64,
    /// Label identifying this dimension, e.g. `"daily_video-only"`.
    pub limit_type: String,
}

impl RateLimit {
    /// Construct a new rate limit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidValue`] if `limit` or `window_seconds`
    /// is zero.
    pub fn new(
        limit: u32,
        window_seconds: u64,
        limit_type: impl Into<String>,
    ) -> DomainResult<Self> {
        if limit == 0 {
            return Err(DomainError::InvalidValue {
                field: "limit",
                reason: "must be greater than zero".to_string(),
            });
        }
        if window_seconds == 0 {
            return Err(DomainError::InvalidValue {
                field: "window_seconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            limit,
            window_seconds,
            limit_type: limit_type.into(),
        })
    }

    /// Whether `limit_type` denotes a calendar-day window.
    #[must_use]
    pub fn is_daily(&self) -> bool {
        self.limit_type.starts_with("daily")
    }

    /// Whether `limit_type` denotes an hour-aligned window.
    #[must_use]
    pub fn is_hourly(&self) -> bool {
        self.limit_type.contains("hourly")
    }
}

/// Short-lived projection of a rate limit's current counter state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntity {
    /// Hashed client key the counter is scoped to.
    pub client_key: String,
    /// Limit dimension label.
    pub limit_type: String,
    /// Current counter value (post-increment, when returned by an increment call).
    pub current_count: u32,
    /// Configured ceiling.
    pub limit: u32,
    /// Timestamp at which the counter resets.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitEntity {
    /// Whether the counter has reached or exceeded the configured ceiling.
    #[must_use]
    pub const fn is_exceeded(&self) -> bool {
        self.current_count >= self.limit
    }

    /// Remaining admissions before the limit is reached, floored at zero.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.current_count)
    }
}

/// Video format bucket derived from the codec pair present on a raw format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatType {
    /// Both a video and an audio codec are present.
    VideoAudio,
    /// Only a video codec is present.
    VideoOnly,
    /// Only an audio codec is present.
    AudioOnly,
}

impl FormatType {
    /// Derive the bucket from raw codec fields as reported by the extractor.
    ///
    /// Mirrors the extractor's own `"none"` sentinel for an absent codec.
    #[must_use]
    pub fn from_codecs(video_codec: Option<&str>, audio_codec: Option<&str>) -> Self {
        let has_video = matches!(video_codec, Some(codec) if codec != "none" && !codec.is_empty());
        let has_audio = matches!(audio_codec, Some(codec) if codec != "none" && !codec.is_empty());
        if has_video && has_audio {
            Self::VideoAudio
        } else if has_audio && !has_video {
            Self::AudioOnly
        } else {
            Self::VideoOnly
        }
    }
}

/// Metadata describing a source video, independent of any particular format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Platform-assigned video identifier.
    pub id: String,
    /// Video title.
    pub title: String,
    /// Uploader/channel display name.
    pub uploader: String,
    /// Duration in seconds.
    pub duration_seconds: u64,
    /// Thumbnail URL.
    pub thumbnail_url: String,
    /// Source URL this metadata was extracted from.
    pub source_url: String,
    /// Timestamp metadata was extracted.
    pub extracted_at: DateTime<Utc>,
}

impl VideoMetadata {
    /// Construct metadata, validating required fields.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidValue`] if `id` or `title` is empty.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        uploader: impl Into<String>,
        duration_seconds: u64,
        thumbnail_url: impl Into<String>,
        source_url: impl Into<String>,
        extracted_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let id = id.into();
        let title = title.into();
        if id.is_empty() {
            return Err(DomainError::InvalidValue {
                field: "id",
                reason: "video id is required".to_string(),
            });
        }
        if title.is_empty() {
            return Err(DomainError::InvalidValue {
                field: "title",
                reason: "video title is required".to_string(),
            });
        }
        Ok(Self {
            id,
            title,
            uploader: uploader.into(),
            duration_seconds,
            thumbnail_url: thumbnail_url.into(),
            source_url: source_url.into(),
            extracted_at,
        })
    }
}

/// A single selectable encoding/quality option for a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFormat {
    /// Extractor-assigned format identifier (the format selector value).
    pub format_id: String,
    /// Container extension (e.g. `"mp4"`).
    pub extension: String,
    /// Human-readable resolution string (e.g. `"1920x1080"`, `"audio only"`).
    pub resolution: String,
    /// Pixel height, or 0 when unknown.
    pub height: u32,
    /// Pixel width, when known.
    pub width: Option<u32>,
    /// Size in bytes, when known or estimable.
    pub filesize: Option<u64>,
    /// Raw video codec string, when present.
    pub video_codec: Option<String>,
    /// Raw audio codec string, when present.
    pub audio_codec: Option<String>,
    /// Derived quality label (e.g. `"Great"`).
    pub quality_label: String,
    /// Free-text note from the extractor.
    pub format_note: String,
    /// Derived video/audio codec bucket.
    pub format_type: FormatType,
}

impl VideoFormat {
    /// Derive the quality label used in client listings from `height`.
    #[must_use]
    pub const fn quality_label_for_height(height: u32) -> &'static str {
        if height >= 2160 {
            "Ultra"
        } else if height >= 1440 {
            "Excellent"
        } else if height >= 1080 {
            "Great"
        } else if height >= 720 {
            "Good"
        } else {
            "Standard"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn create_job_is_pending_with_initial_progress() {
        let job = DownloadJob::create("https://example.test/v/X", FormatId::parse("best").unwrap(), now());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress.percentage, 0);
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn start_transitions_pending_to_processing_and_emits_event() {
        let mut job = DownloadJob::create("u", FormatId::parse("best").unwrap(), now());
        let event = job.start(now()).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(matches!(event, Some(DomainEvent::JobStarted { .. })));
    }

    #[test]
    fn start_twice_is_idempotent_no_op() {
        let mut job = DownloadJob::create("u", FormatId::parse("best").unwrap(), now());
        job.start(now()).unwrap();
        let updated_after_first = job.updated_at;
        let event = job.start(now() + chrono::Duration::seconds(5)).unwrap();
        assert!(event.is_none());
        assert_eq!(job.updated_at, updated_after_first);
    }

    #[test]
    fn start_from_terminal_state_errors() {
        let mut job = DownloadJob::create("u", FormatId::parse("best").unwrap(), now());
        job.start(now()).unwrap();
        job.fail("boom", Some("system_error"), now());
        let err = job.start(now()).unwrap_err();
        assert!(matches!(err, DomainError::JobStateError { .. }));
    }

    #[test]
    fn update_progress_requires_processing_state() {
        let mut job = DownloadJob::create("u", FormatId::parse("best").unwrap(), now());
        let err = job
            .update_progress(JobProgress::downloading(50, None, None), now())
            .unwrap_err();
        assert!(matches!(err, DomainError::JobStateError { .. }));
    }

    #[test]
    fn complete_forces_terminal_progress_and_fields() {
        let mut job = DownloadJob::create("u", FormatId::parse("best").unwrap(), now());
        job.start(now()).unwrap();
        let token = DownloadToken::generate();
        let expires = now() + chrono::Duration::minutes(10);
        job.complete("https://dl/x", token.clone(), expires, now()).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, JobProgress::completed());
        assert_eq!(job.download_token, Some(token));
    }

    #[test]
    fn fail_is_always_legal_and_overwrites_prior_error() {
        let mut job = DownloadJob::create("u", FormatId::parse("best").unwrap(), now());
        job.fail("first", Some("system_error"), now());
        job.fail("second", Some("invalid_url"), now());
        assert_eq!(job.error_message.as_deref(), Some("second"));
        assert_eq!(job.error_category.as_deref(), Some("invalid_url"));
    }

    #[test]
    fn download_token_generate_meets_length_and_alphabet() {
        let token = DownloadToken::generate();
        assert!(token.as_str().len() >= 32);
        assert!(DownloadToken::parse(token.as_str().to_string()).is_ok());
    }

    #[test]
    fn download_token_rejects_short_or_foreign_alphabet() {
        assert!(DownloadToken::parse("short").is_err());
        assert!(DownloadToken::parse("a".repeat(40) + "!").is_err());
    }

    #[test]
    fn downloaded_file_rejects_non_future_expiry() {
        let err = DownloadedFile::register(
            DownloadToken::generate(),
            "job/file.mp4",
            Uuid::new_v4(),
            "file.mp4",
            None,
            now(),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidValue { .. }));
    }

    #[test]
    fn job_archive_requires_terminal_job() {
        let job = DownloadJob::create("u", FormatId::parse("best").unwrap(), now());
        let err = JobArchive::from_job(&job, now()).unwrap_err();
        assert!(matches!(err, DomainError::JobStateError { .. }));
    }

    #[test]
    fn client_ip_hash_is_sixteen_hex_chars() {
        let ip = ClientIp::parse("203.0.113.1").unwrap();
        let hash = ip.hash_for_key();
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn client_ip_whitelist_matches_exact_canonical_form() {
        let ip = ClientIp::parse("10.0.0.1").unwrap();
        assert!(ip.is_whitelisted(&["10.0.0.1".to_string()]));
        assert!(!ip.is_whitelisted(&["10.0.0.2".to_string()]));
    }

    #[test]
    fn rate_limit_entity_remaining_floors_at_zero() {
        let entity = RateLimitEntity {
            client_key: "abc".into(),
            limit_type: "daily_total".into(),
            current_count: 12,
            limit: 10,
            reset_at: now(),
        };
        assert!(entity.is_exceeded());
        assert_eq!(entity.remaining(), 0);
    }

    #[test]
    fn format_type_from_codecs_classifies_correctly() {
        assert_eq!(
            FormatType::from_codecs(Some("avc1"), Some("mp4a")),
            FormatType::VideoAudio
        );
        assert_eq!(FormatType::from_codecs(Some("none"), Some("mp4a")), FormatType::AudioOnly);
        assert_eq!(FormatType::from_codecs(Some("avc1"), Some("none")), FormatType::VideoOnly);
    }

    #[test]
    fn quality_label_thresholds_match_spec() {
        assert_eq!(VideoFormat::quality_label_for_height(2160), "Ultra");
        assert_eq!(VideoFormat::quality_label_for_height(1440), "Excellent");
        assert_eq!(VideoFormat::quality_label_for_height(1080), "Great");
        assert_eq!(VideoFormat::quality_label_for_height(720), "Good");
        assert_eq!(VideoFormat::quality_label_for_height(360), "Standard");
    }
}
