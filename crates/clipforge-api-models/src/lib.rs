#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Shared HTTP and WebSocket DTOs for the job-orchestration API.
//!
//! These types are the wire contract: request/response bodies, the
//! canonical error shape, and the real-time protocol envelope. Conversions
//! from domain types live here so the mapping stays a single source of
//! truth rather than being duplicated across handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clipforge_core::{DomainError, DomainEvent, ErrorCategory, JobId, JobProgress, JobStatusInfo};

/// Canonical error body returned on every non-2xx response.
///
/// `error_category`, `limit_type`, and `reset_at` are omitted when not
/// applicable (e.g. a plain validation failure has no `limit_type`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Short machine-oriented error label (historically the HTTP reason phrase).
    pub error: String,
    /// Human-readable title for the error category.
    pub title: String,
    /// Human-readable explanation of what went wrong.
    pub message: String,
    /// Suggested next step for the caller.
    pub action: String,
    /// Stable wire error-category identifier, when the error maps to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<String>,
    /// Which rate-limit dimension was exceeded, set only for 429 responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_type: Option<String>,
    /// When the exceeded rate limit resets, set only for 429 responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
}

impl ErrorResponse {
    /// Build the canonical body from a [`DomainError`]'s category.
    #[must_use]
    pub fn from_category(category: ErrorCategory) -> Self {
        let (title, message, action) = category.wire_triple();
        Self {
            error: title.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            action: action.to_string(),
            error_category: Some(category.wire_id().to_string()),
            limit_type: None,
            reset_at: None,
        }
    }

    /// Build the 429 body for a rejected rate-limit admission.
    #[must_use]
    pub fn rate_limited(limit_type: &str, reset_at: DateTime<Utc>) -> Self {
        let mut response = Self::from_category(ErrorCategory::RateLimited);
        response.error = "Rate limit exceeded".to_string();
        response.limit_type = Some(limit_type.to_string());
        response.reset_at = Some(reset_at);
        response
    }
}

impl From<&DomainError> for ErrorResponse {
    fn from(error: &DomainError) -> Self {
        Self::from_category(error.category())
    }
}

/// `POST /api/v1/videos/resolutions` request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoResolutionsRequest {
    /// Source video URL to inspect.
    pub url: String,
}

/// `POST /api/v1/videos/resolutions` 200 response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoResolutionsResponse {
    /// Video-level metadata, independent of format.
    pub meta: VideoMetaDto,
    /// Every selectable format, ordered video+audio, video-only, audio-only.
    pub formats: Vec<VideoFormatDto>,
}

/// Wire projection of [`clipforge_core::VideoMetadata`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoMetaDto {
    /// Platform-assigned video identifier.
    pub id: String,
    /// Video title.
    pub title: String,
    /// Uploader/channel display name.
    pub uploader: String,
    /// Duration in seconds.
    pub duration: u64,
    /// Thumbnail URL.
    pub thumbnail: String,
}

impl From<&clipforge_core::VideoMetadata> for VideoMetaDto {
    fn from(metadata: &clipforge_core::VideoMetadata) -> Self {
        Self {
            id: metadata.id.clone(),
            title: metadata.title.clone(),
            uploader: metadata.uploader.clone(),
            duration: metadata.duration_seconds,
            thumbnail: metadata.thumbnail_url.clone(),
        }
    }
}

/// Wire projection of [`clipforge_core::VideoFormat`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoFormatDto {
    /// Format selector clients pass back as `format_id` when creating a download.
    pub format_id: String,
    /// Container extension, e.g. `"mp4"`.
    pub extension: String,
    /// Human-readable resolution label.
    pub resolution: String,
    /// Size in bytes, when known or estimable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
    /// Derived quality label, e.g. `"Great"`.
    pub quality_label: String,
    /// Free-text note from the extractor.
    pub format_note: String,
}

impl From<&clipforge_core::VideoFormat> for VideoFormatDto {
    fn from(format: &clipforge_core::VideoFormat) -> Self {
        Self {
            format_id: format.format_id.clone(),
            extension: format.extension.clone(),
            resolution: format.resolution.clone(),
            filesize: format.filesize,
            quality_label: format.quality_label.clone(),
            format_note: format.format_note.clone(),
        }
    }
}

/// `POST /api/v1/downloads/` request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateDownloadRequest {
    /// Source video URL.
    pub url: String,
    /// Selected format identifier, as returned by the resolutions endpoint.
    pub format_id: String,
}

/// `POST /api/v1/downloads/` 202 response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateDownloadResponse {
    /// Newly created job identifier.
    pub job_id: JobId,
    /// Always `"pending"` at creation time.
    pub status: String,
    /// Human-readable acknowledgement message.
    pub message: String,
}

/// `GET /api/v1/jobs/{job_id}` 200 response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatusResponse {
    /// Job identifier.
    pub job_id: JobId,
    /// Current lifecycle state, lower-cased (`pending`, `processing`, `completed`, `failed`).
    pub status: String,
    /// Current progress snapshot.
    pub progress: JobProgress,
    /// Download URL, once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Expiry timestamp of the download artifact, once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
    /// Seconds remaining until `expire_at`, once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<i64>,
    /// Failure message, once failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure category, once failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<String>,
}

impl From<JobStatusInfo> for JobStatusResponse {
    fn from(info: JobStatusInfo) -> Self {
        Self {
            job_id: info.job_id,
            status: format!("{:?}", info.status).to_lowercase(),
            progress: info.progress,
            download_url: info.download_url,
            expire_at: info.expire_at,
            time_remaining: info.time_remaining,
            error: info.error_message,
            error_category: info.error_category,
        }
    }
}

/// Messages a WebSocket client may send on `GET /api/v1/ws`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the broadcast room for `job_id`.
    SubscribeJob {
        /// Job to subscribe to.
        job_id: JobId,
    },
    /// Leave the broadcast room for `job_id`.
    UnsubscribeJob {
        /// Job to unsubscribe from.
        job_id: JobId,
    },
    /// Liveness probe; echoed back as `pong`.
    Ping {
        /// Client-supplied timestamp, echoed verbatim in the reply.
        #[serde(skip_serializing_if = "Option::is_none")]
        ts: Option<i64>,
    },
    /// Request cancellation of a job.
    CancelJob {
        /// Job to cancel.
        job_id: JobId,
    },
}

/// Messages the server may push to a WebSocket client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once, immediately after the upgrade completes.
    Connected {
        /// Server-assigned identifier for this connection.
        client_id: String,
    },
    /// Acknowledges a `subscribe_job` request.
    Subscribed {
        /// Job the client is now subscribed to.
        job_id: JobId,
    },
    /// Acknowledges an `unsubscribe_job` request.
    Unsubscribed {
        /// Job the client is no longer subscribed to.
        job_id: JobId,
    },
    /// Reply to a `ping`.
    Pong {
        /// Server timestamp at reply time (Unix millis).
        timestamp: i64,
    },
    /// A subscribed job's progress advanced.
    JobProgress {
        /// Job the update concerns.
        job_id: JobId,
        /// New progress snapshot.
        progress: JobProgress,
    },
    /// A subscribed job completed successfully.
    JobCompleted {
        /// Job that completed.
        job_id: JobId,
        /// Always `"completed"`.
        status: String,
        /// URL the finished artifact can be downloaded from.
        download_url: String,
        /// Expiry timestamp of the download artifact.
        #[serde(skip_serializing_if = "Option::is_none")]
        expire_at: Option<DateTime<Utc>>,
    },
    /// A subscribed job failed.
    JobFailed {
        /// Job that failed.
        job_id: JobId,
        /// Always `"failed"`.
        status: String,
        /// Human-readable failure description.
        error: String,
        /// Stable error-category identifier, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        error_category: Option<String>,
    },
    /// A subscribed job was cancelled.
    JobCancelled {
        /// Job that was cancelled.
        job_id: JobId,
        /// Always `"cancelled"`.
        status: String,
    },
    /// A malformed or unsupported client message was received.
    Error {
        /// Human-readable explanation.
        message: String,
    },
}

/// Translate a domain event into its client-push counterpart, if any.
///
/// `JobStarted` has no wire counterpart (§4.6): the client learns a job
/// started implicitly, from the first progress or terminal message.
#[must_use]
pub fn server_message_for(event: &DomainEvent) -> Option<ServerMessage> {
    match event {
        DomainEvent::JobStarted { .. } => None,
        DomainEvent::JobProgressUpdated {
            job_id, progress, ..
        } => Some(ServerMessage::JobProgress {
            job_id: *job_id,
            progress: progress.clone(),
        }),
        DomainEvent::JobCompleted {
            job_id,
            download_url,
            expire_at,
            ..
        } => Some(ServerMessage::JobCompleted {
            job_id: *job_id,
            status: "completed".to_string(),
            download_url: download_url.clone(),
            expire_at: Some(*expire_at),
        }),
        DomainEvent::JobFailed {
            job_id,
            error_message,
            error_category,
            ..
        } => Some(ServerMessage::JobFailed {
            job_id: *job_id,
            status: "failed".to_string(),
            error: error_message.clone(),
            error_category: Some(error_category.clone()),
        }),
        DomainEvent::JobCancelled { job_id, .. } => Some(ServerMessage::JobCancelled {
            job_id: *job_id,
            status: "cancelled".to_string(),
        }),
    }
}

/// HTTP header names carrying rate-limit bookkeeping on every response.
pub mod rate_limit_headers {
    /// Configured ceiling for the dimension that governed this request.
    pub const LIMIT: &str = "X-RateLimit-Limit";
    /// Remaining admissions before the ceiling is reached.
    pub const REMAINING: &str = "X-RateLimit-Remaining";
    /// Unix timestamp (seconds) the counter resets at.
    pub const RESET: &str = "X-RateLimit-Reset";
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn client_message_round_trips_subscribe() {
        let message = ClientMessage::SubscribeJob {
            job_id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"type\":\"subscribe_job\""));
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn ping_without_timestamp_omits_the_field() {
        let message = ClientMessage::Ping { ts: None };
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, "{\"type\":\"ping\"}");
    }

    #[test]
    fn error_response_rate_limited_sets_limit_fields() {
        let response = ErrorResponse::rate_limited("daily_total", Utc::now());
        assert_eq!(response.error, "Rate limit exceeded");
        assert_eq!(response.limit_type.as_deref(), Some("daily_total"));
    }

    #[test]
    fn job_completed_event_maps_to_server_message() {
        let event = DomainEvent::JobCompleted {
            job_id: Uuid::new_v4(),
            download_url: "https://dl/x".to_string(),
            expire_at: Utc::now(),
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            server_message_for(&event),
            Some(ServerMessage::JobCompleted { .. })
        ));
    }

    #[test]
    fn job_started_event_has_no_client_push_counterpart() {
        let event = DomainEvent::JobStarted {
            job_id: Uuid::new_v4(),
            url: "https://example.test/v/x".to_string(),
            format_id: "best".to_string(),
            occurred_at: Utc::now(),
        };
        assert!(server_message_for(&event).is_none());
    }
}
