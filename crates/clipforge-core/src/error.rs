//! Domain error types shared by job, file, video, and rate-limit services.

use thiserror::Error;

/// The stable wire identifier for an error category.
///
/// These strings are part of the HTTP contract; renaming a variant changes
/// the `error_category` field clients match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The submitted URL is not a well-formed, supported URL.
    InvalidUrl,
    /// The video exists but cannot be fetched (private, deleted, region-restricted in a
    /// way not specific enough to classify as `GeoBlocked`).
    VideoUnavailable,
    /// The requested format selector does not match any available format.
    FormatNotSupported,
    /// The extractor ran but the download itself failed for an unclassified reason.
    DownloadFailed,
    /// The artifact exceeded a configured size ceiling.
    FileTooLarge,
    /// A rate limit configured by this service was exceeded.
    RateLimited,
    /// An unexpected internal failure.
    SystemError,
    /// The referenced job does not exist.
    JobNotFound,
    /// The request body or parameters failed validation.
    InvalidRequest,
    /// A network-level failure occurred while talking to the upstream platform.
    NetworkError,
    /// The referenced file token does not exist.
    FileNotFound,
    /// The referenced file token existed but has expired.
    FileExpired,
    /// The upstream platform blocked the request based on geography.
    GeoBlocked,
    /// The upstream platform requires authentication this service does not have.
    LoginRequired,
    /// The upstream platform itself rate-limited the extractor.
    PlatformRateLimited,
    /// The download did not complete within the configured timeout.
    DownloadTimeout,
}

impl ErrorCategory {
    /// Return the frozen `(title, message, action)` triple for this category.
    ///
    /// The triple is composed verbatim into the canonical error body at the
    /// HTTP edge; it must never vary by call site.
    #[must_use]
    pub const fn wire_triple(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::InvalidUrl => (
                "Invalid URL",
                "The provided URL is not a valid or supported video URL.",
                "Please check the URL and try again.",
            ),
            Self::VideoUnavailable => (
                "Video Unavailable",
                "This video is private, deleted, or otherwise unavailable.",
                "Try a different video or check if it's publicly accessible.",
            ),
            Self::FormatNotSupported => (
                "Format Not Supported",
                "The requested format is not available for this video.",
                "Try selecting a different format or quality.",
            ),
            Self::DownloadFailed => (
                "Download Failed",
                "The download could not be completed.",
                "Please try again in a few moments.",
            ),
            Self::FileTooLarge => (
                "File Too Large",
                "The requested file exceeds the maximum allowed size.",
                "Try a lower quality or a different format.",
            ),
            Self::RateLimited => (
                "Rate Limit Exceeded",
                "You have exceeded the allowed number of requests.",
                "Please wait before submitting additional requests.",
            ),
            Self::SystemError => (
                "System Error",
                "An unexpected error occurred while processing your request.",
                "Please try again later.",
            ),
            Self::JobNotFound => (
                "Job Not Found",
                "The requested job does not exist or has already been removed.",
                "Check the job identifier and try again.",
            ),
            Self::InvalidRequest => (
                "Invalid Request",
                "The request is missing required fields or contains invalid values.",
                "Review the request parameters and try again.",
            ),
            Self::NetworkError => (
                "Network Error",
                "A network error occurred while communicating with the video platform.",
                "Please check your connection and try again.",
            ),
            Self::FileNotFound => (
                "File Not Found",
                "The requested download token does not exist.",
                "Request a new download link.",
            ),
            Self::FileExpired => (
                "File Expired",
                "This download link has expired.",
                "Submit the download request again to get a new link.",
            ),
            Self::GeoBlocked => (
                "Geo-Restricted",
                "This video is not available in your region.",
                "This content cannot be accessed from your current location.",
            ),
            Self::LoginRequired => (
                "Login Required",
                "This video requires authentication on the source platform.",
                "This content cannot be downloaded without an account on the source platform.",
            ),
            Self::PlatformRateLimited => (
                "Platform Rate Limited",
                "The source platform is rate-limiting requests.",
                "Please wait a few minutes before trying again.",
            ),
            Self::DownloadTimeout => (
                "Download Timeout",
                "The download did not complete within the expected time.",
                "Please try again; large files may require multiple attempts.",
            ),
        }
    }

    /// Stable snake_case wire identifier (e.g. `"video_unavailable"`).
    #[must_use]
    pub fn wire_id(self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::VideoUnavailable => "video_unavailable",
            Self::FormatNotSupported => "format_not_supported",
            Self::DownloadFailed => "download_failed",
            Self::FileTooLarge => "file_too_large",
            Self::RateLimited => "rate_limited",
            Self::SystemError => "system_error",
            Self::JobNotFound => "job_not_found",
            Self::InvalidRequest => "invalid_request",
            Self::NetworkError => "network_error",
            Self::FileNotFound => "file_not_found",
            Self::FileExpired => "file_expired",
            Self::GeoBlocked => "geo_blocked",
            Self::LoginRequired => "login_required",
            Self::PlatformRateLimited => "platform_rate_limited",
            Self::DownloadTimeout => "download_timeout",
        }
    }
}

/// Primary error type surfaced by domain services.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No job exists with the given identifier.
    #[error("job not found: {job_id}")]
    JobNotFound {
        /// Identifier that was looked up.
        job_id: String,
    },
    /// The requested state transition is not legal from the job's current state.
    #[error("cannot {action} job in {state} state")]
    JobStateError {
        /// The state the job was found in.
        state: &'static str,
        /// The attempted action (e.g. `"start"`, `"complete"`, `"update progress for"`).
        action: &'static str,
    },
    /// No file entry exists for the given token or job id.
    #[error("file not found")]
    FileNotFound,
    /// The file entry existed but its TTL had elapsed.
    #[error("file expired")]
    FileExpired,
    /// A rate limit was exceeded.
    #[error("rate limit exceeded for {limit_type}")]
    RateLimitExceeded {
        /// The limit dimension that was exceeded (e.g. `"daily_video-only"`).
        limit_type: String,
        /// Unix timestamp, in seconds, at which the limit resets.
        reset_at: i64,
    },
    /// A value object failed validation.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Name of the field that failed validation.
        field: &'static str,
        /// Human-readable reason for the failure.
        reason: String,
    },
    /// Extracting metadata or formats from the upstream platform failed.
    #[error("metadata extraction failed: {source}")]
    MetadataExtraction {
        /// Underlying cause reported by the extractor adapter.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The underlying store rejected or failed an operation.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl DomainError {
    /// Classify this error into a wire-stable [`ErrorCategory`].
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::JobNotFound { .. } => ErrorCategory::JobNotFound,
            Self::JobStateError { .. } | Self::InvalidValue { .. } => ErrorCategory::InvalidRequest,
            Self::FileNotFound => ErrorCategory::FileNotFound,
            Self::FileExpired => ErrorCategory::FileExpired,
            Self::RateLimitExceeded { .. } => ErrorCategory::RateLimited,
            Self::MetadataExtraction { .. } => ErrorCategory::SystemError,
            Self::PersistenceFailure(_) => ErrorCategory::SystemError,
        }
    }
}

/// Convenience alias for domain operation results.
pub type DomainResult<T> = Result<T, DomainError>;
