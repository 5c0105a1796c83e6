//! Shared extraction-error classification.
//!
//! Used by both the download orchestrator and the metadata/format lookup
//! path: the ordered substring rules only need to exist once, here, rather
//! than duplicated at each call site.

use clipforge_core::ErrorCategory;

use crate::error::ExtractorError;

/// Classify an [`ExtractorError`] into a wire-stable [`ErrorCategory`].
///
/// Rules are applied in order; the first match wins.
#[must_use]
pub fn categorize_error(error: &ExtractorError) -> ErrorCategory {
    match error {
        ExtractorError::VideoUnavailable { .. } => ErrorCategory::VideoUnavailable,
        ExtractorError::ExtractorFailure { message } => classify_extractor_failure(message),
        ExtractorError::DownloadFailure { message } => classify_download_failure(message),
        ExtractorError::Spawn { source } | ExtractorError::Io { source } => {
            classify_message(&source.to_string())
        }
        ExtractorError::NonZeroExit { stderr, .. } => classify_message(stderr),
        ExtractorError::OutputMissing { .. } => ErrorCategory::DownloadFailed,
        ExtractorError::Decode { message } => classify_message(message),
    }
}

fn classify_extractor_failure(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    if contains_any(&lower, &["unsupported url", "invalid url"]) {
        ErrorCategory::InvalidUrl
    } else if contains_any(&lower, &["private video", "members-only", "not available"]) {
        ErrorCategory::VideoUnavailable
    } else {
        ErrorCategory::DownloadFailed
    }
}

fn classify_download_failure(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    if contains_any(&lower, &["http error 404", "not found"]) {
        return ErrorCategory::VideoUnavailable;
    }
    if lower.contains("http error 403") {
        return if contains_any(&lower, &["geo", "region", "location"]) {
            ErrorCategory::GeoBlocked
        } else if contains_any(&lower, &["login", "sign in", "authenticate"]) {
            ErrorCategory::LoginRequired
        } else {
            ErrorCategory::VideoUnavailable
        };
    }
    if contains_any(&lower, &["http error 429", "too many requests"]) {
        return ErrorCategory::PlatformRateLimited;
    }
    if lower.contains("format") && contains_any(&lower, &["not available", "not found"]) {
        return ErrorCategory::FormatNotSupported;
    }
    if contains_any(&lower, &["network", "connection", "timeout"]) {
        return ErrorCategory::NetworkError;
    }
    ErrorCategory::DownloadFailed
}

/// Generic substring heuristic (rule group 4): applied to adapter-level
/// failures that carry no typed extractor classification of their own.
fn classify_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    if lower.contains("url") && contains_any(&lower, &["invalid", "unsupported"]) {
        ErrorCategory::InvalidUrl
    } else if contains_any(&lower, &["unavailable", "private", "deleted"]) {
        ErrorCategory::VideoUnavailable
    } else if lower.contains("format") && lower.contains("not") {
        ErrorCategory::FormatNotSupported
    } else if contains_any(&lower, &["too large", "file size"]) {
        ErrorCategory::FileTooLarge
    } else if contains_any(&lower, &["network", "connection", "timeout"]) {
        ErrorCategory::NetworkError
    } else if contains_any(&lower, &["rate limit", "too many"]) {
        ErrorCategory::PlatformRateLimited
    } else if contains_any(&lower, &["geo", "region", "location"]) {
        ErrorCategory::GeoBlocked
    } else if contains_any(&lower, &["login", "sign in", "authenticate"]) {
        ErrorCategory::LoginRequired
    } else {
        ErrorCategory::SystemError
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_unavailable_is_classified_directly() {
        let error = ExtractorError::VideoUnavailable {
            message: "gone".to_string(),
        };
        assert_eq!(categorize_error(&error), ErrorCategory::VideoUnavailable);
    }

    #[test]
    fn extractor_failure_maps_unsupported_url() {
        let error = ExtractorError::ExtractorFailure {
            message: "Unsupported URL: ftp://x".to_string(),
        };
        assert_eq!(categorize_error(&error), ErrorCategory::InvalidUrl);
    }

    #[test]
    fn extractor_failure_maps_private_video() {
        let error = ExtractorError::ExtractorFailure {
            message: "This is a private video".to_string(),
        };
        assert_eq!(categorize_error(&error), ErrorCategory::VideoUnavailable);
    }

    #[test]
    fn download_failure_maps_404_to_video_unavailable() {
        let error = ExtractorError::DownloadFailure {
            message: "HTTP Error 404: Not Found".to_string(),
        };
        assert_eq!(categorize_error(&error), ErrorCategory::VideoUnavailable);
    }

    #[test]
    fn download_failure_403_with_geo_hint_is_geo_blocked() {
        let error = ExtractorError::DownloadFailure {
            message: "HTTP Error 403: blocked in your region".to_string(),
        };
        assert_eq!(categorize_error(&error), ErrorCategory::GeoBlocked);
    }

    #[test]
    fn download_failure_403_with_login_hint_is_login_required() {
        let error = ExtractorError::DownloadFailure {
            message: "HTTP Error 403: please sign in to confirm you're not a bot".to_string(),
        };
        assert_eq!(categorize_error(&error), ErrorCategory::LoginRequired);
    }

    #[test]
    fn download_failure_bare_403_is_video_unavailable() {
        let error = ExtractorError::DownloadFailure {
            message: "HTTP Error 403: Forbidden".to_string(),
        };
        assert_eq!(categorize_error(&error), ErrorCategory::VideoUnavailable);
    }

    #[test]
    fn download_failure_429_is_platform_rate_limited() {
        let error = ExtractorError::DownloadFailure {
            message: "HTTP Error 429: Too Many Requests".to_string(),
        };
        assert_eq!(categorize_error(&error), ErrorCategory::PlatformRateLimited);
    }

    #[test]
    fn download_failure_missing_format_is_format_not_supported() {
        let error = ExtractorError::DownloadFailure {
            message: "Requested format is not available".to_string(),
        };
        assert_eq!(categorize_error(&error), ErrorCategory::FormatNotSupported);
    }

    #[test]
    fn download_failure_network_hint_is_network_error() {
        let error = ExtractorError::DownloadFailure {
            message: "connection reset by peer".to_string(),
        };
        assert_eq!(categorize_error(&error), ErrorCategory::NetworkError);
    }

    #[test]
    fn download_failure_unclassified_is_download_failed() {
        let error = ExtractorError::DownloadFailure {
            message: "ffmpeg exited unexpectedly".to_string(),
        };
        assert_eq!(categorize_error(&error), ErrorCategory::DownloadFailed);
    }

    #[test]
    fn nonzero_exit_falls_back_to_generic_heuristics() {
        let error = ExtractorError::NonZeroExit {
            code: Some(1),
            stderr: "ERROR: Video unavailable: this video has been removed".to_string(),
        };
        assert_eq!(categorize_error(&error), ErrorCategory::VideoUnavailable);
    }

    #[test]
    fn output_missing_is_download_failed() {
        let error = ExtractorError::OutputMissing {
            expected: "/tmp/x.mp4".into(),
        };
        assert_eq!(categorize_error(&error), ErrorCategory::DownloadFailed);
    }

    #[test]
    fn unclassifiable_message_defaults_to_system_error() {
        let error = ExtractorError::NonZeroExit {
            code: Some(127),
            stderr: "command not found".to_string(),
        };
        assert_eq!(categorize_error(&error), ErrorCategory::SystemError);
    }
}
