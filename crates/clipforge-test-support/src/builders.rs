//! Builders for domain objects used across integration and unit test suites.
//!
//! These are thin convenience wrappers around `clipforge_core`'s own
//! constructors with sensible test defaults, so a test can say
//! `sample_job("https://example.test/v/1")` instead of repeating the
//! constructor's full argument list at every call site.

use chrono::{DateTime, Duration, Utc};
use clipforge_core::{
    DownloadJob, DownloadToken, DownloadedFile, FormatId, FormatType, JobId, VideoFormat,
    VideoMetadata,
};
use clipforge_core::service::{RawVideoFormat, RawVideoInfo};

/// A fixed instant usable as `now` wherever a test needs a stable timestamp.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
        .expect("valid rfc3339 literal")
        .with_timezone(&Utc)
}

/// A pending job for `url`, created at [`fixed_now`].
///
/// # Panics
///
/// Panics if `"best"` somehow fails to parse as a [`FormatId`]; this cannot
/// happen since the literal is non-empty.
#[must_use]
pub fn sample_job(url: &str) -> DownloadJob {
    let format_id = FormatId::parse("best").expect("\"best\" is a valid format id");
    DownloadJob::create(url, format_id, fixed_now())
}

/// A [`DownloadedFile`] registered for `job_id`, expiring one hour after
/// [`fixed_now`].
///
/// # Panics
///
/// Panics if the constructed expiry is not strictly after the creation
/// timestamp, which cannot happen given the fixed one-hour offset.
#[must_use]
pub fn sample_downloaded_file(job_id: JobId, token: DownloadToken) -> DownloadedFile {
    let created_at = fixed_now();
    let expires_at = created_at + Duration::hours(1);
    DownloadedFile::register(
        token,
        format!("{job_id}/clip.mp4"),
        job_id,
        "clip.mp4",
        Some(1_048_576),
        created_at,
        expires_at,
    )
    .expect("fixed offsets always satisfy the expiry invariant")
}

/// A plausible `VideoMetadata` for a short clip.
///
/// # Panics
///
/// Panics if `id` is empty; callers pass a non-empty identifier.
#[must_use]
pub fn sample_video_metadata(id: &str) -> VideoMetadata {
    VideoMetadata::new(
        id,
        "Sample Clip",
        "Sample Uploader",
        120,
        "https://example.test/thumb.jpg",
        format!("https://example.test/v/{id}"),
        fixed_now(),
    )
    .expect("non-empty id and title satisfy the constructor's invariants")
}

/// A single `720p` video+audio [`VideoFormat`] variant.
#[must_use]
pub fn sample_video_format(format_id: &str, height: u32) -> VideoFormat {
    VideoFormat {
        format_id: format_id.to_string(),
        extension: "mp4".to_string(),
        resolution: format!("{}x{height}", height * 16 / 9),
        height,
        width: Some(height * 16 / 9),
        filesize: Some(10_485_760),
        video_codec: Some("avc1".to_string()),
        audio_codec: Some("mp4a".to_string()),
        quality_label: VideoFormat::quality_label_for_height(height).to_string(),
        format_note: String::new(),
        format_type: FormatType::VideoAudio,
    }
}

/// A raw extractor format entry matching the shape yt-dlp's `-J` dump reports.
#[must_use]
pub fn raw_video_format(format_id: &str, height: u32) -> RawVideoFormat {
    RawVideoFormat {
        format_id: Some(format_id.to_string()),
        extension: Some("mp4".to_string()),
        height: Some(height),
        width: Some(height * 16 / 9),
        filesize: Some(10_485_760),
        filesize_approx: None,
        tbr: Some(1_500.0),
        vcodec: Some("avc1".to_string()),
        acodec: Some("mp4a".to_string()),
        format_note: Some("sample".to_string()),
    }
}

/// A raw extractor info dump carrying a single 720p format.
#[must_use]
pub fn raw_video_info(id: &str, source_url: &str) -> RawVideoInfo {
    RawVideoInfo {
        id: Some(id.to_string()),
        title: Some("Sample Clip".to_string()),
        uploader: Some("Sample Uploader".to_string()),
        duration_seconds: Some(120),
        thumbnail_url: Some("https://example.test/thumb.jpg".to_string()),
        source_url: source_url.to_string(),
        formats: vec![raw_video_format("137+140", 720)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_core::JobStatus;

    #[test]
    fn sample_job_is_pending() {
        let job = sample_job("https://example.test/v/1");
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn sample_downloaded_file_expires_after_creation() {
        let file = sample_downloaded_file(uuid::Uuid::new_v4(), DownloadToken::generate());
        assert!(file.expires_at > file.created_at);
    }

    #[test]
    fn sample_video_format_label_matches_height() {
        let format = sample_video_format("137", 1080);
        assert_eq!(format.quality_label, "Great");
    }

    #[test]
    fn raw_video_info_carries_one_format() {
        let info = raw_video_info("abc123", "https://example.test/v/abc123");
        assert_eq!(info.formats.len(), 1);
    }
}
