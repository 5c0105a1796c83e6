//! Pure domain façade over a metadata/format extractor's raw output.
//!
//! This module performs no I/O; adapters (e.g. the yt-dlp subprocess wrapper)
//! are responsible for producing a [`RawVideoInfo`] value, which this module
//! then validates and shapes into [`VideoMetadata`]/[`VideoFormat`] entities.

use chrono::{DateTime, Utc};

use crate::error::DomainResult;
use crate::model::{FormatType, VideoFormat, VideoMetadata};

/// Sentinel the extractor uses in place of an absent codec.
const CODEC_NONE: &str = "none";

/// A single raw format entry as reported by the extractor, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawVideoFormat {
    /// Extractor-assigned format identifier.
    pub format_id: Option<String>,
    /// Container extension.
    pub extension: Option<String>,
    /// Pixel height.
    pub height: Option<u32>,
    /// Pixel width.
    pub width: Option<u32>,
    /// Exact size in bytes, when the extractor knows it precisely.
    pub filesize: Option<i64>,
    /// Approximate size in bytes.
    pub filesize_approx: Option<i64>,
    /// Total bitrate in kbps, used to estimate size when no size field is present.
    pub tbr: Option<f64>,
    /// Raw video codec string, or the `"none"` sentinel.
    pub vcodec: Option<String>,
    /// Raw audio codec string, or the `"none"` sentinel.
    pub acodec: Option<String>,
    /// Free-text format note.
    pub format_note: Option<String>,
}

/// Raw video info as reported by the extractor, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawVideoInfo {
    /// Platform-assigned video identifier.
    pub id: Option<String>,
    /// Video title.
    pub title: Option<String>,
    /// Uploader/channel display name.
    pub uploader: Option<String>,
    /// Duration in seconds.
    pub duration_seconds: Option<u64>,
    /// Thumbnail URL.
    pub thumbnail_url: Option<String>,
    /// Source URL this metadata was extracted from.
    pub source_url: String,
    /// Every format variant the extractor reported for this video.
    pub formats: Vec<RawVideoFormat>,
}

/// Parses and shapes extractor output into domain entities.
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoProcessor;

impl VideoProcessor {
    /// Construct a processor. Stateless; exists for symmetry with the other
    /// domain services and to give call sites a consistent construction idiom.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Whether `url` is a well-formed, supported source URL.
    ///
    /// Accepts `http`/`https` URLs with a non-empty host; it does not attempt
    /// to validate that any particular platform is reachable.
    #[must_use]
    pub fn validate_url(&self, url: &str) -> bool {
        let Some(rest) = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
        else {
            return false;
        };
        let host = rest.split(['/', '?', '#']).next().unwrap_or("");
        !host.is_empty()
    }

    /// Validate raw extractor metadata into a [`VideoMetadata`] entity.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DomainError::InvalidValue`] if `id` or `title`
    /// is missing or empty.
    pub fn extract_metadata(
        &self,
        raw: &RawVideoInfo,
        extracted_at: DateTime<Utc>,
    ) -> DomainResult<VideoMetadata> {
        VideoMetadata::new(
            raw.id.clone().unwrap_or_default(),
            raw.title.clone().unwrap_or_default(),
            raw.uploader.clone().unwrap_or_default(),
            raw.duration_seconds.unwrap_or(0),
            raw.thumbnail_url.clone().unwrap_or_default(),
            raw.source_url.clone(),
            extracted_at,
        )
    }

    /// Parse every well-formed raw format entry, sorted by height descending
    /// with combined video+audio entries preferred at equal height.
    ///
    /// Malformed entries (missing `format_id`) are skipped with a `WARN` log,
    /// not treated as fatal.
    #[must_use]
    pub fn available_formats(&self, raw: &RawVideoInfo) -> Vec<VideoFormat> {
        let duration = raw.duration_seconds;
        let mut formats: Vec<VideoFormat> = raw
            .formats
            .iter()
            .filter_map(|entry| match Self::parse_format(entry, duration) {
                Some(format) => Some(format),
                None => {
                    tracing::warn!(format_id = ?entry.format_id, "skipping malformed raw format entry");
                    None
                }
            })
            .collect();
        formats.sort_by(|a, b| {
            b.height
                .cmp(&a.height)
                .then_with(|| Self::format_rank(a.format_type).cmp(&Self::format_rank(b.format_type)))
        });
        formats
    }

    /// Group formats as {video+audio, video-only, audio-only}, each group
    /// sorted by height descending, groups concatenated in that fixed order.
    #[must_use]
    pub fn formats_to_client_list(&self, formats: &[VideoFormat]) -> Vec<VideoFormat> {
        let mut video_audio = Vec::new();
        let mut video_only = Vec::new();
        let mut audio_only = Vec::new();
        for format in formats {
            match format.format_type {
                FormatType::VideoAudio => video_audio.push(format.clone()),
                FormatType::VideoOnly => video_only.push(format.clone()),
                FormatType::AudioOnly => audio_only.push(format.clone()),
            }
        }
        for group in [&mut video_audio, &mut video_only, &mut audio_only] {
            group.sort_by(|a, b| b.height.cmp(&a.height));
        }
        video_audio
            .into_iter()
            .chain(video_only)
            .chain(audio_only)
            .collect()
    }

    fn parse_format(entry: &RawVideoFormat, duration_seconds: Option<u64>) -> Option<VideoFormat> {
        let format_id = entry.format_id.clone()?;
        let height = entry.height.unwrap_or(0);
        let format_type = FormatType::from_codecs(entry.vcodec.as_deref(), entry.acodec.as_deref());
        let resolution = Self::resolution_string(entry, height);
        let filesize = Self::resolve_filesize(entry, duration_seconds);
        Some(VideoFormat {
            format_id,
            extension: entry.extension.clone().unwrap_or_default(),
            resolution,
            height,
            width: entry.width,
            filesize,
            video_codec: entry.vcodec.clone(),
            audio_codec: entry.acodec.clone(),
            quality_label: VideoFormat::quality_label_for_height(height).to_string(),
            format_note: entry.format_note.clone().unwrap_or_default(),
            format_type,
        })
    }

    fn resolution_string(entry: &RawVideoFormat, height: u32) -> String {
        match (entry.width, entry.height) {
            (Some(width), Some(height)) => format!("{width}x{height}"),
            _ if height > 0 => format!("{height}p"),
            _ if entry.vcodec.as_deref() == Some(CODEC_NONE) => "audio only".to_string(),
            _ => entry.format_note.clone().unwrap_or_default(),
        }
    }

    fn resolve_filesize(entry: &RawVideoFormat, duration_seconds: Option<u64>) -> Option<u64> {
        if let Some(exact) = entry.filesize {
            if exact > 0 {
                return Some(exact as u64);
            }
        }
        if let Some(approx) = entry.filesize_approx {
            if approx > 0 {
                return Some(approx as u64);
            }
        }
        match (entry.tbr, duration_seconds) {
            (Some(tbr), Some(duration)) if tbr > 0.0 && duration > 0 => {
                Some(((tbr * duration as f64 * 1024.0) / 8.0).floor() as u64)
            }
            _ => None,
        }
    }

    const fn format_rank(format_type: FormatType) -> u8 {
        match format_type {
            FormatType::VideoAudio => 0,
            FormatType::VideoOnly => 1,
            FormatType::AudioOnly => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(
        format_id: &str,
        height: Option<u32>,
        vcodec: Option<&str>,
        acodec: Option<&str>,
    ) -> RawVideoFormat {
        RawVideoFormat {
            format_id: Some(format_id.to_string()),
            extension: Some("mp4".to_string()),
            height,
            width: height.map(|h| h * 16 / 9),
            filesize: None,
            filesize_approx: None,
            tbr: None,
            vcodec: vcodec.map(str::to_string),
            acodec: acodec.map(str::to_string),
            format_note: None,
        }
    }

    #[test]
    fn validate_url_accepts_http_and_https_with_host() {
        let processor = VideoProcessor::new();
        assert!(processor.validate_url("https://example.test/v/X"));
        assert!(processor.validate_url("http://example.test/v/X"));
        assert!(!processor.validate_url("ftp://example.test/v/X"));
        assert!(!processor.validate_url("https://"));
    }

    #[test]
    fn extract_metadata_rejects_missing_id() {
        let processor = VideoProcessor::new();
        let raw = RawVideoInfo {
            title: Some("Title".to_string()),
            source_url: "https://example.test/v/X".to_string(),
            ..Default::default()
        };
        assert!(processor.extract_metadata(&raw, Utc::now()).is_err());
    }

    #[test]
    fn format_grouping_orders_video_audio_then_video_only_then_audio_only() {
        let processor = VideoProcessor::new();
        let raw = RawVideoInfo {
            id: Some("X".to_string()),
            title: Some("T".to_string()),
            source_url: "https://example.test/v/X".to_string(),
            formats: vec![
                format("137", Some(1080), Some("avc1"), Some("none")),
                format("18", Some(360), Some("avc1"), Some("mp4a")),
                format("299", Some(1440), Some("avc1"), Some("none")),
                format("140", None, Some("none"), Some("mp4a")),
                format("22", Some(720), Some("avc1"), Some("mp4a")),
                format("248", Some(1080), Some("avc1"), Some("none")),
            ],
            ..Default::default()
        };
        let parsed = processor.available_formats(&raw);
        let grouped = processor.formats_to_client_list(&parsed);
        let types: Vec<FormatType> = grouped.iter().map(|f| f.format_type).collect();
        let first_audio_only = types.iter().position(|t| *t == FormatType::AudioOnly);
        let first_video_only = types.iter().position(|t| *t == FormatType::VideoOnly);
        let last_video_audio = types.iter().rposition(|t| *t == FormatType::VideoAudio);
        assert!(last_video_audio < first_video_only);
        assert!(first_video_only < first_audio_only);
    }

    #[test]
    fn filesize_precedence_prefers_approx_over_bitrate_estimate() {
        let mut entry = format("137", Some(1080), Some("avc1"), Some("none"));
        entry.filesize = Some(0);
        entry.filesize_approx = Some(12345);
        entry.tbr = Some(1000.0);
        let size = VideoProcessor::resolve_filesize(&entry, Some(60));
        assert_eq!(size, Some(12345));
    }

    #[test]
    fn filesize_falls_back_to_bitrate_times_duration() {
        let mut entry = format("137", Some(1080), Some("avc1"), Some("none"));
        entry.tbr = Some(1000.0);
        let size = VideoProcessor::resolve_filesize(&entry, Some(60));
        assert_eq!(size, Some(((1000.0_f64 * 60.0 * 1024.0) / 8.0).floor() as u64));
    }

    #[test]
    fn malformed_entry_without_format_id_is_skipped() {
        let processor = VideoProcessor::new();
        let raw = RawVideoInfo {
            id: Some("X".to_string()),
            title: Some("T".to_string()),
            source_url: "https://example.test/v/X".to_string(),
            formats: vec![RawVideoFormat {
                format_id: None,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(processor.available_formats(&raw).is_empty());
    }
}
