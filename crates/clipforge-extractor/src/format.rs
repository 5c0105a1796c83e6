//! Format-selector and trim-option computation for download requests.

use clipforge_core::FormatId;

/// Caller-supplied shape used to compute a `yt-dlp` format selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRequest {
    /// Explicit format id, used verbatim when present.
    pub format_id: Option<FormatId>,
    /// Drop the video stream and download audio only.
    pub mute_video: bool,
    /// Drop the audio stream when a video stream is requested.
    pub mute_audio: bool,
    /// Maximum pixel height, if the caller capped quality.
    pub quality_cap: Option<u32>,
}

impl FormatRequest {
    /// Compute the format selector string passed to the extractor's `-f` flag.
    #[must_use]
    pub fn resolve_selector(&self) -> String {
        if let Some(format_id) = &self.format_id {
            return format_id.as_str().to_string();
        }
        if self.mute_video {
            return "bestaudio/best".to_string();
        }
        let video = match self.quality_cap {
            Some(height) => format!("bestvideo[height<={height}]"),
            None => "bestvideo".to_string(),
        };
        if self.mute_audio {
            return match self.quality_cap {
                Some(height) => format!("{video}/best[height<={height}]"),
                None => format!("{video}/best"),
            };
        }
        match self.quality_cap {
            Some(height) => format!("{video}+bestaudio/best[height<={height}]"),
            None => format!("{video}+bestaudio/best"),
        }
    }
}

/// A requested trim window, applied via `--download-sections`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimOptions {
    /// Clip start, in seconds from the beginning of the source.
    pub start_time: f64,
    /// Clip end, in seconds from the beginning of the source.
    pub end_time: f64,
    /// Caller-requested output container, if any.
    pub container: Option<String>,
}

impl TrimOptions {
    /// Build the `*start-end` download-section directive.
    #[must_use]
    pub fn download_section(&self) -> String {
        format!("*{}-{}", self.start_time, self.end_time)
    }

    /// Resolve the output container, applying the default when the caller
    /// did not specify one: `webm` for a trimmed clip with no container
    /// requested, since the extractor's keyframe-forced trim path produces
    /// that container most reliably without a re-encode.
    #[must_use]
    pub fn container_or_default(&self) -> &str {
        self.container.as_deref().unwrap_or("webm")
    }
}

/// Resolve the output container for a download that carries no trim.
#[must_use]
pub fn container_or_default_no_trim(requested: Option<&str>) -> &str {
    requested.unwrap_or("mp4")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mute_video_selects_best_audio() {
        let request = FormatRequest {
            format_id: None,
            mute_video: true,
            mute_audio: false,
            quality_cap: None,
        };
        assert_eq!(request.resolve_selector(), "bestaudio/best");
    }

    #[test]
    fn explicit_format_id_is_used_verbatim() {
        let request = FormatRequest {
            format_id: Some(FormatId::parse("137+140").unwrap()),
            mute_video: true,
            mute_audio: true,
            quality_cap: Some(720),
        };
        assert_eq!(request.resolve_selector(), "137+140");
    }

    #[test]
    fn video_with_audio_and_no_cap() {
        let request = FormatRequest {
            format_id: None,
            mute_video: false,
            mute_audio: false,
            quality_cap: None,
        };
        assert_eq!(request.resolve_selector(), "bestvideo+bestaudio/best");
    }

    #[test]
    fn video_with_audio_and_quality_cap() {
        let request = FormatRequest {
            format_id: None,
            mute_video: false,
            mute_audio: false,
            quality_cap: Some(1080),
        };
        assert_eq!(
            request.resolve_selector(),
            "bestvideo[height<=1080]+bestaudio/best[height<=1080]"
        );
    }

    #[test]
    fn muted_audio_with_cap_drops_audio_track() {
        let request = FormatRequest {
            format_id: None,
            mute_video: false,
            mute_audio: true,
            quality_cap: Some(480),
        };
        assert_eq!(
            request.resolve_selector(),
            "bestvideo[height<=480]/best[height<=480]"
        );
    }

    #[test]
    fn trim_download_section_is_star_delimited() {
        let trim = TrimOptions {
            start_time: 5.0,
            end_time: 12.5,
            container: None,
        };
        assert_eq!(trim.download_section(), "*5-12.5");
    }

    #[test]
    fn trim_with_no_container_defaults_to_webm() {
        let trim = TrimOptions {
            start_time: 0.0,
            end_time: 1.0,
            container: None,
        };
        assert_eq!(trim.container_or_default(), "webm");
    }

    #[test]
    fn trim_respects_explicit_container() {
        let trim = TrimOptions {
            start_time: 0.0,
            end_time: 1.0,
            container: Some("mkv".to_string()),
        };
        assert_eq!(trim.container_or_default(), "mkv");
    }

    #[test]
    fn untrimmed_download_defaults_to_mp4() {
        assert_eq!(container_or_default_no_trim(None), "mp4");
        assert_eq!(container_or_default_no_trim(Some("mkv")), "mkv");
    }
}
