//! Rate-limiting configuration, loaded from `RATE_LIMIT_*` environment variables.

use clipforge_core::RateLimit;

use crate::error::{ConfigError, ConfigResult};

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3_600;
const SECONDS_PER_DAY: u64 = 86_400;

/// One `path:limit` entry from `RATE_LIMIT_ENDPOINT_HOURLY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointLimit {
    /// Request path the limit applies to, e.g. `/api/v1/downloads`.
    pub path: String,
    /// Maximum admitted requests per rolling hour.
    pub limit: u32,
}

/// All configured rate-limiting dimensions.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Master switch. When `false`, every request is admitted unconditionally.
    pub enabled: bool,
    /// Daily cap on video-only download jobs per client.
    pub video_only_daily: RateLimit,
    /// Daily cap on audio-only download jobs per client.
    pub audio_only_daily: RateLimit,
    /// Daily cap on combined video+audio download jobs per client.
    pub video_audio_daily: RateLimit,
    /// Daily cap on total download jobs per client, across all formats.
    pub total_jobs_daily: RateLimit,
    /// Per-minute cap on batch submissions per client.
    pub batch_minute: RateLimit,
    /// Per-endpoint, per-hour caps layered on top of the job-creation limits.
    pub endpoint_hourly: Vec<EndpointLimit>,
    /// Client IPs (canonical string form) that bypass every dimension above.
    pub whitelist: Vec<String>,
}

impl RateLimitConfig {
    /// Load from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric limit fails to parse, is
    /// zero, or an `RATE_LIMIT_ENDPOINT_HOURLY` entry is malformed.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let enabled = match lookup("RATE_LIMIT_ENABLED") {
            Some(value) => parse_bool("RATE_LIMIT_ENABLED", &value)?,
            None => true,
        };

        Ok(Self {
            enabled,
            video_only_daily: named_limit(
                lookup,
                "RATE_LIMIT_VIDEO_ONLY_DAILY",
                50,
                SECONDS_PER_DAY,
                "daily_video-only",
            )?,
            audio_only_daily: named_limit(
                lookup,
                "RATE_LIMIT_AUDIO_ONLY_DAILY",
                50,
                SECONDS_PER_DAY,
                "daily_audio-only",
            )?,
            video_audio_daily: named_limit(
                lookup,
                "RATE_LIMIT_VIDEO_AUDIO_DAILY",
                50,
                SECONDS_PER_DAY,
                "daily_video-audio",
            )?,
            total_jobs_daily: named_limit(
                lookup,
                "RATE_LIMIT_TOTAL_JOBS_DAILY",
                100,
                SECONDS_PER_DAY,
                "daily_total",
            )?,
            batch_minute: named_limit(
                lookup,
                "RATE_LIMIT_BATCH_MINUTE",
                5,
                SECONDS_PER_MINUTE,
                "batch_minute",
            )?,
            endpoint_hourly: parse_endpoint_hourly(lookup("RATE_LIMIT_ENDPOINT_HOURLY"))?,
            whitelist: parse_whitelist(lookup("RATE_LIMIT_WHITELIST")),
        })
    }
}

fn named_limit(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u32,
    window_seconds: u64,
    limit_type: &str,
) -> ConfigResult<RateLimit> {
    let limit = match lookup(key) {
        Some(value) => value.parse::<u32>().map_err(|error| ConfigError::Invalid {
            key: key.to_string(),
            reason: error.to_string(),
        })?,
        None => default,
    };
    RateLimit::new(limit, window_seconds, limit_type).map_err(|error| ConfigError::Invalid {
        key: key.to_string(),
        reason: error.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

fn parse_endpoint_hourly(raw: Option<String>) -> ConfigResult<Vec<EndpointLimit>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (path, limit) = entry.rsplit_once(':').ok_or_else(|| ConfigError::Invalid {
                key: "RATE_LIMIT_ENDPOINT_HOURLY".to_string(),
                reason: format!("expected \"path:limit\", got {entry:?}"),
            })?;
            let limit = limit.parse::<u32>().map_err(|error| ConfigError::Invalid {
                key: "RATE_LIMIT_ENDPOINT_HOURLY".to_string(),
                reason: error.to_string(),
            })?;
            Ok(EndpointLimit {
                path: path.to_string(),
                limit,
            })
        })
        .collect()
}

fn parse_whitelist(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &HashMap<&str, &str>) -> impl Fn(&str) -> Option<String> + '_ {
        move |key| vars.get(key).map(|value| (*value).to_string())
    }

    #[test]
    fn defaults_apply_when_absent() {
        let vars = HashMap::new();
        let config = RateLimitConfig::from_lookup(&lookup(&vars)).unwrap();
        assert!(config.enabled);
        assert_eq!(config.video_only_daily.limit, 50);
        assert_eq!(config.batch_minute.window_seconds, SECONDS_PER_MINUTE);
        assert!(config.endpoint_hourly.is_empty());
        assert!(config.whitelist.is_empty());
    }

    #[test]
    fn parses_endpoint_hourly_list() {
        let mut vars = HashMap::new();
        vars.insert(
            "RATE_LIMIT_ENDPOINT_HOURLY",
            "/api/v1/downloads:20, /api/v1/videos/resolutions:60",
        );
        let config = RateLimitConfig::from_lookup(&lookup(&vars)).unwrap();
        assert_eq!(
            config.endpoint_hourly,
            vec![
                EndpointLimit {
                    path: "/api/v1/downloads".to_string(),
                    limit: 20
                },
                EndpointLimit {
                    path: "/api/v1/videos/resolutions".to_string(),
                    limit: 60
                },
            ]
        );
    }

    #[test]
    fn malformed_endpoint_entry_is_rejected() {
        let mut vars = HashMap::new();
        vars.insert("RATE_LIMIT_ENDPOINT_HOURLY", "no-colon-here");
        let err = RateLimitConfig::from_lookup(&lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn whitelist_entries_are_trimmed() {
        let mut vars = HashMap::new();
        vars.insert("RATE_LIMIT_WHITELIST", " 127.0.0.1 , 10.0.0.5");
        let config = RateLimitConfig::from_lookup(&lookup(&vars)).unwrap();
        assert_eq!(config.whitelist, vec!["127.0.0.1", "10.0.0.5"]);
    }

    #[test]
    fn disabled_flag_parses_from_falsey_strings() {
        let mut vars = HashMap::new();
        vars.insert("RATE_LIMIT_ENABLED", "false");
        let config = RateLimitConfig::from_lookup(&lookup(&vars)).unwrap();
        assert!(!config.enabled);
    }
}
