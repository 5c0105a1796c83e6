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
#![allow(clippy::multiple_crate_versions)]
#![allow(unexpected_cfgs)]

//! Environment-loaded, validated configuration for the job orchestration service.
//!
//! Deliberately simpler than a database-backed settings facade with live
//! reload: nothing in this configuration list needs runtime mutation or
//! per-tenant secrets, so `Config::from_env` parses once at startup and the
//! result is immutable for the life of the process (parse, don't validate —
//! an invalid value fails fast at boot, not at first use).

mod error;
mod rate_limit;

pub use error::{ConfigError, ConfigResult};
pub use rate_limit::{EndpointLimit, RateLimitConfig};

use std::time::Duration;

/// Top-level, validated configuration for the service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string.
    pub database_url: String,
    /// Address the HTTP server binds to, e.g. `0.0.0.0:8080`.
    pub bind_addr: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// `tracing-subscriber` `EnvFilter` directive string.
    pub log_level: String,
    /// Rate-limiting configuration.
    pub rate_limit: RateLimitConfig,
    /// Default job TTL, refreshed by every atomic mutation.
    pub job_ttl: Duration,
    /// Directory completed artifacts are written under.
    pub download_dir: String,
    /// File registration TTL.
    pub file_ttl: Duration,
    /// Interval between reaper sweeps.
    pub reaper_interval: Duration,
    /// Age at which a terminal job becomes eligible for archival.
    pub reaper_job_expiration: Duration,
    /// Executable name or path for the extractor subprocess.
    pub extractor_bin: String,
    /// Scratch directory the extractor writes intermediate files into.
    pub extractor_scratch_dir: String,
}

/// Structured log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development.
    Pretty,
    /// Newline-delimited JSON, for production log pipelines.
    Json,
}

impl Config {
    /// Load and validate configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a
    /// present variable fails to parse into its expected type.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load and validate configuration from an arbitrary key lookup.
    ///
    /// Exists so tests can exercise parsing/validation without mutating
    /// process-wide environment state.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required key is missing or a present
    /// value fails to parse into its expected type.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let require = |key: &str| lookup(key).ok_or_else(|| ConfigError::Missing(key.to_string()));
        let parse = |key: &str, default: u64| -> ConfigResult<u64> {
            match lookup(key) {
                Some(value) => value.parse().map_err(|error: std::num::ParseIntError| {
                    ConfigError::Invalid {
                        key: key.to_string(),
                        reason: error.to_string(),
                    }
                }),
                None => Ok(default),
            }
        };

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            log_format: parse_log_format(&env_or("LOG_FORMAT", "pretty"))?,
            log_level: env_or("LOG_LEVEL", "info"),
            rate_limit: RateLimitConfig::from_lookup(&lookup)?,
            job_ttl: Duration::from_secs(parse("JOB_TTL_SECONDS", 3600)?),
            download_dir: env_or("DOWNLOAD_DIR", "./downloads"),
            file_ttl: Duration::from_secs(parse("FILE_TTL_MINUTES", 10)? * 60),
            reaper_interval: Duration::from_secs(parse("REAPER_INTERVAL_SECONDS", 60)?),
            reaper_job_expiration: Duration::from_secs(parse(
                "REAPER_JOB_EXPIRATION_SECONDS",
                3600,
            )?),
            extractor_bin: env_or("EXTRACTOR_BIN", "yt-dlp"),
            extractor_scratch_dir: env_or("EXTRACTOR_SCRATCH_DIR", "./scratch"),
        })
    }
}

fn parse_log_format(value: &str) -> ConfigResult<LogFormat> {
    match value {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(ConfigError::Invalid {
            key: "LOG_FORMAT".to_string(),
            reason: format!("expected \"pretty\" or \"json\", got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &HashMap<&str, &str>) -> impl Fn(&str) -> Option<String> + '_ {
        move |key| vars.get(key).map(|value| (*value).to_string())
    }

    #[test]
    fn missing_database_url_fails_fast() {
        let vars = HashMap::new();
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref key) if key == "DATABASE_URL"));
    }

    #[test]
    fn invalid_log_format_is_rejected() {
        let mut vars = HashMap::new();
        vars.insert("DATABASE_URL", "postgres://localhost/test");
        vars.insert("LOG_FORMAT", "xml");
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn defaults_apply_when_optional_vars_absent() {
        let mut vars = HashMap::new();
        vars.insert("DATABASE_URL", "postgres://localhost/test");
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.job_ttl, Duration::from_secs(3600));
        assert_eq!(config.file_ttl, Duration::from_secs(600));
    }
}
