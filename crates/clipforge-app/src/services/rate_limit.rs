//! [`RateLimitGate`] that layers the job-creation admission dimensions
//! (`total_jobs_daily`, `batch_minute`, any configured `endpoint_hourly`
//! entry) answerable before a job's format is resolved. The per-format
//! daily dimensions (`video_only_daily`/`audio_only_daily`/
//! `video_audio_daily`) are checked later, inside [`super::DownloadService`],
//! once the submitted format has been resolved against the source.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use clipforge_config::RateLimitConfig;
use clipforge_core::{AdmissionOutcome, ClientIp, RateLimit, RateLimitEntity, RateLimitManager};
use clipforge_data::PgRateLimitRepository;
use tracing::warn;

use clipforge_api::{RateLimitDecision, RateLimitGate};

pub(crate) struct RateLimitGateService {
    rate_limits: Arc<RateLimitManager<PgRateLimitRepository>>,
    config: Arc<RateLimitConfig>,
}

impl RateLimitGateService {
    pub(crate) const fn new(
        rate_limits: Arc<RateLimitManager<PgRateLimitRepository>>,
        config: Arc<RateLimitConfig>,
    ) -> Self {
        Self {
            rate_limits,
            config,
        }
    }

    const fn decision_for(
        allowed: bool,
        entity: &RateLimitEntity,
    ) -> RateLimitDecision {
        RateLimitDecision {
            allowed,
            limit: entity.limit,
            remaining: entity.remaining(),
            reset_at: entity.reset_at,
            limit_type: String::new(),
        }
    }
}

fn admitted_everything(limit_type: &str) -> RateLimitDecision {
    RateLimitDecision {
        allowed: true,
        limit: 0,
        remaining: 0,
        reset_at: Utc::now(),
        limit_type: limit_type.to_string(),
    }
}

/// The rate-limit dimensions a job-creation request against `endpoint` must
/// pass: `total_jobs_daily` and `batch_minute` unconditionally, plus any
/// configured `endpoint_hourly` entry whose path matches.
fn dimensions_for(config: &RateLimitConfig, endpoint: &str) -> Vec<RateLimit> {
    let mut dimensions = Vec::with_capacity(3);
    dimensions.push(config.total_jobs_daily.clone());
    dimensions.push(config.batch_minute.clone());
    for entry in &config.endpoint_hourly {
        if entry.path != endpoint {
            continue;
        }
        match RateLimit::new(entry.limit, 3_600, format!("hourly_endpoint:{endpoint}")) {
            Ok(limit) => dimensions.push(limit),
            Err(error) => warn!(
                %endpoint,
                %error,
                "configured endpoint_hourly limit is invalid; skipping dimension"
            ),
        }
    }
    dimensions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            video_only_daily: RateLimit::new(50, 86_400, "daily_video-only").unwrap(),
            audio_only_daily: RateLimit::new(50, 86_400, "daily_audio-only").unwrap(),
            video_audio_daily: RateLimit::new(50, 86_400, "daily_video-audio").unwrap(),
            total_jobs_daily: RateLimit::new(100, 86_400, "daily_total").unwrap(),
            batch_minute: RateLimit::new(5, 60, "batch_minute").unwrap(),
            endpoint_hourly: vec![],
            whitelist: vec![],
        }
    }

    #[test]
    fn dimensions_for_always_includes_total_and_batch() {
        let dims = dimensions_for(&base_config(), "/api/v1/downloads");
        assert_eq!(dims.len(), 2);
        assert_eq!(dims[0].limit_type, "daily_total");
        assert_eq!(dims[1].limit_type, "batch_minute");
    }

    #[test]
    fn dimensions_for_appends_matching_endpoint_hourly_entries() {
        let mut config = base_config();
        config.endpoint_hourly = vec![
            clipforge_config::EndpointLimit {
                path: "/api/v1/downloads".to_string(),
                limit: 20,
            },
            clipforge_config::EndpointLimit {
                path: "/api/v1/videos/resolutions".to_string(),
                limit: 60,
            },
        ];
        let dims = dimensions_for(&config, "/api/v1/downloads");
        assert_eq!(dims.len(), 3);
        assert_eq!(dims[2].limit_type, "hourly_endpoint:/api/v1/downloads");
        assert_eq!(dims[2].limit, 20);
    }

    #[test]
    fn dimensions_for_skips_invalid_zero_limit_entries() {
        let mut config = base_config();
        config.endpoint_hourly = vec![clipforge_config::EndpointLimit {
            path: "/api/v1/downloads".to_string(),
            limit: 0,
        }];
        let dims = dimensions_for(&config, "/api/v1/downloads");
        assert_eq!(dims.len(), 2);
    }
}

#[async_trait]
impl RateLimitGate for RateLimitGateService {
    async fn admit(&self, client: &ClientIp, endpoint: &str) -> RateLimitDecision {
        if !self.config.enabled {
            return admitted_everything("disabled");
        }

        for limit in dimensions_for(&self.config, endpoint) {
            let outcome = self
                .rate_limits
                .check_and_increment(*client, &limit, &self.config.whitelist)
                .await;
            match outcome {
                AdmissionOutcome::Whitelisted => return admitted_everything("whitelisted"),
                AdmissionOutcome::AdmittedDegraded => continue,
                AdmissionOutcome::Admitted(entity) => {
                    let mut decision = Self::decision_for(true, &entity);
                    decision.limit_type = limit.limit_type.clone();
                    if decision.remaining == 0 {
                        return decision;
                    }
                }
                AdmissionOutcome::Rejected(entity) => {
                    let mut decision = Self::decision_for(false, &entity);
                    decision.limit_type = limit.limit_type.clone();
                    return decision;
                }
            }
        }

        admitted_everything("within_limits")
    }
}
