//! Health and metrics endpoints.

use std::sync::Arc;

use axum::{Json, body::Body, extract::State, http::StatusCode, response::Response};
use serde::Serialize;
use tracing::warn;

use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
}

pub(crate) async fn health(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    match state.services.health_probe.check().await {
        Ok(()) => Ok(Json(HealthResponse { status: "ok" })),
        Err(err) => {
            warn!(error = %err, "health check failed");
            Err(ApiError::internal("dependency is currently unavailable"))
        }
    }
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.telemetry.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )
            .body(Body::from(body))
            .map_err(|err| {
                warn!(error = %err, "failed to build metrics response");
                ApiError::internal("failed to build metrics response")
            }),
        Err(err) => {
            warn!(error = %err, "failed to render metrics");
            Err(ApiError::internal("failed to render metrics"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::{AppServices, FileDelivery, HealthProbe, JobOrchestrator, RateLimitGate, VideoCatalog};
    use async_trait::async_trait;
    use chrono::Utc;
    use clipforge_core::{
        ClientIp, DomainError, DomainResult, FormatId, JobId, JobStatusInfo, VideoFormat,
        VideoMetadata,
    };
    use clipforge_events::EventBus;
    use clipforge_telemetry::Metrics;
    use serde_json::json;
    use std::sync::Arc as StdArc;

    struct StubVideoCatalog;
    #[async_trait]
    impl VideoCatalog for StubVideoCatalog {
        async fn resolutions(&self, _url: &str) -> DomainResult<(VideoMetadata, Vec<VideoFormat>)> {
            Err(DomainError::FileNotFound)
        }
    }

    struct StubJobOrchestrator;
    #[async_trait]
    impl JobOrchestrator for StubJobOrchestrator {
        async fn submit(
            &self,
            _client: ClientIp,
            _url: String,
            _format_id: FormatId,
        ) -> DomainResult<JobId> {
            Err(DomainError::FileNotFound)
        }
        async fn status(&self, job_id: JobId) -> DomainResult<JobStatusInfo> {
            Err(DomainError::JobNotFound {
                job_id: job_id.to_string(),
            })
        }
        async fn cancel(&self, _job_id: JobId) -> DomainResult<bool> {
            Ok(false)
        }
    }

    struct StubFileDelivery;
    #[async_trait]
    impl FileDelivery for StubFileDelivery {
        async fn fetch(&self, _token: &str) -> DomainResult<(String, Vec<u8>)> {
            Err(DomainError::FileNotFound)
        }
    }

    struct StubHealthProbe {
        healthy: bool,
    }
    #[async_trait]
    impl HealthProbe for StubHealthProbe {
        async fn check(&self) -> DomainResult<()> {
            if self.healthy {
                Ok(())
            } else {
                Err(DomainError::PersistenceFailure("db unreachable".into()))
            }
        }
    }

    struct StubRateLimitGate;
    #[async_trait]
    impl RateLimitGate for StubRateLimitGate {
        async fn admit(
            &self,
            _client: &ClientIp,
            _endpoint: &str,
        ) -> crate::facade::RateLimitDecision {
            crate::facade::RateLimitDecision {
                allowed: true,
                limit: 100,
                remaining: 99,
                reset_at: Utc::now(),
                limit_type: "daily_total".to_string(),
            }
        }
    }

    fn state_with(healthy: bool) -> StdArc<ApiState> {
        let services = AppServices {
            video_catalog: StdArc::new(StubVideoCatalog),
            job_orchestrator: StdArc::new(StubJobOrchestrator),
            file_delivery: StdArc::new(StubFileDelivery),
            health_probe: StdArc::new(StubHealthProbe { healthy }),
            rate_limit_gate: StdArc::new(StubRateLimitGate),
        };
        StdArc::new(ApiState::new(
            services,
            Metrics::new().expect("metrics"),
            StdArc::new(json!({})),
            EventBus::new(),
            StdArc::new(crate::http::ws::WsHub::new()),
        ))
    }

    #[tokio::test]
    async fn health_reports_ok_when_probe_succeeds() {
        let state = state_with(true);
        let response = health(State(state)).await.expect("health ok");
        assert_eq!(response.0.status, "ok");
    }

    #[tokio::test]
    async fn health_maps_probe_failure_to_internal_error() {
        let state = state_with(false);
        assert!(health(State(state)).await.is_err());
    }
}
