//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{Request, header::CONTENT_TYPE},
    routing::{get, post},
};
use clipforge_events::{ClientPushHandler, EventBus};
use clipforge_telemetry::{Metrics, build_sha};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::error::{ApiServerError, ApiServerResult};
use crate::facade::AppServices;
use crate::http::handlers::{
    delete_job, get_download_file, get_job_status, post_downloads, post_resolutions,
};
use crate::http::health::{health, metrics};
use crate::http::telemetry::HttpMetricsLayer;
use crate::http::ws::ws_handler;
use crate::openapi::OpenApiDependencies;
use crate::state::ApiState;

/// Axum router wrapper that hosts the job-orchestration API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Construct a new API server with the given service implementations.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the `OpenAPI` document fails.
    pub fn new(
        services: AppServices,
        events: EventBus,
        telemetry: Metrics,
    ) -> ApiServerResult<Self> {
        let openapi = OpenApiDependencies::embedded_at(Path::new("docs/api/openapi.json"));
        Self::with_dependencies(services, events, telemetry, &openapi)
    }

    pub(crate) fn with_dependencies(
        services: AppServices,
        events: EventBus,
        telemetry: Metrics,
        openapi: &OpenApiDependencies,
    ) -> ApiServerResult<Self> {
        (openapi.persist)(&openapi.path, &openapi.document).map_err(|source| {
            ApiServerError::OpenApiPersist {
                path: openapi.path.clone(),
                source,
            }
        })?;

        let ws_hub = Arc::new(crate::http::ws::WsHub::new());
        events.subscribe_all(Arc::new(ClientPushHandler::new(Arc::clone(&ws_hub))));
        let state = Arc::new(ApiState::new(
            services,
            telemetry.clone(),
            Arc::clone(&openapi.document),
            events,
            ws_hub,
        ));

        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers([CONTENT_TYPE]);

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );

        let layered = ServiceBuilder::new()
            .layer(clipforge_telemetry::propagate_request_id_layer())
            .layer(clipforge_telemetry::set_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry));

        let router = Self::build_router()
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Ok(Self { router })
    }

    fn build_router() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route(
                "/docs/openapi.json",
                get(crate::http::docs::openapi_document_handler),
            )
            .route("/api/v1/videos/resolutions", post(post_resolutions))
            .route("/api/v1/downloads", post(post_downloads))
            .route(
                "/api/v1/jobs/{job_id}",
                get(get_job_status).delete(delete_job),
            )
            .route("/api/v1/downloads/file/{token}", get(get_download_file))
            .route("/api/v1/ws", get(ws_handler))
    }

    /// Serve the API using the configured router on the supplied address.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        tracing::info!("Starting API on {}", addr);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|source| ApiServerError::Serve { source })
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}
