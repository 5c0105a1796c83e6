//! Shared application state injected into every axum handler.

use std::sync::Arc;

use clipforge_events::EventBus;
use clipforge_telemetry::Metrics;
use serde_json::Value;

use crate::facade::AppServices;
use crate::http::ws::WsHub;

/// State shared across the router, cloned per request via `Arc`.
pub struct ApiState {
    /// Facade implementations backing every handler.
    pub services: AppServices,
    /// Prometheus metrics registry.
    pub telemetry: Metrics,
    /// Embedded `OpenAPI` document served at `/docs/openapi.json`.
    pub openapi_document: Arc<Value>,
    /// Domain event bus, used to register the `WebSocket` push handler at bootstrap.
    pub events: EventBus,
    /// Per-job `WebSocket` subscriber registry.
    pub ws_hub: Arc<WsHub>,
}

impl ApiState {
    /// Construct state from its parts.
    #[must_use]
    pub fn new(
        services: AppServices,
        telemetry: Metrics,
        openapi_document: Arc<Value>,
        events: EventBus,
        ws_hub: Arc<WsHub>,
    ) -> Self {
        Self {
            services,
            telemetry,
            openapi_document,
            events,
            ws_hub,
        }
    }
}
