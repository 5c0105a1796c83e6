//! API bootstrap and wiring.

use clipforge_events::EventBus;
use clipforge_telemetry::Metrics;

use crate::error::ApiServerResult;
use crate::facade::AppServices;
use crate::http::router::ApiServer;

/// Build the API server with the provided service implementations.
///
/// # Errors
///
/// Returns an error if persisting the `OpenAPI` document fails.
pub fn build_api(
    services: AppServices,
    events: EventBus,
    metrics: Metrics,
) -> ApiServerResult<ApiServer> {
    ApiServer::new(services, events, metrics)
}
