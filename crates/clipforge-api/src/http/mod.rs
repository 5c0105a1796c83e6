//! HTTP and `WebSocket` surface modules.

/// Shared constants and header names for HTTP surfaces.
pub(crate) mod constants;
/// OpenAPI document publishing.
pub(crate) mod docs;
/// Problem response helpers and error types.
pub(crate) mod errors;
/// Job, video, and file handlers.
pub(crate) mod handlers;
/// Health and metrics endpoints.
pub(crate) mod health;
/// Rate limit header helpers for HTTP responses.
pub(crate) mod rate_limit;
/// Router construction and server host.
pub mod router;
/// Metrics middleware for HTTP requests.
pub(crate) mod telemetry;
/// `WebSocket` push hub and handler.
pub(crate) mod ws;
