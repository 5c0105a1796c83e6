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

//! HTTP and WebSocket surface for the job-orchestration service.
//!
//! This crate has no dependency on Postgres or the filesystem: every domain
//! operation is reached through the facade traits in [`facade`], concrete
//! implementations of which are constructed and injected by `clipforge-app`
//! at process startup. Layout: `facade.rs` (service seams), `state.rs`
//! (`ApiState`), `http/` (routes, middleware, the WebSocket push handler),
//! `openapi.rs` (embedded API document), `error.rs` (bootstrap failures).

pub mod error;
pub mod facade;
pub mod http;
pub mod models;
pub mod openapi;
pub mod state;

mod bootstrap;

pub use bootstrap::build_api;
pub use error::{ApiServerError, ApiServerResult};
pub use facade::{
    AppServices, FileDelivery, HealthProbe, JobOrchestrator, RateLimitDecision, RateLimitGate,
    VideoCatalog,
};
pub use http::router::ApiServer;
pub use state::ApiState;
