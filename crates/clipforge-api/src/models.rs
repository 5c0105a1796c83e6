//! Shared HTTP DTOs for the job-orchestration API.
//!
//! Re-exported from `clipforge-api-models` so API consumers share a single
//! source of truth for request/response shapes.

pub use clipforge_api_models::*;
