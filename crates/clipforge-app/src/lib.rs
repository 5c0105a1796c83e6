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
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Clipforge application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (dependency construction and the serve/reaper run
//! loop), `reaper.rs` (background archival and cleanup sweep), `services/`
//! (facade implementations wiring `clipforge-core` service types into the
//! `clipforge-api` seams), `error.rs` (application-level error type).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application-level error type.
pub mod error;
mod reaper;
mod services;

pub use bootstrap::run_app;
