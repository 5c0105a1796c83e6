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
#![allow(clippy::multiple_crate_versions)]

//! Postgres-backed data access layer: migrations, stored procedures, and
//! repository adapters implementing `clipforge_core::repository`'s traits.

pub mod error;
pub mod postgres;

pub use error::{DataError, Result as DataResult};
pub use postgres::{
    Database, PgFileRepository, PgJobArchiveRepository, PgJobRepository, PgRateLimitRepository,
};
