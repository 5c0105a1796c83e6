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

//! Filesystem-backed implementation of [`clipforge_core::FileStorageRepository`],
//! plus the extractor scratch-directory sweeper used by the reaper.
//! Layout: `error.rs` (error types), `fs_storage.rs` (the adapter), `scratch.rs`
//! (orphan-file cleanup).

pub mod error;
mod fs_storage;
mod scratch;

pub use error::{FsStorageError, FsStorageResult};
pub use fs_storage::FilesystemStorage;
pub use scratch::{sweep_scratch_dir, ScratchSweepSummary};
