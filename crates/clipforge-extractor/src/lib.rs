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
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

//! Subprocess adapter over an external video extractor (`yt-dlp`), format
//! selection, and shared extraction-error classification.
//!
//! Layout: `error.rs` (the adapter's error taxonomy), `classify.rs` (the one
//! shared `categorize_error` function consulted by every application
//! service that talks to the extractor), `format.rs` (format-selector and
//! trim-option computation), `ytdlp.rs` (the actual subprocess adapter).

pub mod classify;
pub mod error;
pub mod format;
pub mod ytdlp;

pub use classify::categorize_error;
pub use error::{ExtractorError, ExtractorResult};
pub use format::{FormatRequest, TrimOptions, container_or_default_no_trim};
pub use ytdlp::{
    DownloadRequest, Extractor, ExtractorEventSink, RawPostprocessorEvent, RawProgressEvent,
    RawProgressStatus, YtDlpExtractor,
};
