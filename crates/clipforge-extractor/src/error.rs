//! Errors raised by the extractor subprocess adapter.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for extractor operations.
pub type ExtractorResult<T> = Result<T, ExtractorError>;

/// Failure modes of the external extractor.
///
/// The first three variants model the extractor's own typed failures (rule
/// groups 1-2 of the classification order); the remainder are adapter-level
/// failures classified by generic substring heuristics (rule group 4).
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// The extractor reported the video itself is unavailable (private,
    /// deleted, removed) rather than a download-mechanics failure.
    #[error("video unavailable: {message}")]
    VideoUnavailable {
        /// Extractor-reported message.
        message: String,
    },
    /// The extractor's URL-resolution stage failed (unsupported site,
    /// malformed URL, access restriction it can name).
    #[error("extractor failed: {message}")]
    ExtractorFailure {
        /// Extractor-reported message.
        message: String,
    },
    /// The extractor resolved the video but the download itself failed.
    #[error("download failed: {message}")]
    DownloadFailure {
        /// Extractor-reported message.
        message: String,
    },
    /// The subprocess could not be spawned.
    #[error("failed to spawn extractor process")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Reading or writing the subprocess's standard streams failed.
    #[error("extractor stream io failed")]
    Io {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The subprocess exited with a non-zero status and no more specific
    /// classification applied.
    #[error("extractor exited with status {code:?}")]
    NonZeroExit {
        /// Process exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard error output.
        stderr: String,
    },
    /// The subprocess exited successfully but the expected output file is
    /// missing from disk.
    #[error("expected output file missing: {}", expected.display())]
    OutputMissing {
        /// Path the extractor was expected to produce.
        expected: PathBuf,
    },
    /// A progress or manifest line could not be parsed as JSON.
    #[error("failed to decode extractor output: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },
}
