//! # Design
//!
//! - Provide structured, constant-message errors for filesystem storage.
//! - Capture operation context (paths) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem storage operations.
pub type FsStorageResult<T> = Result<T, FsStorageError>;

/// Errors produced by the filesystem-backed [`clipforge_core::FileStorageRepository`].
#[derive(Debug, Error)]
pub enum FsStorageError {
    /// IO failures while interacting with the filesystem.
    #[error("storage io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A requested path escaped the configured storage root.
    #[error("storage path traversal rejected")]
    PathTraversal {
        /// The offending relative path as supplied by the caller.
        requested: String,
    },
}

impl FsStorageError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn io_helper_preserves_source() {
        let err = FsStorageError::io("read", "path", io::Error::other("boom"));
        assert!(matches!(err, FsStorageError::Io { .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn path_traversal_variant_carries_requested_path() {
        let err = FsStorageError::PathTraversal {
            requested: "../../etc/passwd".to_string(),
        };
        assert!(matches!(err, FsStorageError::PathTraversal { .. }));
    }
}
