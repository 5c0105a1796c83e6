//! # Design
//!
//! - Centralize application-level errors for bootstrap and orchestration.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: clipforge_config::ConfigError,
    },
    /// Connecting to or migrating the database failed.
    #[error("database operation failed")]
    Database {
        /// Operation identifier.
        operation: &'static str,
        /// Source data-layer error.
        source: clipforge_data::DataError,
    },
    /// Preparing the filesystem storage backend failed.
    #[error("storage operation failed")]
    Storage {
        /// Operation identifier.
        operation: &'static str,
        /// Source storage error.
        source: clipforge_storage::FsStorageError,
    },
    /// API server bootstrap or serving failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: clipforge_api::ApiServerError,
    },
    /// Telemetry initialization failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source error reported by the telemetry crate.
        source: anyhow::Error,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
    /// Required runtime state was missing.
    #[error("missing state")]
    MissingState {
        /// State field that was missing.
        field: &'static str,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: clipforge_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn database(
        operation: &'static str,
        source: clipforge_data::DataError,
    ) -> Self {
        Self::Database { operation, source }
    }

    pub(crate) const fn storage(
        operation: &'static str,
        source: clipforge_storage::FsStorageError,
    ) -> Self {
        Self::Storage { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: clipforge_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn telemetry(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Telemetry { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "load",
            clipforge_config::ConfigError::Missing("DATABASE_URL".to_string()),
        );
        assert!(matches!(config, AppError::Config { .. }));

        let api = AppError::api_server(
            "serve",
            clipforge_api::ApiServerError::Serve {
                source: io::Error::other("io"),
            },
        );
        assert!(matches!(api, AppError::ApiServer { .. }));

        let telemetry = AppError::telemetry("init", anyhow::anyhow!("failed to install"));
        assert!(matches!(telemetry, AppError::Telemetry { .. }));

        let io_err = AppError::Io {
            operation: "signal",
            source: io::Error::other("broken"),
        };
        assert!(matches!(io_err, AppError::Io { .. }));
    }
}
