//! Configuration loading errors.

/// Failure loading or validating [`crate::Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable {0}")]
    Missing(String),

    /// An environment variable was set but failed to parse.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Name of the offending environment variable.
        key: String,
        /// Human-readable parse/validation failure.
        reason: String,
    },
}

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
