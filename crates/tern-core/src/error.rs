//! Error types for configuration loading and request validation.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while reading or validating the daemon configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A scheduling request that cannot be accepted as submitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("request has no application id")]
    EmptyAppId,

    #[error("request contains no tasks")]
    NoTasks,

    #[error("duplicate task id in request: {0}")]
    DuplicateTaskId(String),

    #[error("probe ratio must be a positive number, got {0}")]
    InvalidProbeRatio(f64),
}
