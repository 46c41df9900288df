use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("batch_size must be at least 1")]
    InvalidBatchSize,

    #[error("queue_capacity must be at least 1")]
    InvalidQueueCapacity,

    #[error("retry max_attempts must be at least 1")]
    InvalidRetryAttempts,

    #[error("retry backoff_factor must be a number >= 1.0, got {0}")]
    InvalidBackoffFactor(f64),

    #[error("retry max_delay_ms ({max_ms}) is below initial_delay_ms ({initial_ms})")]
    InvalidRetryDelays { initial_ms: u64, max_ms: u64 },

    #[error("invalid value '{value}' for {var}: expected a non-negative integer")]
    InvalidEnvOverride { var: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
