use std::time::Duration;

use binreplay_core::Rewrites;
use binreplay_writer::{RetryPolicy, WriterConfig};

use crate::error::{ConfigError, ConfigResult};
use crate::replay::ReplayConfig;

/// Validate a replay configuration.
pub fn validate_config(config: &ReplayConfig) -> ConfigResult<()> {
    validate_writer(config)?;
    validate_retry(config)?;
    validate_required(config)?;
    Ok(())
}

fn validate_writer(config: &ReplayConfig) -> ConfigResult<()> {
    if config.writer.batch_size == 0 {
        return Err(ConfigError::InvalidBatchSize);
    }
    if config.writer.queue_capacity == Some(0) {
        return Err(ConfigError::InvalidQueueCapacity);
    }
    Ok(())
}

fn validate_retry(config: &ReplayConfig) -> ConfigResult<()> {
    let retry = &config.retry;
    if retry.max_attempts == 0 {
        return Err(ConfigError::InvalidRetryAttempts);
    }
    if !retry.backoff_factor.is_finite() || retry.backoff_factor < 1.0 {
        return Err(ConfigError::InvalidBackoffFactor(retry.backoff_factor));
    }
    if retry.max_delay_ms < retry.initial_delay_ms {
        return Err(ConfigError::InvalidRetryDelays {
            initial_ms: retry.initial_delay_ms,
            max_ms: retry.max_delay_ms,
        });
    }
    Ok(())
}

fn validate_required(config: &ReplayConfig) -> ConfigResult<()> {
    if config.target.connection_string.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "target.connection_string".to_string(),
        });
    }
    if config.state.path.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "state.path".to_string(),
        });
    }
    if config.state.stream.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "state.stream".to_string(),
        });
    }
    Ok(())
}

/// Convert a validated replay config to the writer's configuration.
pub fn to_writer_config(config: &ReplayConfig) -> ConfigResult<WriterConfig> {
    validate_config(config)?;

    let writer = &config.writer;
    let retry = &config.retry;

    Ok(WriterConfig {
        batch_size: writer.batch_size,
        queue_capacity: writer.queue_capacity,
        retry: RetryPolicy {
            max_attempts: retry.max_attempts,
            initial_delay: Duration::from_millis(retry.initial_delay_ms),
            max_delay: Duration::from_millis(retry.max_delay_ms),
            backoff_factor: retry.backoff_factor,
        },
        drift_policy: writer.drift_policy,
        dialect: writer.dialect,
        rewrites: Rewrites::new(
            config.rewrites.databases.clone(),
            config.rewrites.tables.clone(),
        ),
        marginalia: writer.marginalia.clone(),
    })
}
