use std::collections::HashMap;
use std::fs;
use std::path::Path;

use binreplay_core::Dialect;
use binreplay_writer::DriftPolicy;
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// Overrides `[writer] batch_size`.
pub const BATCH_SIZE_ENV: &str = "BINREPLAY_BATCH_SIZE";
/// Overrides `[retry] max_attempts`.
pub const WRITE_RETRIES_ENV: &str = "BINREPLAY_WRITE_RETRIES";

/// Replay configuration as parsed from binreplay.toml.
#[derive(Debug, Deserialize)]
pub struct ReplayConfig {
    #[serde(default)]
    pub writer: WriterSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub rewrites: RewritesSection,
    pub target: TargetSection,
    pub state: StateSection,
}

impl ReplayConfig {
    /// Parse a replay config from a TOML string.
    pub fn parse(toml_str: &str) -> ConfigResult<Self> {
        let config: ReplayConfig = toml::from_str(toml_str)?;
        Ok(config)
    }

    /// Read and parse a config file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&content)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `BINREPLAY_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(BATCH_SIZE_ENV) {
            self.writer.batch_size = parse_override(BATCH_SIZE_ENV, &value)?;
        }
        if let Some(value) = lookup(WRITE_RETRIES_ENV) {
            self.retry.max_attempts = parse_override(WRITE_RETRIES_ENV, &value)?;
        }
        Ok(())
    }

    /// The target connection string with `${VAR}` references resolved.
    pub fn target_connection_string(&self) -> String {
        resolve_env(&self.target.connection_string)
    }

    /// The state database path with `${VAR}` references resolved.
    pub fn state_path(&self) -> String {
        resolve_env(&self.state.path)
    }
}

fn parse_override<T: std::str::FromStr>(var: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride {
            var: var.to_string(),
            value: value.to_string(),
        })
}

/// Resolve environment variables in a string.
/// Supports ${VAR_NAME} syntax; unset variables resolve to an empty string.
pub fn resolve_env(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + len];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }

    result.push_str(rest);
    result
}

/// `[writer]` section.
#[derive(Debug, Deserialize)]
pub struct WriterSection {
    /// Maximum events per transaction.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Inbound queue capacity, defaults to the batch size.
    pub queue_capacity: Option<usize>,
    /// "fail" or "reload".
    #[serde(default)]
    pub drift_policy: DriftPolicy,
    #[serde(default)]
    pub dialect: Dialect,
    /// Comment prefixed to every applied statement.
    pub marginalia: Option<String>,
}

fn default_batch_size() -> usize {
    100
}

impl Default for WriterSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            queue_capacity: None,
            drift_policy: DriftPolicy::default(),
            dialect: Dialect::default(),
            marginalia: None,
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

/// `[rewrites]` section: source name to target name.
#[derive(Debug, Default, Deserialize)]
pub struct RewritesSection {
    #[serde(default)]
    pub databases: HashMap<String, String>,
    #[serde(default)]
    pub tables: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct TargetSection {
    pub connection_string: String,
}

#[derive(Debug, Deserialize)]
pub struct StateSection {
    /// Path of the SQLite checkpoint database.
    pub path: String,
    /// Stream name checkpoints are recorded under.
    #[serde(default = "default_stream")]
    pub stream: String,
}

fn default_stream() -> String {
    "default".to_string()
}
