mod error;
mod replay;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use replay::{
    resolve_env, ReplayConfig, RetrySection, RewritesSection, StateSection, TargetSection,
    WriterSection, BATCH_SIZE_ENV, WRITE_RETRIES_ENV,
};
pub use validation::{to_writer_config, validate_config};
