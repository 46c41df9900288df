mod check_config;
mod run;
mod status;

pub use check_config::cmd_check_config;
pub use run::cmd_run;
pub use status::cmd_status;
