mod client;
mod connect;
mod error;
mod mock;
mod postgres;

pub use client::TargetDatabase;
pub use connect::connect_postgres;
pub use error::{TargetError, TargetResult};
pub use mock::MockTarget;
pub use postgres::PostgresTarget;
