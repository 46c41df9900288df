use std::future::Future;

use binreplay_core::TableSchema;

use crate::error::TargetResult;

/// Trait for the database events are replayed into.
pub trait TargetDatabase: Send + Sync {
    /// Execute a request holding a complete transaction (`BEGIN` ... `COMMIT`).
    ///
    /// On error nothing from the request may remain applied.
    fn execute(&self, query: String) -> impl Future<Output = TargetResult<()>> + Send;

    /// Load the current column list of a target table, in ordinal order.
    /// Returns `None` if the table does not exist.
    fn load_table_schema(
        &self,
        database: String,
        table: String,
    ) -> impl Future<Output = TargetResult<Option<TableSchema>>> + Send;
}
