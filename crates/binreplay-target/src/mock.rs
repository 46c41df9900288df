use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use binreplay_core::TableSchema;

use crate::client::TargetDatabase;
use crate::error::{TargetError, TargetResult};

/// A mock target database for testing.
#[derive(Clone, Default)]
pub struct MockTarget {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Requests that were executed successfully, in order.
    committed: Vec<String>,
    /// Number of execute calls, including failed ones.
    attempts: usize,
    /// Errors to return from the next execute calls, front first.
    scripted_failures: VecDeque<String>,
    /// If set, every execute fails with this error.
    fail_with: Option<String>,
    /// Schemas returned by `load_table_schema`, keyed by "database.table".
    schemas: HashMap<String, TableSchema>,
    /// Errors to return from the next schema loads, front first.
    scripted_load_failures: VecDeque<String>,
    /// Number of schema loads, including failed ones.
    schema_loads: usize,
}

impl MockTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock target whose every execute fails.
    pub fn failing(error_message: impl Into<String>) -> Self {
        let target = Self::new();
        target.lock().fail_with = Some(error_message.into());
        target
    }

    /// Make the next `count` execute calls fail.
    pub fn fail_next(&self, count: usize, error_message: impl Into<String>) {
        let message = error_message.into();
        let mut state = self.lock();
        for _ in 0..count {
            state.scripted_failures.push_back(message.clone());
        }
    }

    /// Make the next `count` schema loads fail.
    pub fn fail_schema_loads(&self, count: usize, error_message: impl Into<String>) {
        let message = error_message.into();
        let mut state = self.lock();
        for _ in 0..count {
            state.scripted_load_failures.push_back(message.clone());
        }
    }

    /// Register the schema `load_table_schema` reports for a table.
    pub fn set_table_schema(&self, database: &str, table: &str, schema: TableSchema) {
        self.lock()
            .schemas
            .insert(format!("{}.{}", database, table), schema);
    }

    /// Requests that committed, in order.
    pub fn committed(&self) -> Vec<String> {
        self.lock().committed.clone()
    }

    /// Statements of every committed request, without the transaction
    /// envelope or annotations.
    pub fn committed_statements(&self) -> Vec<String> {
        self.lock()
            .committed
            .iter()
            .flat_map(|request| request.split(";\n"))
            .map(strip_comment)
            .filter(|stmt| *stmt != "BEGIN" && *stmt != "COMMIT")
            .map(str::to_string)
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    pub fn schema_loads(&self) -> usize {
        self.lock().schema_loads
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn strip_comment(statement: &str) -> &str {
    match statement.strip_prefix("/*") {
        Some(rest) => rest
            .split_once("*/ ")
            .map(|(_, stmt)| stmt)
            .unwrap_or(statement),
        None => statement,
    }
}

impl TargetDatabase for MockTarget {
    fn execute(&self, query: String) -> impl Future<Output = TargetResult<()>> + Send {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.attempts += 1;

            if let Some(ref error) = state.fail_with {
                return Err(TargetError::Connection(error.clone()));
            }
            if let Some(error) = state.scripted_failures.pop_front() {
                return Err(TargetError::Connection(error));
            }

            state.committed.push(query);
            Ok(())
        }
    }

    fn load_table_schema(
        &self,
        database: String,
        table: String,
    ) -> impl Future<Output = TargetResult<Option<TableSchema>>> + Send {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.schema_loads += 1;
            if let Some(error) = state.scripted_load_failures.pop_front() {
                return Err(TargetError::Connection(error));
            }
            Ok(state.schemas.get(&format!("{}.{}", database, table)).cloned())
        }
    }
}
