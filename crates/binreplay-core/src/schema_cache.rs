//! Last-seen schema per target table.
//!
//! Owned by the binlog writer's consumer task. A table's entry is replaced
//! only once a schema change has been confirmed against the target.

use std::collections::HashMap;

use crate::schema::TableSchema;

/// Cache key for a target table.
pub fn table_key(database: &str, table: &str) -> String {
    format!("{}.{}", database, table)
}

/// Outcome of comparing an event's schema with the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// First time this table was seen; the schema is now cached.
    FirstSeen,
    /// The event matches the cached schema.
    Unchanged,
    /// The event disagrees with the cached schema, which is left untouched.
    Drifted { cached: TableSchema },
}

#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    tables: HashMap<String, TableSchema>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, key: &str, schema: &TableSchema) -> Observation {
        match self.tables.get(key) {
            Some(cached) if cached == schema => Observation::Unchanged,
            Some(cached) => Observation::Drifted {
                cached: cached.clone(),
            },
            None => {
                self.tables.insert(key.to_string(), schema.clone());
                Observation::FirstSeen
            }
        }
    }

    /// Replace the cached schema after a drift was reconciled.
    pub fn replace(&mut self, key: &str, schema: TableSchema) {
        self.tables.insert(key.to_string(), schema);
    }

    pub fn get(&self, key: &str) -> Option<&TableSchema> {
        self.tables.get(key)
    }
}
