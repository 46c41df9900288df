use std::collections::HashMap;

/// Source-to-target renames, applied to database and table names
/// independently of each other.
#[derive(Debug, Clone, Default)]
pub struct Rewrites {
    pub databases: HashMap<String, String>,
    pub tables: HashMap<String, String>,
}

impl Rewrites {
    pub fn new(databases: HashMap<String, String>, tables: HashMap<String, String>) -> Self {
        Self { databases, tables }
    }

    pub fn database<'a>(&'a self, name: &'a str) -> &'a str {
        self.databases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn table<'a>(&'a self, name: &'a str) -> &'a str {
        self.tables.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Resolve the target `(database, table)` for a source table.
    pub fn resolve<'a>(&'a self, database: &'a str, table: &'a str) -> (&'a str, &'a str) {
        (self.database(database), self.table(table))
    }
}
