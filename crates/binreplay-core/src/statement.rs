//! Rendering of change events into target statements.
//!
//! Inserts are rendered as conflict-ignoring inserts and updates/deletes match
//! on the full old row image, so replaying a batch that was already applied
//! leaves the target unchanged.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::TableSchema;
use crate::types::{Row, Value};

/// SQL dialect of the target database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(rename = "mysql")]
    MySql,
    #[default]
    Postgres,
}

impl Dialect {
    /// Quote an identifier, doubling any embedded quote character.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Render `database.table` with both parts quoted.
    pub fn qualified_table(self, database: &str, table: &str) -> String {
        format!(
            "{}.{}",
            self.quote_identifier(database),
            self.quote_identifier(table)
        )
    }

    /// Render a value as a literal for `column`.
    pub fn literal(self, column: &str, value: &Value) -> Result<String> {
        match value {
            Value::Null => Ok("NULL".to_string()),
            Value::Bool(true) => Ok("TRUE".to_string()),
            Value::Bool(false) => Ok("FALSE".to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::UInt(u) => Ok(u.to_string()),
            Value::Float(f) => {
                if !f.is_finite() {
                    return Err(Error::NonFiniteFloat {
                        column: column.to_string(),
                    });
                }
                Ok(f.to_string())
            }
            Value::String(s) => self.quote_string(column, s),
            Value::Bytes(b) => Ok(match self {
                Dialect::MySql => format!("X'{}'", hex::encode(b)),
                Dialect::Postgres => format!("'\\x{}'::bytea", hex::encode(b)),
            }),
            Value::Json(v) => {
                let text = serde_json::to_string(v)?;
                self.quote_string(column, &text)
            }
        }
    }

    fn quote_string(self, column: &str, s: &str) -> Result<String> {
        match self {
            Dialect::MySql => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('\'');
                for c in s.chars() {
                    match c {
                        '\0' => out.push_str("\\0"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\x1a' => out.push_str("\\Z"),
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("\\'"),
                        '"' => out.push_str("\\\""),
                        c => out.push(c),
                    }
                }
                out.push('\'');
                Ok(out)
            }
            Dialect::Postgres => {
                if s.contains('\0') {
                    return Err(Error::UnsupportedValue {
                        column: column.to_string(),
                        reason: "text values cannot contain NUL bytes".to_string(),
                    });
                }
                Ok(format!("'{}'", s.replace('\'', "''")))
            }
        }
    }
}

fn check_row(table: &str, schema: &TableSchema, row: &Row) -> Result<()> {
    if row.is_empty() || schema.is_empty() {
        return Err(Error::EmptyRowImage {
            table: table.to_string(),
        });
    }
    if row.len() != schema.len() {
        return Err(Error::RowArityMismatch {
            table: table.to_string(),
            expected: schema.len(),
            actual: row.len(),
        });
    }
    Ok(())
}

/// `col = value` pairs joined by `separator`, with `IS NULL` for nulls when
/// rendering a predicate.
fn column_pairs(
    dialect: Dialect,
    schema: &TableSchema,
    row: &Row,
    separator: &str,
    predicate: bool,
) -> Result<String> {
    let mut parts = Vec::with_capacity(row.len());
    for (column, value) in schema.columns.iter().zip(row) {
        let name = dialect.quote_identifier(&column.name);
        if predicate && value.is_null() {
            parts.push(format!("{} IS NULL", name));
        } else {
            parts.push(format!("{} = {}", name, dialect.literal(&column.name, value)?));
        }
    }
    Ok(parts.join(separator))
}

pub(crate) fn insert(dialect: Dialect, table: &str, schema: &TableSchema, new: &Row) -> Result<String> {
    check_row(table, schema, new)?;

    let columns: Vec<String> = schema
        .column_names()
        .map(|name| dialect.quote_identifier(name))
        .collect();
    let values = schema
        .columns
        .iter()
        .zip(new)
        .map(|(column, value)| dialect.literal(&column.name, value))
        .collect::<Result<Vec<_>>>()?;

    Ok(match dialect {
        Dialect::MySql => format!(
            "INSERT IGNORE INTO {} ({}) VALUES ({})",
            table,
            columns.join(","),
            values.join(",")
        ),
        Dialect::Postgres => format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING",
            table,
            columns.join(","),
            values.join(",")
        ),
    })
}

pub(crate) fn update(
    dialect: Dialect,
    table: &str,
    schema: &TableSchema,
    old: &Row,
    new: &Row,
) -> Result<String> {
    check_row(table, schema, old)?;
    check_row(table, schema, new)?;

    Ok(format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        column_pairs(dialect, schema, new, ",", false)?,
        column_pairs(dialect, schema, old, " AND ", true)?
    ))
}

pub(crate) fn delete(dialect: Dialect, table: &str, schema: &TableSchema, old: &Row) -> Result<String> {
    check_row(table, schema, old)?;

    Ok(format!(
        "DELETE FROM {} WHERE {}",
        table,
        column_pairs(dialect, schema, old, " AND ", true)?
    ))
}
