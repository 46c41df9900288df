use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::position::BinlogPosition;
use crate::schema::TableSchema;
use crate::statement::{self, Dialect};

/// A decoded column value, supporting the types the replication log carries.
///
/// Decimals, temporal values and enums arrive from the decoder already
/// rendered as strings. On the wire, scalars are bare JSON while bytes and
/// JSON documents are wrapped as `{"bytes": "<hex>"}` and `{"json": <doc>}`,
/// so a document that happens to be an array of small integers is never read
/// back as bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireValue", into = "WireValue")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes {
        #[serde(with = "hex::serde")]
        bytes: Vec<u8>,
    },
    Json {
        json: serde_json::Value,
    },
}

impl From<WireValue> for Value {
    fn from(wire: WireValue) -> Self {
        match wire {
            WireValue::Null => Value::Null,
            WireValue::Bool(b) => Value::Bool(b),
            WireValue::Int(i) => Value::Int(i),
            WireValue::UInt(u) => Value::UInt(u),
            WireValue::Float(f) => Value::Float(f),
            WireValue::String(s) => Value::String(s),
            WireValue::Bytes { bytes } => Value::Bytes(bytes),
            WireValue::Json { json } => Value::Json(json),
        }
    }
}

impl From<Value> for WireValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => WireValue::Null,
            Value::Bool(b) => WireValue::Bool(b),
            Value::Int(i) => WireValue::Int(i),
            Value::UInt(u) => WireValue::UInt(u),
            Value::Float(f) => WireValue::Float(f),
            Value::String(s) => WireValue::String(s),
            Value::Bytes(bytes) => WireValue::Bytes { bytes },
            Value::Json(json) => WireValue::Json { json },
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// A positional row image, aligned with the event's schema columns.
pub type Row = Vec<Value>;

/// The row images carried by each kind of mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum RowChange {
    Insert { new: Row },
    Update { old: Row, new: Row },
    Delete { old: Row },
}

/// A row-level change decoded from the source's replication log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Source database name (before rewrites).
    pub database: String,
    /// Source table name (before rewrites).
    pub table: String,
    /// Columns the row images were encoded against.
    pub schema: TableSchema,
    #[serde(flatten)]
    pub change: RowChange,
    /// Where this event sits in the replication log.
    pub position: BinlogPosition,
    /// Position that is safe to resume from once this event is applied.
    pub resumable_position: BinlogPosition,
    /// Source commit time.
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Create an event whose resumable position equals its position.
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        schema: TableSchema,
        change: RowChange,
        position: BinlogPosition,
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            schema,
            change,
            resumable_position: position.clone(),
            position,
            timestamp: Utc::now(),
        }
    }

    pub fn with_resumable_position(mut self, position: BinlogPosition) -> Self {
        self.resumable_position = position;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Render this event as a statement against `database`.`table`.
    ///
    /// The names are the target names, i.e. after rewrites were applied.
    pub fn to_sql(&self, dialect: Dialect, database: &str, table: &str) -> Result<String> {
        let target = dialect.qualified_table(database, table);
        match &self.change {
            RowChange::Insert { new } => statement::insert(dialect, &target, &self.schema, new),
            RowChange::Update { old, new } => {
                statement::update(dialect, &target, &self.schema, old, new)
            }
            RowChange::Delete { old } => statement::delete(dialect, &target, &self.schema, old),
        }
    }
}
