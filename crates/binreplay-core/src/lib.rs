pub mod annotate;
pub mod error;
pub mod position;
pub mod rewrite;
pub mod schema;
pub mod schema_cache;
pub mod statement;
pub mod transaction;
pub mod types;

pub use annotate::{Marginalia, NoAnnotation, StatementAnnotator};
pub use error::{Error, Result};
pub use position::BinlogPosition;
pub use rewrite::Rewrites;
pub use schema::{Column, TableSchema};
pub use schema_cache::{table_key, Observation, SchemaCache};
pub use statement::Dialect;
pub use transaction::TransactionBuffer;
pub use types::{ChangeEvent, Row, RowChange, Value};
