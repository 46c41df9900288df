use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A coordinate in the source's replication log.
///
/// Ordered by file name first, then by offset within the file. Binlog file
/// names carry a zero-padded sequence suffix, so lexical order of the file
/// name matches log order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BinlogPosition {
    /// Log file name (e.g., "mysql-bin.000042").
    pub file: String,
    /// Byte offset within the file.
    pub offset: u64,
}

impl BinlogPosition {
    pub fn new(file: impl Into<String>, offset: u64) -> Self {
        Self {
            file: file.into(),
            offset,
        }
    }
}

impl fmt::Display for BinlogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.offset)
    }
}

impl FromStr for BinlogPosition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (file, offset) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidPosition(s.to_string()))?;

        if file.is_empty() {
            return Err(Error::InvalidPosition(s.to_string()));
        }

        let offset = offset
            .parse::<u64>()
            .map_err(|_| Error::InvalidPosition(s.to_string()))?;

        Ok(Self::new(file, offset))
    }
}
