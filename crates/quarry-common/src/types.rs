//! Common type definitions for Quarry

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

// ============================================================================
// Query Types
// ============================================================================

/// Kind of plan text submitted to the backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// SQL statement
    Sql,
    /// Logical plan document
    Logical,
    /// Physical plan document
    Physical,
}

impl FromStr for QueryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sql" => Ok(QueryType::Sql),
            "logical" => Ok(QueryType::Logical),
            "physical" => Ok(QueryType::Physical),
            other => Err(Error::InvalidQueryType(other.to_string())),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryType::Sql => "sql",
            QueryType::Logical => "logical",
            QueryType::Physical => "physical",
        };
        f.write_str(name)
    }
}

/// Backend-assigned query identifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct QueryId(Uuid);

impl QueryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Layout Types
// ============================================================================

/// Column value types carried in result chunks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Boolean, bit-packed
    Bit,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    BigInt,
    /// 64-bit IEEE float
    Float8,
    /// UTF-8 string
    VarChar,
}

impl DataType {
    /// Width in bytes of one value, `None` for bit-packed and variable-width types
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            DataType::Int => Some(4),
            DataType::BigInt | DataType::Float8 => Some(8),
            DataType::Bit | DataType::VarChar => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bit => "bit",
            DataType::Int => "int",
            DataType::BigInt => "bigint",
            DataType::Float8 => "float8",
            DataType::VarChar => "varchar",
        };
        f.write_str(name)
    }
}

/// How a column's values are laid out in a chunk payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Values only
    #[default]
    Plain,
    /// Validity bitmap followed by the plain values
    Nullable,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Plain => f.write_str("plain"),
            Encoding::Nullable => f.write_str("nullable"),
        }
    }
}

/// Definition of one column in a layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Value type
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Payload encoding
    #[serde(default)]
    pub encoding: Encoding,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType, encoding: Encoding) -> Self {
        Self {
            name: name.into(),
            data_type,
            encoding,
        }
    }

    pub fn plain(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, Encoding::Plain)
    }

    pub fn nullable(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, Encoding::Nullable)
    }
}

/// Ordered column definitions describing a chunk payload.
///
/// Two layouts are the same layout when their column sequences are equal,
/// regardless of where they came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Layout {
    columns: Vec<ColumnDef>,
}

impl Layout {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

impl From<Vec<ColumnDef>> for Layout {
    fn from(columns: Vec<ColumnDef>) -> Self {
        Self::new(columns)
    }
}

// ============================================================================
// Chunk Types
// ============================================================================

/// Header describing one result chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Rows encoded in the paired payload
    pub row_count: u32,
    /// Layout the payload is encoded with
    pub layout: Layout,
    /// Set on the terminal chunk of a query
    pub is_last_chunk: bool,
}

impl ChunkHeader {
    pub fn new(row_count: u32, layout: Layout, is_last_chunk: bool) -> Self {
        Self {
            row_count,
            layout,
            is_last_chunk,
        }
    }
}
