//! Error types for Quarry
//!
//! Provides a unified error type hierarchy for the client, the embedded
//! backend and the wire protocol.

use std::time::Duration;

use thiserror::Error;

use crate::types::QueryType;

/// Result type alias using Quarry's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Quarry
#[derive(Error, Debug)]
pub enum Error {
    // Payload Errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    // Query Failures
    #[error("Query failed: {0}")]
    Rpc(#[from] RpcError),

    // Plan Errors
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    // Network Errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    // Protocol Errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Invalid query type: {0}")]
    InvalidQueryType(String),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO Errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Internal Errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A chunk payload that cannot be read against its declared layout
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("column '{column}' needs {needed} bytes but only {remaining} remain")]
    Truncated {
        column: String,
        needed: usize,
        remaining: usize,
    },

    #[error("{0} trailing bytes after the last column")]
    TrailingBytes(usize),

    #[error("column '{column}' has invalid offsets: {reason}")]
    InvalidOffsets { column: String, reason: String },

    #[error("column '{column}' holds invalid UTF-8 at row {row}")]
    InvalidUtf8 { column: String, row: usize },
}

/// Cause recorded when a query fails.
///
/// Backend-reported failures and client-side decode faults travel the same
/// failure path; the variant only records where the failure came from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("{0}")]
    Remote(String),

    #[error("schema change failure: {0}")]
    SchemaChange(#[from] DecodeError),

    #[error("connection lost: {0}")]
    ConnectionLost(String),
}

/// Outcome of waiting on a query that did not complete normally
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("{0}")]
    Failed(#[from] RpcError),

    #[error("result stream abandoned after {waited:?} without a last chunk")]
    Abandoned { waited: Duration },
}

/// Plan-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("{0} plans are not supported by this backend")]
    Unsupported(QueryType),

    #[error("Fragment {fragment} has no columns")]
    EmptyLayout { fragment: usize },

    #[error("Fragment {fragment} row {row} has {actual} values, expected {expected}")]
    RowWidth {
        fragment: usize,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Type mismatch in column '{column}' row {row}: expected {expected}")]
    TypeMismatch {
        column: String,
        row: usize,
        expected: String,
    },
}

/// Network-related errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Address resolution failed: {0}")]
    AddressResolution(String),

    #[error("No backend is available")]
    NoBackend,
}

/// Protocol-related errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
