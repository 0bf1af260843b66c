//! # Engine Errors

use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Failures reported by a connection or connector
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Could not connect to {0}")]
    ConnectionFailed(String),

    #[error("Unknown database: {0}")]
    UnknownDatabase(String),

    #[error("Table '{db}.{table}' doesn't exist")]
    UnknownTable { db: String, table: String },

    #[error("Duplicate entry '{key}' for key 'PRIMARY'")]
    DuplicateKey { key: String },

    #[error("Missing value for placeholder :{0}")]
    MissingBind(String),

    #[error("Invalid value for column '{column}': {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("Unsupported statement: {0}")]
    Unsupported(String),
}
