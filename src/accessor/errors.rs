//! Accessor error types
//!
//! Error codes:
//! - SHARD_DIVISION_KEY_MISSING (REJECT)
//! - SHARD_PRIMARY_KEY_MISMATCH (REJECT)
//! - SHARD_REPLICA_WRITE_REJECTED (REJECT)
//! - SHARD_NO_WRITABLE_FIELDS (REJECT)
//! - SHARD_INVALID_VALUE (REJECT)
//! - SHARD_UNKNOWN_ENTITY (REJECT)
//! - SHARD_NOTHING_TO_SAVE (REJECT)
//! - SHARD_EXECUTION_FAILED (ERROR)
//! - SHARD_CONFIGURATION_LOAD_FAILED (FATAL)
//!
//! REJECT errors are raised before any connection is acquired.

use std::fmt;

use crate::config::ConfigError;
use crate::engine::EngineError;

/// Severity levels for accessor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Caller input rejected, no I/O attempted
    Reject,
    /// The engine failed the statement
    Error,
    /// The entity cannot be served at all
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Accessor error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorErrorCode {
    /// Neither hint nor payload carries the division key
    DivisionKeyMissing,
    /// Where-map keys differ from the declared primary key
    PrimaryKeyMismatch,
    /// Write statement requested against a replica
    ReplicaWriteRejected,
    /// No catalogued field left to write
    NoWritableFields,
    /// Bulk rows do not all carry the same catalogued fields
    BulkFieldMismatch,
    /// A diff field was given a non-numeric value
    InvalidValue,
    /// Entity id has no registered accessor
    UnknownEntity,
    /// Record model has no pending change
    NothingToSave,
    /// The engine rejected or failed the statement
    ExecutionFailure,
    /// Malformed or unreadable configuration
    ConfigurationLoadFailure,
}

impl AccessorErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            AccessorErrorCode::DivisionKeyMissing => "SHARD_DIVISION_KEY_MISSING",
            AccessorErrorCode::PrimaryKeyMismatch => "SHARD_PRIMARY_KEY_MISMATCH",
            AccessorErrorCode::ReplicaWriteRejected => "SHARD_REPLICA_WRITE_REJECTED",
            AccessorErrorCode::NoWritableFields => "SHARD_NO_WRITABLE_FIELDS",
            AccessorErrorCode::BulkFieldMismatch => "SHARD_BULK_FIELD_MISMATCH",
            AccessorErrorCode::InvalidValue => "SHARD_INVALID_VALUE",
            AccessorErrorCode::UnknownEntity => "SHARD_UNKNOWN_ENTITY",
            AccessorErrorCode::NothingToSave => "SHARD_NOTHING_TO_SAVE",
            AccessorErrorCode::ExecutionFailure => "SHARD_EXECUTION_FAILED",
            AccessorErrorCode::ConfigurationLoadFailure => "SHARD_CONFIGURATION_LOAD_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            AccessorErrorCode::ExecutionFailure => Severity::Error,
            AccessorErrorCode::ConfigurationLoadFailure => Severity::Fatal,
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for AccessorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Accessor error with context
#[derive(Debug, Clone)]
pub struct AccessorError {
    code: AccessorErrorCode,
    message: String,
    /// Engine failure, kept for callers that branch on it
    engine: Option<EngineError>,
}

impl AccessorError {
    fn new(code: AccessorErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            engine: None,
        }
    }

    pub fn division_key_missing(key_name: &str) -> Self {
        Self::new(
            AccessorErrorCode::DivisionKeyMissing,
            format!("division key '{}' was not provided", key_name),
        )
    }

    pub fn division_key_invalid(key_name: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            AccessorErrorCode::DivisionKeyMissing,
            format!("division key '{}' is not an integer: {}", key_name, reason),
        )
    }

    pub fn primary_key_mismatch(expected: &[String], actual: &[&str]) -> Self {
        Self::new(
            AccessorErrorCode::PrimaryKeyMismatch,
            format!(
                "where keys [{}] do not match primary key [{}]",
                actual.join(", "),
                expected.join(", ")
            ),
        )
    }

    pub fn replica_write_rejected(sql: &str) -> Self {
        Self::new(
            AccessorErrorCode::ReplicaWriteRejected,
            format!("write statement rejected on replica: {}", sql),
        )
    }

    pub fn no_writable_fields(operation: &str) -> Self {
        Self::new(
            AccessorErrorCode::NoWritableFields,
            format!("{} has no catalogued field to write", operation),
        )
    }

    pub fn bulk_field_mismatch(row: usize, expected: &[&str], actual: &[&str]) -> Self {
        Self::new(
            AccessorErrorCode::BulkFieldMismatch,
            format!(
                "row {} carries fields [{}], first row carries [{}]",
                row,
                actual.join(", "),
                expected.join(", ")
            ),
        )
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Self::new(
            AccessorErrorCode::InvalidValue,
            format!("field '{}': {}", field, reason.into()),
        )
    }

    pub fn unknown_entity(entity: &str) -> Self {
        Self::new(
            AccessorErrorCode::UnknownEntity,
            format!("no accessor registered for entity '{}'", entity),
        )
    }

    pub fn nothing_to_save(entity: &str) -> Self {
        Self::new(
            AccessorErrorCode::NothingToSave,
            format!("record of '{}' has no pending change", entity),
        )
    }

    pub fn execution_failure(source: EngineError) -> Self {
        Self {
            code: AccessorErrorCode::ExecutionFailure,
            message: source.to_string(),
            engine: Some(source),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AccessorErrorCode::ConfigurationLoadFailure, message)
    }

    /// Returns the error code
    pub fn code(&self) -> AccessorErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the engine failure behind an execution error
    pub fn engine_error(&self) -> Option<&EngineError> {
        self.engine.as_ref()
    }

    /// True for errors raised before any I/O
    pub fn is_rejection(&self) -> bool {
        self.severity() == Severity::Reject
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for AccessorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for AccessorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.engine
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<EngineError> for AccessorError {
    fn from(e: EngineError) -> Self {
        Self::execution_failure(e)
    }
}

impl From<ConfigError> for AccessorError {
    fn from(e: ConfigError) -> Self {
        Self::configuration(e.to_string())
    }
}

/// Result type for accessor operations
pub type AccessorResult<T> = Result<T, AccessorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AccessorErrorCode::DivisionKeyMissing.code(),
            "SHARD_DIVISION_KEY_MISSING"
        );
        assert_eq!(
            AccessorErrorCode::ReplicaWriteRejected.code(),
            "SHARD_REPLICA_WRITE_REJECTED"
        );
        assert_eq!(
            AccessorErrorCode::ConfigurationLoadFailure.code(),
            "SHARD_CONFIGURATION_LOAD_FAILED"
        );
    }

    #[test]
    fn test_bulk_mismatch_names_both_field_sets() {
        let err = AccessorError::bulk_field_mismatch(1, &["user_id", "amount"], &["user_id"]);
        assert_eq!(err.code().code(), "SHARD_BULK_FIELD_MISMATCH");
        assert!(err.is_rejection());
        assert!(err.message().contains("row 1"));
        assert!(err.message().contains("[user_id, amount]"));
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(AccessorErrorCode::PrimaryKeyMismatch.severity(), Severity::Reject);
        assert_eq!(AccessorErrorCode::ExecutionFailure.severity(), Severity::Error);
        assert_eq!(
            AccessorErrorCode::ConfigurationLoadFailure.severity(),
            Severity::Fatal
        );
    }

    #[test]
    fn test_engine_error_is_kept_as_source() {
        use std::error::Error;

        let err: AccessorError = EngineError::DuplicateKey { key: "10".into() }.into();
        assert_eq!(err.code(), AccessorErrorCode::ExecutionFailure);
        assert!(err.source().is_some());
        assert!(matches!(
            err.engine_error(),
            Some(EngineError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_config_error_is_fatal() {
        let err: AccessorError = ConfigError::invalid_table("orders", "bad").into();
        assert!(err.is_fatal());
        assert!(err.message().contains("orders"));
    }

    #[test]
    fn test_display_includes_code() {
        let err = AccessorError::primary_key_mismatch(&["user_id".to_string()], &["name"]);
        let display = err.to_string();
        assert!(display.starts_with("[REJECT] SHARD_PRIMARY_KEY_MISMATCH"));
        assert!(display.contains("user_id"));
    }
}
