//! CLI-specific error types

use std::fmt;
use std::io;

use crate::accessor::{AccessorError, AccessorErrorCode};
use crate::config::ConfigError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration could not be loaded
    ConfigError,
    /// stdout could not be written
    IoError,
    /// A `--data` or `--filter` argument is malformed
    InvalidArgument,
    /// The accessor layer rejected the request
    Accessor(AccessorErrorCode),
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "SHARD_CLI_CONFIG_ERROR",
            Self::IoError => "SHARD_CLI_IO_ERROR",
            Self::InvalidArgument => "SHARD_CLI_INVALID_ARGUMENT",
            Self::Accessor(code) => code.code(),
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgument, msg)
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<AccessorError> for CliError {
    fn from(e: AccessorError) -> Self {
        Self::new(CliErrorCode::Accessor(e.code()), e.message())
    }
}

pub type CliResult<T> = Result<T, CliError>;
