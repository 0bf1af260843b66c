//! # Configuration Errors
//!
//! Every configuration error is fatal for the entity it concerns: the
//! accessor for that entity is never constructed.

use std::io;

use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON in '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("Unknown environment '{0}' (expected prod, stg or dev)")]
    UnknownEnvironment(String),

    #[error("Invalid credentials config: {0}")]
    InvalidCredentials(String),

    #[error("Invalid table config for '{entity}': {reason}")]
    InvalidTable { entity: String, reason: String },
}

impl ConfigError {
    pub fn read(path: impl Into<String>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_table(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTable {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}
