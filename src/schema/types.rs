//! Field definitions
//!
//! Every column an accessor may write belongs to exactly one category:
//! - plain: written as given
//! - timestamp: bound as unix seconds and converted with `from_unixtime`
//! - diff: holds a running total; writes carry deltas
//!
//! Primary-key membership is orthogonal to the category.

use serde::Serialize;

/// Column casts that store timestamps
const TIMESTAMP_CASTS: &[&str] = &["timestamp", "datetime"];

/// Column casts that can hold a running total
const NUMERIC_CASTS: &[&str] = &[
    "tinyint",
    "smallint",
    "mediumint",
    "int",
    "integer",
    "bigint",
    "float",
    "double",
    "decimal",
];

/// How a field is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldCategory {
    Plain,
    Timestamp,
    Diff,
}

impl FieldCategory {
    /// Returns the category name for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldCategory::Plain => "plain",
            FieldCategory::Timestamp => "timestamp",
            FieldCategory::Diff => "diff",
        }
    }
}

/// Returns true if the column cast is converted with `from_unixtime`
pub fn is_timestamp_cast(cast: &str) -> bool {
    TIMESTAMP_CASTS.contains(&cast.to_ascii_lowercase().as_str())
}

/// Returns true if the column cast is numeric
pub fn is_numeric_cast(cast: &str) -> bool {
    NUMERIC_CASTS.contains(&cast.to_ascii_lowercase().as_str())
}

/// A single catalogued field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDefinition {
    pub name: String,
    pub category: FieldCategory,
    pub primary_key: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, category: FieldCategory, primary_key: bool) -> Self {
        Self {
            name: name.into(),
            category,
            primary_key,
        }
    }

    pub fn is_timestamp(&self) -> bool {
        self.category == FieldCategory::Timestamp
    }

    pub fn is_diff(&self) -> bool {
        self.category == FieldCategory::Diff
    }
}
