//! Raw statement classification
//!
//! Two independent decisions about caller-supplied SQL:
//!
//! - [`is_write_statement`]: does the text contain a write keyword? Used to
//!   keep writes off replicas.
//! - [`returns_rows`]: does the statement produce a result set? Used to
//!   choose between fetching rows and reporting an affected count.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::accessor::{AccessorError, AccessorResult};
use crate::connection::ReplicaRole;

/// Keywords that mark a statement unsafe for a replica
pub const WRITE_KEYWORDS: &[&str] = &[
    "insert",
    "update",
    "delete",
    "truncate",
    "drop",
    "create",
    "transaction",
    "lock",
];

static WRITE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(r"(?i)\b({})\b", WRITE_KEYWORDS.join("|"));
    Regex::new(&pattern).expect("write keyword pattern is valid")
});

/// Named-lock functions such as `get_lock(...)` and `release_lock(...)`.
/// `_` is a word character, so the keyword pattern alone misses them.
static LOCK_FUNCTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\w*_locks?\s*\(").expect("lock function pattern is valid")
});

static ROWS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[\s(]*(select|show|describe|desc|explain|with)\b")
        .expect("row statement pattern is valid")
});

/// True if the SQL contains any write keyword as a whole word, or calls a
/// named-lock function
pub fn is_write_statement(sql: &str) -> bool {
    WRITE_PATTERN.is_match(sql) || LOCK_FUNCTION_PATTERN.is_match(sql)
}

/// True if the SQL starts with a row-returning keyword
pub fn returns_rows(sql: &str) -> bool {
    ROWS_PATTERN.is_match(sql)
}

/// Rejects write statements routed to a replica
pub fn check_route(sql: &str, role: ReplicaRole) -> AccessorResult<()> {
    if role == ReplicaRole::Replica && is_write_statement(sql) {
        return Err(AccessorError::replica_write_rejected(sql));
    }
    Ok(())
}
