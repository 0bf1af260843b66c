//! Where-map validation
//!
//! Point operations (get, update, delete) must address exactly one row:
//! the where-map keys must be the primary key, and the map must carry the
//! division key so the shard can be found without a hint. Both checks run
//! before any connection is touched.

use super::errors::{AccessorError, AccessorResult};
use crate::engine::Record;
use crate::schema::SchemaCatalog;

/// Checks a where-map against the catalog's primary and division keys
pub fn validate_where(catalog: &SchemaCatalog, filter: &Record) -> AccessorResult<()> {
    let primary_key = catalog.primary_key();
    let keys_match = filter.len() == primary_key.len()
        && primary_key.iter().all(|k| filter.contains_key(k));
    if !keys_match {
        let actual: Vec<&str> = filter.keys().map(String::as_str).collect();
        return Err(AccessorError::primary_key_mismatch(primary_key, &actual));
    }

    if !filter.contains_key(catalog.division_key()) {
        return Err(AccessorError::division_key_missing(catalog.division_key()));
    }
    Ok(())
}
