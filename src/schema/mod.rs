//! Schema catalog subsystem for shardbase
//!
//! The catalog is the single source of truth the query builder consults:
//! which fields exist, which form the primary key, and how each one is
//! written (plain, timestamp or diff).
//!
//! # Rules
//!
//! - Built once per entity, immutable afterwards
//! - Malformed metadata is rejected at build time
//! - Unknown record keys are dropped, never rejected

mod catalog;
mod types;

pub use catalog::SchemaCatalog;
pub use types::{is_numeric_cast, is_timestamp_cast, FieldCategory, FieldDefinition};
