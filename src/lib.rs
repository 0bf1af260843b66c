//! shardbase - sharded record access over MySQL-style relational stores
//!
//! Each entity type is spread over many physical tables on several
//! databases. An [`accessor::Accessor`] resolves the shard from the
//! division key, builds a parameterized statement from the entity's
//! [`schema::SchemaCatalog`], and runs it on a lazily opened primary or
//! replica connection.
//!
//! Entry points:
//! - [`registry::EntityRegistry`] binds entity ids to accessors at startup
//! - [`model::RecordModel`] reads, changes and writes back a single record
//! - [`engine::MemoryEngine`] is an in-process store behind the same
//!   connection traits a network driver implements

pub mod accessor;
pub mod cli;
pub mod config;
pub mod connection;
pub mod engine;
pub mod model;
pub mod observability;
pub mod query;
pub mod registry;
pub mod schema;
pub mod shard;
