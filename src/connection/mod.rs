//! Connections for shardbase
//!
//! Role selection and the per-entity registry of lazily opened
//! connections. Reads go to the replica unless the caller asks for the
//! primary; writes always go to the primary.

mod registry;
mod role;

pub use registry::{ConnectionRegistry, SharedConnection};
pub use role::ReplicaRole;
