//! Accessor layer for shardbase
//!
//! The [`Accessor`] maps logical record operations onto the physical table
//! that holds each record. Inputs are validated and statements built before
//! any connection is acquired; execution errors are surfaced unchanged and
//! never retried.

mod errors;
mod facade;
mod validate;

pub use errors::{AccessorError, AccessorErrorCode, AccessorResult, Severity};
pub use facade::{Accessor, QueryOutcome};
pub use validate::validate_where;
