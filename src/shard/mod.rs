//! Shard resolution for shardbase
//!
//! Maps a division key to the database and table holding the record.
//! Resolution is deterministic and total for the lifetime of the
//! configuration, and a missing division key is rejected before any I/O.

mod map;

pub use map::{format_table_name, ShardDescriptor, ShardMap, MAX_DIVISION_COUNT};
