//! CLI module for shardbase
//!
//! Offline operator tooling over the accessor layer:
//! - check: load every config and list the shards per entity
//! - resolve: show which shard a division key lands on
//! - render: show the SQL and binds an accessor call would run

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, Operation, SettingsArgs};
pub use commands::{load_registry, render, run, run_command, OfflineConnector, RenderRequest};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
