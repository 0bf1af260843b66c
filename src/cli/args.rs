//! CLI argument definitions using clap
//!
//! Commands:
//! - shardbase check   --settings <dir> [--env <env>]
//! - shardbase resolve --settings <dir> [--env <env>] --entity <id> --key <n>
//! - shardbase render  --settings <dir> [--env <env>] --entity <id> --op <op>
//!   [--data <json>] [--filter <json>] [--offset <n>] [--limit <n>]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Environment;

/// shardbase - sharded record accessor tooling
#[derive(Parser, Debug)]
#[command(name = "shardbase")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Where to find configuration
#[derive(Args, Debug, Clone)]
pub struct SettingsArgs {
    /// Settings directory holding mysql.<env>.json and table/*.json
    #[arg(long, default_value = "./settings")]
    pub settings: PathBuf,

    /// Deployment environment (prod, stg, dev)
    #[arg(long, default_value = "dev")]
    pub env: Environment,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load every config and report what would be served
    Check {
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Print the shard a division key resolves to
    Resolve {
        #[command(flatten)]
        settings: SettingsArgs,

        /// Entity id
        #[arg(long)]
        entity: String,

        /// Division key value
        #[arg(long, allow_hyphen_values = true)]
        key: i64,
    },

    /// Print the statement an operation would run, without connecting
    Render {
        #[command(flatten)]
        settings: SettingsArgs,

        /// Entity id
        #[arg(long)]
        entity: String,

        #[arg(long, value_enum)]
        op: Operation,

        /// Payload: a JSON object, or an array of objects for bulk operations
        #[arg(long)]
        data: Option<String>,

        /// Where-map or division hint as a JSON object
        #[arg(long)]
        filter: Option<String>,

        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Page size; defaults to 10 for find and 20 for find-all
        #[arg(long)]
        limit: Option<u64>,
    },
}

/// Operations `render` can build
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    Find,
    FindAll,
    Insert,
    Update,
    Save,
    BulkInsert,
    BulkSave,
    Delete,
}

impl Operation {
    /// True for operations that always run on the primary
    pub fn is_write(&self) -> bool {
        !matches!(self, Operation::Get | Operation::Find | Operation::FindAll)
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::try_parse_from([
            "shardbase",
            "render",
            "--settings",
            "/etc/app/settings",
            "--env",
            "prod",
            "--entity",
            "orders",
            "--op",
            "bulk-save",
            "--data",
            "[]",
        ])
        .unwrap();

        match cli.command {
            Command::Render {
                settings,
                op,
                limit,
                ..
            } => {
                assert_eq!(settings.env, Environment::Prod);
                assert_eq!(op, Operation::BulkSave);
                assert!(op.is_write());
                assert_eq!(limit, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_negative_key_and_default_env() {
        let cli = Cli::try_parse_from(["shardbase", "resolve", "--entity", "orders", "--key", "-3"])
            .unwrap();
        match cli.command {
            Command::Resolve { settings, key, .. } => {
                assert_eq!(key, -3);
                assert_eq!(settings.env, Environment::Dev);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_env_rejected() {
        assert!(Cli::try_parse_from(["shardbase", "check", "--env", "qa"]).is_err());
    }
}
