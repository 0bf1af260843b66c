//! Configuration subsystem for shardbase
//!
//! Two kinds of configuration are consumed, both JSON:
//!
//! - credentials: one file per environment (`mysql.<env>.json`)
//! - table configs: one file per entity, holding the partition map and the
//!   column metadata
//!
//! Malformed configuration fails fast at load time and is never retried
//! per call.

mod db;
mod errors;
mod table;

pub use db::{DatabaseSettings, DbConfig, Endpoint, Environment};
pub use errors::{ConfigError, ConfigResult};
pub use table::{ColumnDef, Columns, IndexDef, PartitionRule, TableConfig};

use std::path::{Path, PathBuf};

/// Directory of table configs under a settings directory
pub fn table_config_dir(settings_dir: &Path) -> PathBuf {
    settings_dir.join("table")
}
