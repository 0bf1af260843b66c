//! Engine seam for shardbase
//!
//! The accessor talks to the relational store through two traits:
//!
//! - [`Connector`] opens a synchronous client connection for a target
//! - [`Connection`] runs a prepared [`Statement`] and returns rows or an
//!   affected-row count
//!
//! A network driver implements both traits by preparing `Statement::sql`
//! and binding `Statement::binds` in order. [`MemoryEngine`] implements them
//! in-process by interpreting `Statement::kind`.

mod errors;
mod memory;
mod value;

pub use errors::{EngineError, EngineResult};
pub use memory::MemoryEngine;
pub use value::{Record, Value};

use std::fmt;

use crate::connection::ReplicaRole;
use crate::query::Statement;

/// A live client connection to one database on one replica role
pub trait Connection: Send {
    /// Executes a row-returning statement
    fn fetch(&mut self, statement: &Statement) -> EngineResult<Vec<Record>>;

    /// Executes a statement and returns the number of affected rows
    fn execute(&mut self, statement: &Statement) -> EngineResult<u64>;
}

/// Factory for connections
pub trait Connector: Send + Sync + fmt::Debug {
    /// Opens a new connection to the given target
    fn connect(&self, target: &ConnectTarget) -> EngineResult<Box<dyn Connection>>;
}

/// Everything needed to open a connection
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub db_name: String,
    pub role: ReplicaRole,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ConnectTarget {
    /// Data source name in the PDO-style form used by MySQL clients
    pub fn dsn(&self) -> String {
        format!(
            "mysql:dbname={};host={};port={}",
            self.db_name, self.host, self.port
        )
    }
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("db_name", &self.db_name)
            .field("role", &self.role)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
