//! Replica roles
//!
//! Each logical database has two servers:
//! - Primary: accepts reads and writes
//! - Replica: serves reads; read-only by policy, not by engine enforcement

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which server of a database a statement goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaRole {
    /// Read/write server
    Primary,
    /// Read-only server
    Replica,
}

impl ReplicaRole {
    /// Maps the classic `use_master` flag onto a role
    pub fn from_use_master(use_master: bool) -> Self {
        if use_master {
            ReplicaRole::Primary
        } else {
            ReplicaRole::Replica
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, ReplicaRole::Primary)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicaRole::Primary => "primary",
            ReplicaRole::Replica => "replica",
        }
    }
}

impl Default for ReplicaRole {
    /// Reads go to the replica unless asked otherwise
    fn default() -> Self {
        ReplicaRole::Replica
    }
}

impl fmt::Display for ReplicaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
