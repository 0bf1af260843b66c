//! Connection registry
//!
//! One lazily opened connection per (database, role) pair. The first caller
//! for a slot connects; concurrent first callers block on the same
//! initialization instead of opening duplicates, and later callers read the
//! slot without taking a lock.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::role::ReplicaRole;
use crate::accessor::{AccessorError, AccessorResult};
use crate::config::{DbConfig, Endpoint};
use crate::engine::{ConnectTarget, Connection, Connector, EngineError};
use crate::observability::{log_event, AccessorMetrics, Event};
use crate::shard::ShardMap;

/// A connection shared by every caller using the same slot
pub type SharedConnection = Arc<Mutex<Box<dyn Connection>>>;

struct Slot {
    target: ConnectTarget,
    connection: OnceCell<SharedConnection>,
}

impl Slot {
    fn new(target: ConnectTarget) -> Self {
        Self {
            target,
            connection: OnceCell::new(),
        }
    }
}

struct DatabaseSlots {
    primary: Slot,
    replica: Slot,
}

impl DatabaseSlots {
    fn slot(&self, role: ReplicaRole) -> &Slot {
        match role {
            ReplicaRole::Primary => &self.primary,
            ReplicaRole::Replica => &self.replica,
        }
    }
}

/// Lazily connected slots for every database an entity's shard map names
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    databases: BTreeMap<String, DatabaseSlots>,
    metrics: Arc<AccessorMetrics>,
}

impl ConnectionRegistry {
    /// Prepares one primary and one replica slot per database. Nothing is
    /// opened until first use.
    pub fn new(
        map: &ShardMap,
        db: &DbConfig,
        connector: Arc<dyn Connector>,
        metrics: Arc<AccessorMetrics>,
    ) -> Self {
        let target = |db_name: &str, role: ReplicaRole, endpoint: &Endpoint| ConnectTarget {
            db_name: db_name.to_string(),
            role,
            host: endpoint.host.clone(),
            port: endpoint.port,
            username: db.username.clone(),
            password: db.password.clone(),
        };

        let mut databases = BTreeMap::new();
        for shard in map.shards() {
            databases
                .entry(shard.db_name.clone())
                .or_insert_with(|| DatabaseSlots {
                    primary: Slot::new(target(&shard.db_name, ReplicaRole::Primary, &shard.primary)),
                    replica: Slot::new(target(&shard.db_name, ReplicaRole::Replica, &shard.replica)),
                });
        }

        Self {
            connector,
            databases,
            metrics,
        }
    }

    /// Returns the connection for a database and role, opening it on first
    /// use.
    pub fn get(&self, db_name: &str, role: ReplicaRole) -> AccessorResult<SharedConnection> {
        let slots = self.databases.get(db_name).ok_or_else(|| {
            AccessorError::execution_failure(EngineError::UnknownDatabase(db_name.to_string()))
        })?;
        let slot = slots.slot(role);

        slot.connection
            .get_or_try_init(|| self.open(&slot.target))
            .map(Arc::clone)
    }

    fn open(&self, target: &ConnectTarget) -> AccessorResult<SharedConnection> {
        let role = target.role.as_str();
        let port = target.port.to_string();
        match self.connector.connect(target) {
            Ok(connection) => {
                self.metrics.record_connection_opened();
                log_event(
                    Event::ConnectionOpened,
                    &[
                        ("db", target.db_name.as_str()),
                        ("host", target.host.as_str()),
                        ("port", port.as_str()),
                        ("role", role),
                    ],
                );
                Ok(Arc::new(Mutex::new(connection)))
            }
            Err(err) => {
                let message = err.to_string();
                log_event(
                    Event::ConnectionFailed,
                    &[
                        ("db", target.db_name.as_str()),
                        ("error", message.as_str()),
                        ("host", target.host.as_str()),
                        ("role", role),
                    ],
                );
                Err(AccessorError::execution_failure(err))
            }
        }
    }

    /// Number of slots that hold an open connection
    pub fn opened(&self) -> usize {
        self.databases
            .values()
            .flat_map(|d| [&d.primary, &d.replica])
            .filter(|s| s.connection.get().is_some())
            .count()
    }

    /// Database names with slots, sorted
    pub fn databases(&self) -> Vec<&str> {
        self.databases.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connector", &self.connector)
            .field("databases", &self.databases())
            .field("opened", &self.opened())
            .finish()
    }
}
