//! Entity registry
//!
//! Maps entity ids to their accessors. Bindings are built once at startup,
//! so a malformed table config fails the process before it serves a call.
//! After startup the registry is read-only and can be shared behind an
//! `Arc`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::accessor::{Accessor, AccessorError, AccessorResult};
use crate::config::{DbConfig, TableConfig};
use crate::engine::Connector;
use crate::observability::{log_event, Event};

/// Entity id to accessor bindings
#[derive(Debug)]
pub struct EntityRegistry {
    db: DbConfig,
    connector: Arc<dyn Connector>,
    accessors: BTreeMap<String, Arc<Accessor>>,
}

impl EntityRegistry {
    pub fn new(db: DbConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            db,
            connector,
            accessors: BTreeMap::new(),
        }
    }

    /// Builds and binds the accessor for a table config.
    ///
    /// Registering an entity id a second time returns the existing binding
    /// unchanged.
    pub fn register(&mut self, table: &TableConfig) -> AccessorResult<Arc<Accessor>> {
        let entity = table.entity_name();
        if let Some(existing) = self.accessors.get(entity) {
            return Ok(Arc::clone(existing));
        }

        let accessor = Arc::new(Accessor::new(table, &self.db, Arc::clone(&self.connector))?);
        let databases = accessor.shard_map().databases().join(",");
        log_event(
            Event::EntityRegistered,
            &[("databases", databases.as_str()), ("entity", entity)],
        );

        self.accessors
            .insert(entity.to_string(), Arc::clone(&accessor));
        Ok(accessor)
    }

    /// Registers every table config in a directory. Returns the entity ids
    /// in load order.
    pub fn load_dir(&mut self, dir: &Path) -> AccessorResult<Vec<String>> {
        let tables = TableConfig::load_dir(dir)?;
        let count = tables.len().to_string();
        log_event(
            Event::ConfigLoaded,
            &[("path", dir.display().to_string().as_str()), ("tables", count.as_str())],
        );

        let mut entities = Vec::with_capacity(tables.len());
        for table in &tables {
            let accessor = self.register(table)?;
            entities.push(accessor.entity().to_string());
        }
        Ok(entities)
    }

    /// Accessor bound to an entity id
    pub fn accessor(&self, entity: &str) -> AccessorResult<Arc<Accessor>> {
        self.accessors
            .get(entity)
            .cloned()
            .ok_or_else(|| AccessorError::unknown_entity(entity))
    }

    /// Registered entity ids, sorted
    pub fn entities(&self) -> Vec<&str> {
        self.accessors.keys().map(String::as_str).collect()
    }

    pub fn db_config(&self) -> &DbConfig {
        &self.db
    }
}
