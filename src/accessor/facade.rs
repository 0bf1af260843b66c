//! Accessor facade
//!
//! Every operation follows the same path:
//!
//! 1. validate the input maps
//! 2. resolve the shard from the hint, else from the payload
//! 3. build the statement (pure, may still reject the payload)
//! 4. acquire the connection for the role
//! 5. execute with binds in builder order and normalize the result
//!
//! Steps 1 to 3 never touch a connection, so every rejection happens
//! before any I/O.

use std::sync::Arc;

use serde::Serialize;

use super::errors::{AccessorError, AccessorResult};
use super::validate::validate_where;
use crate::config::{ConfigResult, DbConfig, TableConfig};
use crate::connection::{ConnectionRegistry, ReplicaRole};
use crate::engine::{Connection, Connector, EngineResult, Record};
use crate::observability::{log_event, AccessorMetrics, Event};
use crate::query::{check_route, returns_rows, Bind, Page, QueryBuilder, Statement};
use crate::schema::SchemaCatalog;
use crate::shard::{ShardDescriptor, ShardMap};

/// Result of a raw query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    /// Row-returning statement
    Rows(Vec<Record>),
    /// Affected-row count of any other statement
    Affected(u64),
}

impl QueryOutcome {
    pub fn rows(&self) -> Option<&[Record]> {
        match self {
            QueryOutcome::Rows(rows) => Some(rows),
            QueryOutcome::Affected(_) => None,
        }
    }

    pub fn affected(&self) -> Option<u64> {
        match self {
            QueryOutcome::Affected(n) => Some(*n),
            QueryOutcome::Rows(_) => None,
        }
    }
}

/// Record operations for one entity across all of its shards
#[derive(Debug)]
pub struct Accessor {
    catalog: SchemaCatalog,
    shards: ShardMap,
    connections: ConnectionRegistry,
    metrics: Arc<AccessorMetrics>,
}

impl Accessor {
    /// Builds the catalog, shard map and connection slots for an entity.
    ///
    /// Malformed metadata fails here, never per call.
    pub fn new(
        table: &TableConfig,
        db: &DbConfig,
        connector: Arc<dyn Connector>,
    ) -> ConfigResult<Self> {
        let catalog = SchemaCatalog::from_config(table)?;
        let shards = ShardMap::build(table, db)?;
        let metrics = Arc::new(AccessorMetrics::new());
        let connections = ConnectionRegistry::new(&shards, db, connector, Arc::clone(&metrics));

        let count = shards.division_count().to_string();
        let tables = shards.shards().len().to_string();
        log_event(
            Event::ShardMapBuilt,
            &[
                ("division_count", count.as_str()),
                ("entity", catalog.entity()),
                ("tables", tables.as_str()),
            ],
        );

        Ok(Self {
            catalog,
            shards,
            connections,
            metrics,
        })
    }

    pub fn entity(&self) -> &str {
        self.catalog.entity()
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn shard_map(&self) -> &ShardMap {
        &self.shards
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn metrics(&self) -> &AccessorMetrics {
        &self.metrics
    }

    /// Statement builder over this entity's catalog, for inspection
    pub fn builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.catalog)
    }

    /// Shard serving a record; the hint's division key wins
    pub fn resolve(&self, record: &Record, hint: Option<&Record>) -> AccessorResult<&ShardDescriptor> {
        self.shards.resolve_record(record, hint)
    }

    /// Fetches one row by its full primary key. An absent row is an empty
    /// record.
    pub fn get(&self, filter: &Record, hint: Option<&Record>, role: ReplicaRole) -> AccessorResult<Record> {
        validate_where(&self.catalog, filter)?;
        let shard = self.resolve(filter, hint)?;
        let statement = self.builder().get(&shard.table_name, filter);
        let rows = self.run(shard, role, &statement, |conn, stmt| conn.fetch(stmt))?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    /// Rows matching the known fields of `filter`, one page
    pub fn find(
        &self,
        filter: &Record,
        page: Page,
        hint: Option<&Record>,
        role: ReplicaRole,
    ) -> AccessorResult<Vec<Record>> {
        let shard = self.resolve(filter, hint)?;
        let statement = self.builder().find(&shard.table_name, filter, page);
        self.run(shard, role, &statement, |conn, stmt| conn.fetch(stmt))
    }

    /// One page of the whole table the hint resolves to
    pub fn find_all(&self, hint: &Record, page: Page, role: ReplicaRole) -> AccessorResult<Vec<Record>> {
        let shard = self.resolve(hint, None)?;
        let statement = self.builder().find_all(&shard.table_name, page);
        self.run(shard, role, &statement, |conn, stmt| conn.fetch(stmt))
    }

    pub fn insert(&self, data: &Record, hint: Option<&Record>) -> AccessorResult<u64> {
        let shard = self.resolve(data, hint)?;
        let statement = self.builder().insert(&shard.table_name, data)?;
        self.write(shard, &statement)
    }

    /// Updates the row addressed by `filter`; diff fields in `data` are
    /// deltas
    pub fn update(&self, filter: &Record, data: &Record, hint: Option<&Record>) -> AccessorResult<u64> {
        validate_where(&self.catalog, filter)?;
        let shard = self.resolve(filter, hint)?;
        let statement = self.builder().update(&shard.table_name, filter, data)?;
        self.write(shard, &statement)
    }

    /// Inserts, or on a duplicate key updates the non-key fields with diff
    /// fields accumulated
    pub fn save(&self, data: &Record, hint: Option<&Record>) -> AccessorResult<u64> {
        let shard = self.resolve(data, hint)?;
        let statement = self.builder().save(&shard.table_name, data)?;
        self.write(shard, &statement)
    }

    /// Inserts every row in one statement on the shard the hint resolves to
    pub fn bulk_insert(&self, rows: &[Record], hint: &Record) -> AccessorResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let shard = self.resolve(hint, None)?;
        let statement = self.builder().bulk_insert(&shard.table_name, rows)?;
        self.write(shard, &statement)
    }

    /// Multi-row upsert on the shard the hint resolves to
    pub fn bulk_save(&self, rows: &[Record], hint: &Record) -> AccessorResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let shard = self.resolve(hint, None)?;
        let statement = self.builder().bulk_save(&shard.table_name, rows)?;
        self.write(shard, &statement)
    }

    pub fn delete(&self, filter: &Record, hint: Option<&Record>) -> AccessorResult<u64> {
        validate_where(&self.catalog, filter)?;
        let shard = self.resolve(filter, hint)?;
        let statement = self.builder().delete(&shard.table_name, filter);
        self.write(shard, &statement)
    }

    /// Runs caller-supplied SQL on the shard the hint resolves to.
    ///
    /// Write statements are refused on a replica before a connection is
    /// acquired. Use [`Accessor::resolve`] to learn the table name.
    pub fn query(
        &self,
        sql: &str,
        binds: Vec<Bind>,
        hint: &Record,
        role: ReplicaRole,
    ) -> AccessorResult<QueryOutcome> {
        let shard = self.resolve(hint, None)?;
        if let Err(err) = check_route(sql, role) {
            self.metrics.record_write_rejected();
            log_event(
                Event::ReplicaWriteRejected,
                &[
                    ("db", shard.db_name.as_str()),
                    ("entity", self.entity()),
                    ("sql", sql),
                ],
            );
            return Err(err);
        }

        let statement = Statement::raw(sql, binds);
        if returns_rows(sql) {
            self.run(shard, role, &statement, |conn, stmt| conn.fetch(stmt))
                .map(QueryOutcome::Rows)
        } else {
            self.run(shard, role, &statement, |conn, stmt| conn.execute(stmt))
                .map(QueryOutcome::Affected)
        }
    }

    fn write(&self, shard: &ShardDescriptor, statement: &Statement) -> AccessorResult<u64> {
        self.run(shard, ReplicaRole::Primary, statement, |conn, stmt| conn.execute(stmt))
    }

    fn run<T>(
        &self,
        shard: &ShardDescriptor,
        role: ReplicaRole,
        statement: &Statement,
        exec: impl FnOnce(&mut dyn Connection, &Statement) -> EngineResult<T>,
    ) -> AccessorResult<T> {
        let connection = self.connections.get(&shard.db_name, role)?;
        let result = {
            let mut guard = connection.lock();
            exec(&mut **guard, statement)
        };

        match result {
            Ok(value) => {
                self.metrics.record_executed();
                Ok(value)
            }
            Err(err) => {
                self.metrics.record_failed();
                let message = err.to_string();
                log_event(
                    Event::ExecutionFailed,
                    &[
                        ("db", shard.db_name.as_str()),
                        ("entity", self.entity()),
                        ("error", message.as_str()),
                        ("operation", statement.kind.name()),
                        ("role", role.as_str()),
                        ("table", shard.table_name.as_str()),
                    ],
                );
                Err(AccessorError::execution_failure(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::AccessorErrorCode;
    use crate::engine::{MemoryEngine, Value};
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    fn setup() -> (Accessor, MemoryEngine) {
        let db = DbConfig::from_json_str(
            &json!({
                "username": "app",
                "password": "secret",
                "database_settings": {
                    "shard_a": {
                        "primary": {"host": "10.0.0.1", "port": 3306},
                        "replica": {"host": "10.0.0.2", "port": 3306}
                    }
                }
            })
            .to_string(),
            "test",
        )
        .unwrap();
        let table: TableConfig = serde_json::from_value(json!({
            "entity": "wallet",
            "division_key": "user_id",
            "table_name": "wallet",
            "postfix": "_%d",
            "division_count": 2,
            "map": [
                {"db": "shard_a", "table_number": 0, "key_range_min": 0, "key_range_max": 0},
                {"db": "shard_a", "table_number": 1, "key_range_min": 1, "key_range_max": 1}
            ],
            "columns": {
                "user_id": {"cast": "int"},
                "coins": {"cast": "int"},
                "label": {"cast": "varchar"}
            },
            "primary_key": ["user_id"],
            "diff_fields": ["coins"]
        }))
        .unwrap();

        let engine = MemoryEngine::new();
        let accessor = Accessor::new(&table, &db, Arc::new(engine.clone())).unwrap();
        engine.create_shards(accessor.shard_map(), accessor.catalog());
        (accessor, engine)
    }

    #[test]
    fn test_get_missing_row_is_empty() {
        let (accessor, _) = setup();
        let row = accessor
            .get(&record(json!({"user_id": 3})), None, ReplicaRole::Replica)
            .unwrap();
        assert!(row.is_empty());
    }

    #[test]
    fn test_update_adds_diff_delta() {
        let (accessor, engine) = setup();
        accessor
            .insert(&record(json!({"user_id": 3, "coins": 10, "label": "a"})), None)
            .unwrap();
        let affected = accessor
            .update(
                &record(json!({"user_id": 3})),
                &record(json!({"coins": 5, "label": "b"})),
                None,
            )
            .unwrap();
        assert_eq!(affected, 1);

        let rows = engine.rows("shard_a", "wallet_1");
        assert_eq!(rows[0]["coins"], Value::Int(15));
        assert_eq!(rows[0]["label"], Value::Text("b".into()));
    }

    #[test]
    fn test_hint_overrides_payload_division_key() {
        let (accessor, engine) = setup();
        accessor
            .insert(
                &record(json!({"user_id": 3, "coins": 1})),
                Some(&record(json!({"user_id": 4}))),
            )
            .unwrap();
        assert_eq!(engine.rows("shard_a", "wallet_0").len(), 1);
        assert!(engine.rows("shard_a", "wallet_1").is_empty());
    }

    #[test]
    fn test_empty_bulk_does_no_io() {
        let (accessor, engine) = setup();
        assert_eq!(accessor.bulk_insert(&[], &record(json!({}))).unwrap(), 0);
        assert_eq!(accessor.bulk_save(&[], &record(json!({}))).unwrap(), 0);
        assert_eq!(engine.connect_count(), 0);
    }

    #[test]
    fn test_duplicate_insert_is_execution_failure() {
        let (accessor, _) = setup();
        let data = record(json!({"user_id": 3, "coins": 1}));
        accessor.insert(&data, None).unwrap();
        let err = accessor.insert(&data, None).unwrap_err();
        assert_eq!(err.code(), AccessorErrorCode::ExecutionFailure);
        assert!(err.engine_error().is_some());
        assert_eq!(accessor.metrics().statements_failed(), 1);
        assert_eq!(accessor.metrics().statements_executed(), 1);
    }

    #[test]
    fn test_query_outcome_shapes() {
        let (accessor, _) = setup();
        accessor
            .insert(&record(json!({"user_id": 2, "coins": 1})), None)
            .unwrap();
        let hint = record(json!({"user_id": 2}));
        let table = accessor.resolve(&hint, None).unwrap().table_name.clone();

        let outcome = accessor
            .query(&format!("select * from {}", table), Vec::new(), &hint, ReplicaRole::Replica)
            .unwrap();
        assert_eq!(outcome.rows().map(<[Record]>::len), Some(1));
        assert_eq!(outcome.affected(), None);
    }
}
