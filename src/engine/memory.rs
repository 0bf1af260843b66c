//! In-process engine
//!
//! Interprets the statement structure produced by the query builder with
//! MySQL semantics:
//!
//! - a second row with an existing primary key is a duplicate-key error
//!   unless the statement carries an `on duplicate key update` clause
//! - `values(col)` refers to the value the failed insert tried to write
//! - arithmetic with NULL yields NULL
//! - `from_unixtime` formats as `YYYY-MM-DD HH:MM:SS` (UTC)
//! - an upsert reports 1 affected row for an insert, 2 for a changed row
//!   and 0 for an unchanged one
//!
//! Primary and replica connections see the same data. Multi-row statements
//! are all-or-nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::DateTime;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;

use super::errors::{EngineError, EngineResult};
use super::value::{Record, Value};
use super::{ConnectTarget, Connection, Connector};
use crate::connection::ReplicaRole;
use crate::query::{Assignment, Condition, Expr, Page, Statement, StatementKind};
use crate::schema::SchemaCatalog;
use crate::shard::ShardMap;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static RAW_SELECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*select\s+\*\s+from\s+`?([A-Za-z0-9_$]+)`?\s*;?\s*$")
        .expect("raw select pattern is valid")
});

#[derive(Debug, Clone)]
struct MemoryTable {
    primary_key: Vec<String>,
    /// Declared columns; rows are padded with NULL for these
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl MemoryTable {
    fn key_of(&self, row: &Record) -> String {
        self.primary_key
            .iter()
            .map(|k| row.get(k).map(Value::to_string).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("-")
    }

    fn position_of(&self, key: &str) -> Option<usize> {
        self.rows.iter().position(|r| self.key_of(r) == key)
    }

    fn pad(&self, row: &mut Record) {
        for column in &self.columns {
            row.entry(column.clone()).or_insert(Value::Null);
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    /// db name -> table name -> table
    databases: Mutex<HashMap<String, BTreeMap<String, MemoryTable>>>,
    connects: AtomicU64,
    opened: Mutex<Vec<(String, ReplicaRole)>>,
    refuse_connections: AtomicBool,
}

/// A shared in-memory store implementing [`Connector`]
///
/// Clones share the same data, so a test can keep a handle for inspection
/// after handing one to an accessor.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    shared: Arc<Shared>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a database with no tables
    pub fn create_database(&self, db: &str) {
        self.shared
            .databases
            .lock()
            .entry(db.to_string())
            .or_default();
    }

    /// Creates an empty table, replacing any existing one
    pub fn create_table(&self, db: &str, table: &str, primary_key: &[&str], columns: &[&str]) {
        let table_def = MemoryTable {
            primary_key: primary_key.iter().map(|s| s.to_string()).collect(),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        };
        self.shared
            .databases
            .lock()
            .entry(db.to_string())
            .or_default()
            .insert(table.to_string(), table_def);
    }

    /// Creates every physical table of an entity
    pub fn create_shards(&self, map: &ShardMap, catalog: &SchemaCatalog) {
        let primary_key: Vec<&str> = catalog.primary_key().iter().map(String::as_str).collect();
        let columns: Vec<&str> = catalog.fields().iter().map(|f| f.name.as_str()).collect();
        for shard in map.shards() {
            self.create_table(&shard.db_name, &shard.table_name, &primary_key, &columns);
        }
    }

    /// Snapshot of a table's rows in insertion order
    pub fn rows(&self, db: &str, table: &str) -> Vec<Record> {
        self.shared
            .databases
            .lock()
            .get(db)
            .and_then(|tables| tables.get(table))
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Number of successful connects so far
    pub fn connect_count(&self) -> u64 {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Database and role of every successful connect, in order
    pub fn opened(&self) -> Vec<(String, ReplicaRole)> {
        self.shared.opened.lock().clone()
    }

    /// Makes subsequent connects fail
    pub fn refuse_connections(&self, refuse: bool) {
        self.shared.refuse_connections.store(refuse, Ordering::SeqCst);
    }
}

impl Connector for MemoryEngine {
    fn connect(&self, target: &ConnectTarget) -> EngineResult<Box<dyn Connection>> {
        if self.shared.refuse_connections.load(Ordering::SeqCst) {
            return Err(EngineError::ConnectionFailed(target.dsn()));
        }
        if !self.shared.databases.lock().contains_key(&target.db_name) {
            return Err(EngineError::UnknownDatabase(target.db_name.clone()));
        }

        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        self.shared
            .opened
            .lock()
            .push((target.db_name.clone(), target.role));

        Ok(Box::new(MemoryConnection {
            db: target.db_name.clone(),
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MemoryConnection {
    db: String,
    shared: Arc<Shared>,
}

impl MemoryConnection {
    fn with_table<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut MemoryTable) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut databases = self.shared.databases.lock();
        let tables = databases
            .get_mut(&self.db)
            .ok_or_else(|| EngineError::UnknownDatabase(self.db.clone()))?;
        let table_def = tables.get_mut(table).ok_or_else(|| EngineError::UnknownTable {
            db: self.db.clone(),
            table: table.to_string(),
        })?;
        f(table_def)
    }
}

impl Connection for MemoryConnection {
    fn fetch(&mut self, statement: &Statement) -> EngineResult<Vec<Record>> {
        match &statement.kind {
            StatementKind::Select {
                table,
                conditions,
                paged,
            } => {
                let binds = Binds(statement);
                let page = if *paged {
                    Some(binds.page()?)
                } else {
                    None
                };
                self.with_table(table, |t| {
                    let mut rows = Vec::new();
                    for row in &t.rows {
                        if matches(row, conditions, &binds)? {
                            rows.push(row.clone());
                        }
                    }
                    Ok(match page {
                        Some(page) => rows
                            .into_iter()
                            .skip(page.offset as usize)
                            .take(page.limit as usize)
                            .collect(),
                        None => rows,
                    })
                })
            }
            StatementKind::Raw => {
                let table = RAW_SELECT
                    .captures(&statement.sql)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
                    .ok_or_else(|| EngineError::Unsupported(statement.sql.clone()))?;
                self.with_table(&table, |t| Ok(t.rows.clone()))
            }
            _ => Err(EngineError::Unsupported(statement.sql.clone())),
        }
    }

    fn execute(&mut self, statement: &Statement) -> EngineResult<u64> {
        let binds = Binds(statement);
        match &statement.kind {
            StatementKind::Insert {
                table,
                assignments,
                on_duplicate,
            } => self.with_table(table, |t| {
                let mut row = Record::new();
                for a in assignments {
                    row.insert(a.column.clone(), binds.eval_insert(a)?);
                }
                upsert(t, row, on_duplicate, &binds)
            }),
            StatementKind::BulkInsert {
                table,
                columns,
                rows,
                on_duplicate,
            } => self.with_table(table, |t| {
                let mut staged = t.clone();
                let mut affected = 0;
                for cells in rows {
                    let mut row = Record::new();
                    for (column, cell) in columns.iter().zip(cells) {
                        let a = Assignment::new(column.as_str(), cell.clone());
                        row.insert(column.clone(), binds.eval_insert(&a)?);
                    }
                    affected += upsert(&mut staged, row, on_duplicate, &binds)?;
                }
                *t = staged;
                Ok(affected)
            }),
            StatementKind::Update {
                table,
                assignments,
                conditions,
            } => self.with_table(table, |t| {
                let mut staged = t.rows.clone();
                let mut affected = 0;
                for row in staged.iter_mut() {
                    if !matches(row, conditions, &binds)? {
                        continue;
                    }
                    let before = row.clone();
                    for a in assignments {
                        let value = binds.eval_update(a, row, None)?;
                        row.insert(a.column.clone(), value);
                    }
                    if *row != before {
                        affected += 1;
                    }
                }
                t.rows = staged;
                Ok(affected)
            }),
            StatementKind::Delete { table, conditions } => self.with_table(table, |t| {
                let mut kept = Vec::with_capacity(t.rows.len());
                let mut affected = 0;
                for row in &t.rows {
                    if matches(row, conditions, &binds)? {
                        affected += 1;
                    } else {
                        kept.push(row.clone());
                    }
                }
                t.rows = kept;
                Ok(affected)
            }),
            StatementKind::Select { .. } | StatementKind::Raw => {
                Err(EngineError::Unsupported(statement.sql.clone()))
            }
        }
    }
}

/// Inserts a row or applies the on-duplicate assignments to the existing
/// one. Returns the MySQL affected-row count.
fn upsert(
    table: &mut MemoryTable,
    mut row: Record,
    on_duplicate: &[Assignment],
    binds: &Binds<'_>,
) -> EngineResult<u64> {
    table.pad(&mut row);
    let key = table.key_of(&row);

    let Some(pos) = table.position_of(&key) else {
        table.rows.push(row);
        return Ok(1);
    };
    if on_duplicate.is_empty() {
        return Err(EngineError::DuplicateKey { key });
    }

    let existing = &mut table.rows[pos];
    let before = existing.clone();
    for a in on_duplicate {
        let value = binds.eval_update(a, existing, Some(&row))?;
        existing.insert(a.column.clone(), value);
    }
    Ok(if *existing == before { 0 } else { 2 })
}

fn matches(row: &Record, conditions: &[Condition], binds: &Binds<'_>) -> EngineResult<bool> {
    for c in conditions {
        let expected = binds.eval_condition(c)?;
        let actual = row.get(&c.column).unwrap_or(&Value::Null);
        if !sql_equal(actual, &expected) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// SQL `=`: NULL never matches, numbers compare numerically
fn sql_equal(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return false;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_numeric() && b.is_numeric() => x == y,
        _ => a.to_string() == b.to_string(),
    }
}

/// SQL `+`: NULL propagates
fn sql_add(column: &str, a: &Value, b: &Value) -> EngineResult<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    a.checked_add(b).ok_or_else(|| EngineError::InvalidValue {
        column: column.to_string(),
        reason: format!("cannot add {} and {}", a, b),
    })
}

fn from_unixtime(column: &str, value: &Value) -> EngineResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let invalid = || EngineError::InvalidValue {
        column: column.to_string(),
        reason: format!("'{}' is not a unix timestamp", value),
    };
    let secs = value.as_i64().ok_or_else(invalid)?;
    let at = DateTime::from_timestamp(secs, 0).ok_or_else(invalid)?;
    Ok(Value::Text(at.format(TIMESTAMP_FORMAT).to_string()))
}

struct Binds<'a>(&'a Statement);

impl Binds<'_> {
    fn get(&self, name: &str) -> EngineResult<&Value> {
        self.0
            .bind(name)
            .ok_or_else(|| EngineError::MissingBind(name.to_string()))
    }

    fn page(&self) -> EngineResult<Page> {
        let read = |name: &str| -> EngineResult<u64> {
            let value = self.get(name)?;
            value
                .as_i64()
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(|| EngineError::InvalidValue {
                    column: name.to_string(),
                    reason: format!("'{}' is not a row count", value),
                })
        };
        Ok(Page::new(
            read(Page::OFFSET_PARAM)?,
            read(Page::LIMIT_PARAM)?,
        ))
    }

    fn eval_condition(&self, c: &Condition) -> EngineResult<Value> {
        match &c.expr {
            Expr::Param(p) => Ok(self.get(p)?.clone()),
            Expr::FromUnixtime(p) => from_unixtime(&c.column, self.get(p)?),
            _ => Err(EngineError::Unsupported(format!(
                "condition on '{}'",
                c.column
            ))),
        }
    }

    fn eval_insert(&self, a: &Assignment) -> EngineResult<Value> {
        match &a.expr {
            Expr::Param(p) => Ok(self.get(p)?.clone()),
            Expr::FromUnixtime(p) => from_unixtime(&a.column, self.get(p)?),
            _ => Err(EngineError::Unsupported(format!(
                "column reference in insert of '{}'",
                a.column
            ))),
        }
    }

    /// Evaluates an update assignment against the current row. `incoming`
    /// is the row a failed insert tried to write, for `values(col)`.
    fn eval_update(
        &self,
        a: &Assignment,
        current: &Record,
        incoming: Option<&Record>,
    ) -> EngineResult<Value> {
        let column = a.column.as_str();
        let stored = current.get(column).cloned().unwrap_or(Value::Null);
        let values = || -> EngineResult<Value> {
            incoming
                .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
                .ok_or_else(|| EngineError::Unsupported(format!("values(`{}`) outside upsert", column)))
        };
        match &a.expr {
            Expr::Param(p) => Ok(self.get(p)?.clone()),
            Expr::FromUnixtime(p) => from_unixtime(column, self.get(p)?),
            Expr::Accumulate(p) => sql_add(column, &stored, self.get(p)?),
            Expr::Values => values(),
            Expr::AccumulateValues => sql_add(column, &stored, &values()?),
            Expr::Keep => Ok(stored),
        }
    }
}
