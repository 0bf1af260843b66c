//! CLI command implementations
//!
//! Commands never open a database connection: the registry is built on an
//! offline connector, and `render` prints the statement an accessor call
//! would run instead of running it.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value as JsonValue};

use super::args::{Cli, Command, Operation, SettingsArgs};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};
use crate::accessor::{validate_where, Accessor};
use crate::config::{table_config_dir, DbConfig};
use crate::connection::ReplicaRole;
use crate::engine::{ConnectTarget, Connection, Connector, EngineError, EngineResult, Record};
use crate::query::{Page, Statement};
use crate::registry::EntityRegistry;

/// Default page size of `find`
const FIND_LIMIT: u64 = 10;

/// Default page size of `find-all`
const FIND_ALL_LIMIT: u64 = 20;

/// Connector that refuses every connection
#[derive(Debug, Default)]
pub struct OfflineConnector;

impl Connector for OfflineConnector {
    fn connect(&self, target: &ConnectTarget) -> EngineResult<Box<dyn Connection>> {
        Err(EngineError::ConnectionFailed(format!(
            "{} (offline)",
            target.dsn()
        )))
    }
}

/// Main entry point for CLI
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_args();

    match run_command(cli.command) {
        Ok(data) => {
            write_response(data)?;
            Ok(())
        }
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(Box::new(e))
        }
    }
}

/// Executes a parsed command and returns the response payload
pub fn run_command(command: Command) -> CliResult<JsonValue> {
    match command {
        Command::Check { settings } => check(&settings),
        Command::Resolve {
            settings,
            entity,
            key,
        } => resolve(&settings, &entity, key),
        Command::Render {
            settings,
            entity,
            op,
            data,
            filter,
            offset,
            limit,
        } => {
            let registry = load_registry(&settings)?;
            let accessor = registry.accessor(&entity)?;
            let request = RenderRequest {
                op,
                data: data.as_deref(),
                filter: filter.as_deref(),
                offset,
                limit,
            };
            render(&accessor, &request)
        }
    }
}

/// Loads credentials and every table config under the settings directory
pub fn load_registry(settings: &SettingsArgs) -> CliResult<EntityRegistry> {
    let db = DbConfig::load_for(&settings.settings, settings.env)?;
    let mut registry = EntityRegistry::new(db, Arc::new(OfflineConnector));
    registry.load_dir(&table_config_dir(&settings.settings))?;
    Ok(registry)
}

fn check(settings: &SettingsArgs) -> CliResult<JsonValue> {
    let registry = load_registry(settings)?;

    let mut entities = Vec::new();
    for entity in registry.entities() {
        let accessor = registry.accessor(entity)?;
        let map = accessor.shard_map();
        entities.push(json!({
            "entity": entity,
            "division_key": map.division_key(),
            "division_count": map.division_count(),
            "shards": map.shards(),
        }));
    }

    Ok(json!({
        "env": settings.env.as_str(),
        "settings": display_path(&settings.settings),
        "entities": entities,
    }))
}

fn resolve(settings: &SettingsArgs, entity: &str, key: i64) -> CliResult<JsonValue> {
    let registry = load_registry(settings)?;
    let accessor = registry.accessor(entity)?;
    let map = accessor.shard_map();

    Ok(json!({
        "entity": entity,
        "key": key,
        "slot": map.slot(key),
        "shard": map.resolve(key),
    }))
}

/// Arguments of `render`
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub op: Operation,
    pub data: Option<&'a str>,
    pub filter: Option<&'a str>,
    pub offset: u64,
    pub limit: Option<u64>,
}

/// Builds the statement for an operation on the shard it would run on
pub fn render(accessor: &Accessor, request: &RenderRequest<'_>) -> CliResult<JsonValue> {
    let builder = accessor.builder();
    let op = request.op;

    let (shard, statement) = match op {
        Operation::Get | Operation::Delete => {
            let filter = parse_record("--filter", request.filter)?;
            validate_where(accessor.catalog(), &filter)?;
            let shard = accessor.resolve(&filter, None)?;
            let statement = if op == Operation::Get {
                builder.get(&shard.table_name, &filter)
            } else {
                builder.delete(&shard.table_name, &filter)
            };
            (shard, statement)
        }
        Operation::Find => {
            let filter = parse_record("--filter", request.filter)?;
            let shard = accessor.resolve(&filter, None)?;
            let page = Page::new(request.offset, request.limit.unwrap_or(FIND_LIMIT));
            (shard, builder.find(&shard.table_name, &filter, page))
        }
        Operation::FindAll => {
            let hint = parse_record("--filter", request.filter)?;
            let shard = accessor.resolve(&hint, None)?;
            let page = Page::new(request.offset, request.limit.unwrap_or(FIND_ALL_LIMIT));
            (shard, builder.find_all(&shard.table_name, page))
        }
        Operation::Insert | Operation::Save => {
            let data = parse_record("--data", request.data)?;
            let hint = parse_optional_record("--filter", request.filter)?;
            let shard = accessor.resolve(&data, hint.as_ref())?;
            let statement = if op == Operation::Insert {
                builder.insert(&shard.table_name, &data)?
            } else {
                builder.save(&shard.table_name, &data)?
            };
            (shard, statement)
        }
        Operation::Update => {
            let filter = parse_record("--filter", request.filter)?;
            let data = parse_record("--data", request.data)?;
            validate_where(accessor.catalog(), &filter)?;
            let shard = accessor.resolve(&filter, None)?;
            (shard, builder.update(&shard.table_name, &filter, &data)?)
        }
        Operation::BulkInsert | Operation::BulkSave => {
            let rows = parse_rows(request.data)?;
            let hint = match parse_optional_record("--filter", request.filter)? {
                Some(hint) => hint,
                None => rows.first().cloned().unwrap_or_default(),
            };
            let shard = accessor.resolve(&hint, None)?;
            let statement = if op == Operation::BulkInsert {
                builder.bulk_insert(&shard.table_name, &rows)?
            } else {
                builder.bulk_save(&shard.table_name, &rows)?
            };
            (shard, statement)
        }
    };

    let role = if op.is_write() {
        ReplicaRole::Primary
    } else {
        ReplicaRole::Replica
    };

    Ok(json!({
        "op": statement.kind.name(),
        "db": shard.db_name,
        "table": shard.table_name,
        "role": role.as_str(),
        "sql": statement.sql,
        "binds": binds_json(&statement),
    }))
}

fn binds_json(statement: &Statement) -> JsonValue {
    statement
        .binds
        .iter()
        .map(|b| json!({"name": b.name, "value": b.value}))
        .collect()
}

fn parse_record(flag: &str, text: Option<&str>) -> CliResult<Record> {
    parse_optional_record(flag, text)?
        .ok_or_else(|| CliError::invalid_argument(format!("{} is required for this operation", flag)))
}

fn parse_optional_record(flag: &str, text: Option<&str>) -> CliResult<Option<Record>> {
    text.map(|t| {
        serde_json::from_str(t).map_err(|e| {
            CliError::invalid_argument(format!("{} must be a JSON object of scalars: {}", flag, e))
        })
    })
    .transpose()
}

fn parse_rows(text: Option<&str>) -> CliResult<Vec<Record>> {
    let text = text.ok_or_else(|| CliError::invalid_argument("--data is required for this operation"))?;
    serde_json::from_str(text).map_err(|e| {
        CliError::invalid_argument(format!("--data must be a JSON array of objects: {}", e))
    })
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use std::fs;
    use tempfile::TempDir;

    fn settings_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let credentials = json!({
            "username": "app",
            "password": "secret",
            "database_settings": {
                "shard_a": {
                    "primary": {"host": "10.0.0.1", "port": 3306},
                    "replica": {"host": "10.0.0.2", "port": 3306}
                },
                "shard_b": {
                    "primary": {"host": "10.0.1.1", "port": 3306},
                    "replica": {"host": "10.0.1.2", "port": 3306}
                }
            }
        });
        fs::write(dir.path().join("mysql.dev.json"), credentials.to_string()).unwrap();

        let table = json!({
            "division_key": "user_id",
            "division_count": 4,
            "table_name": "orders",
            "postfix": "_%d",
            "map": [
                {"db": "shard_a", "table_number": 0, "key_range_min": 0, "key_range_max": 1},
                {"db": "shard_b", "table_number": 2, "key_range_min": 2, "key_range_max": 3}
            ],
            "columns": {
                "user_id": {"cast": "int"},
                "order_id": {"cast": "int"},
                "amount": {"cast": "int"},
                "created_at": {"cast": "timestamp"}
            },
            "primary_key": ["user_id", "order_id"],
            "diff_fields": ["amount"]
        });
        fs::create_dir(dir.path().join("table")).unwrap();
        fs::write(dir.path().join("table/orders.json"), table.to_string()).unwrap();
        dir
    }

    fn settings(dir: &TempDir) -> SettingsArgs {
        SettingsArgs {
            settings: dir.path().to_path_buf(),
            env: Environment::Dev,
        }
    }

    fn request(op: Operation) -> RenderRequest<'static> {
        RenderRequest {
            op,
            data: None,
            filter: None,
            offset: 0,
            limit: None,
        }
    }

    #[test]
    fn test_check_lists_entities() {
        let dir = settings_dir();
        let out = check(&settings(&dir)).unwrap();
        assert_eq!(out["env"], "dev");
        assert_eq!(out["entities"][0]["entity"], "orders");
        assert_eq!(out["entities"][0]["division_count"], 4);
        assert_eq!(out["entities"][0]["shards"][1]["table_name"], "orders_2");
    }

    #[test]
    fn test_resolve_uses_slot() {
        let dir = settings_dir();
        let out = resolve(&settings(&dir), "orders", 10).unwrap();
        assert_eq!(out["slot"], 2);
        assert_eq!(out["shard"]["db_name"], "shard_b");
        assert_eq!(out["shard"]["table_name"], "orders_2");
    }

    #[test]
    fn test_unknown_entity_keeps_accessor_code() {
        let dir = settings_dir();
        let err = resolve(&settings(&dir), "ghost", 1).unwrap_err();
        assert_eq!(err.code_str(), "SHARD_UNKNOWN_ENTITY");
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = check(&settings(&dir)).unwrap_err();
        assert_eq!(err.code_str(), "SHARD_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_render_get_on_replica() {
        let dir = settings_dir();
        let registry = load_registry(&settings(&dir)).unwrap();
        let accessor = registry.accessor("orders").unwrap();

        let mut req = request(Operation::Get);
        req.filter = Some(r#"{"user_id": 5, "order_id": 1}"#);
        let out = render(&accessor, &req).unwrap();

        assert_eq!(out["role"], "replica");
        assert_eq!(out["table"], "orders_0");
        assert_eq!(
            out["sql"],
            "select * from `orders_0` where `user_id`=:where_user_id and `order_id`=:where_order_id"
        );
        assert_eq!(out["binds"][0]["name"], "where_user_id");
        assert_eq!(out["binds"][0]["value"], 5);
    }

    #[test]
    fn test_render_save_accumulates_diff_field() {
        let dir = settings_dir();
        let registry = load_registry(&settings(&dir)).unwrap();
        let accessor = registry.accessor("orders").unwrap();

        let mut req = request(Operation::Save);
        req.data = Some(r#"{"user_id": 10, "order_id": 7, "amount": 500}"#);
        let out = render(&accessor, &req).unwrap();

        assert_eq!(out["op"], "upsert");
        assert_eq!(out["role"], "primary");
        assert_eq!(out["db"], "shard_b");
        let sql = out["sql"].as_str().unwrap();
        assert!(sql.ends_with("on duplicate key update `amount`=`amount`+:set_amount"));
    }

    #[test]
    fn test_render_bulk_hint_defaults_to_first_row() {
        let dir = settings_dir();
        let registry = load_registry(&settings(&dir)).unwrap();
        let accessor = registry.accessor("orders").unwrap();

        let mut req = request(Operation::BulkInsert);
        req.data = Some(r#"[{"user_id": 3, "order_id": 1}, {"user_id": 3, "order_id": 2}]"#);
        let out = render(&accessor, &req).unwrap();
        assert_eq!(out["table"], "orders_2");
        assert_eq!(out["op"], "bulk_insert");
    }

    #[test]
    fn test_render_rejects_partial_key() {
        let dir = settings_dir();
        let registry = load_registry(&settings(&dir)).unwrap();
        let accessor = registry.accessor("orders").unwrap();

        let mut req = request(Operation::Delete);
        req.filter = Some(r#"{"user_id": 5}"#);
        let err = render(&accessor, &req).unwrap_err();
        assert_eq!(err.code_str(), "SHARD_PRIMARY_KEY_MISMATCH");

        let err = render(&accessor, &request(Operation::Find)).unwrap_err();
        assert_eq!(err.code_str(), "SHARD_CLI_INVALID_ARGUMENT");
    }

    #[test]
    fn test_offline_connector_refuses() {
        let target = ConnectTarget {
            db_name: "shard_a".into(),
            role: ReplicaRole::Primary,
            host: "10.0.0.1".into(),
            port: 3306,
            username: "app".into(),
            password: "secret".into(),
        };
        let err = OfflineConnector.connect(&target).err().unwrap();
        assert!(err.to_string().contains("offline"));
    }
}
