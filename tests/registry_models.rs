//! Registry and Record Model Tests
//!
//! Configs are loaded from a settings directory the way a service boots,
//! then records are changed through models bound to the registry.

use std::fs;
use std::sync::Arc;

use serde_json::json;
use shardbase::config::{table_config_dir, DbConfig, Environment};
use shardbase::engine::{MemoryEngine, Record, Value};
use shardbase::model::RecordModel;
use shardbase::registry::EntityRegistry;
use tempfile::TempDir;

fn record(value: serde_json::Value) -> Record {
    serde_json::from_value(value).unwrap()
}

fn write_settings(dir: &TempDir) {
    let credentials = json!({
        "username": "app",
        "password": "secret",
        "database_settings": {
            "shard_a": {
                "master": {"host": "10.0.0.1", "port": 3306},
                "slave": {"host": "10.0.0.2", "port": 3306}
            }
        }
    });
    fs::write(dir.path().join("mysql.stg.json"), credentials.to_string()).unwrap();

    let wallet = json!({
        "division_key": "user_id",
        "table_name": "wallet",
        "postfix": "_%d",
        "map": [
            {"db": "shard_a", "table_number": 0, "key_range_min": 0, "key_range_max": 1}
        ],
        "columns": {
            "user_id": {"cast": "int"},
            "coins": {"cast": "int"},
            "nickname": {"cast": "varchar"},
            "updated_at": {"cast": "timestamp"}
        },
        "primary_key": ["user_id"],
        "diff_fields": ["coins"]
    });
    let table_dir = table_config_dir(dir.path());
    fs::create_dir(&table_dir).unwrap();
    fs::write(table_dir.join("wallet.json"), wallet.to_string()).unwrap();
}

fn boot() -> (TempDir, EntityRegistry, MemoryEngine) {
    let dir = TempDir::new().unwrap();
    write_settings(&dir);

    let db = DbConfig::load_for(dir.path(), Environment::Stg).unwrap();
    let engine = MemoryEngine::new();
    let mut registry = EntityRegistry::new(db, Arc::new(engine.clone()));
    let loaded = registry.load_dir(&table_config_dir(dir.path())).unwrap();
    assert_eq!(loaded, vec!["wallet"]);

    let accessor = registry.accessor("wallet").unwrap();
    engine.create_shards(accessor.shard_map(), accessor.catalog());
    (dir, registry, engine)
}

#[test]
fn test_model_creates_missing_record_on_save() {
    let (_dir, registry, engine) = boot();
    let accessor = registry.accessor("wallet").unwrap();

    let mut model = RecordModel::new(accessor, record(json!({"user_id": 42}))).unwrap();
    assert!(model.set("nickname", "kai").unwrap());
    assert!(model.set("coins", 100).unwrap());
    assert_eq!(model.save().unwrap(), 1);
    assert!(!model.is_dirty());

    let rows = engine.rows("shard_a", "wallet_0");
    assert_eq!(rows[0]["coins"], Value::Int(100));
    assert_eq!(rows[0]["nickname"], Value::Text("kai".into()));
}

/// Two models loaded from the same row both add their own change.
#[test]
fn test_concurrent_models_do_not_lose_updates() {
    let (_dir, registry, engine) = boot();
    let accessor = registry.accessor("wallet").unwrap();
    accessor
        .insert(&record(json!({"user_id": 1, "coins": 10})), None)
        .unwrap();

    let key = record(json!({"user_id": 1}));
    let mut first = RecordModel::new(Arc::clone(&accessor), key.clone()).unwrap();
    let mut second = RecordModel::new(Arc::clone(&accessor), key).unwrap();
    first.load().unwrap();
    second.load().unwrap();

    first.set("coins", 15).unwrap();
    second.set("coins", 7).unwrap();
    first.update().unwrap();
    second.update().unwrap();

    let rows = engine.rows("shard_a", "wallet_0");
    assert_eq!(rows[0]["coins"], Value::Int(12));
}

#[test]
fn test_unknown_entity_is_rejected() {
    let (_dir, registry, _) = boot();
    assert!(registry.accessor("inventory").is_err());
    assert_eq!(registry.entities(), vec!["wallet"]);
}
