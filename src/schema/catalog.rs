//! Schema catalog
//!
//! Built once per entity from its table config and immutable afterwards,
//! so it can be shared across threads without locking.

use std::collections::HashMap;

use super::types::{is_numeric_cast, is_timestamp_cast, FieldCategory, FieldDefinition};
use crate::config::{ConfigError, ConfigResult, TableConfig};
use crate::engine::{Record, Value};

/// Field metadata of one entity type
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    entity: String,
    /// Fields in column declaration order
    fields: Vec<FieldDefinition>,
    positions: HashMap<String, usize>,
    /// Primary-key names in declared key order
    primary_key: Vec<String>,
    division_key: String,
}

impl SchemaCatalog {
    /// Builds the catalog, failing fast on malformed metadata.
    pub fn from_config(config: &TableConfig) -> ConfigResult<Self> {
        let entity = config.entity_name().to_string();
        let invalid = |reason: String| ConfigError::invalid_table(&entity, reason);

        if config.columns.is_empty() {
            return Err(invalid("no columns declared".into()));
        }
        if config.primary_key.is_empty() {
            return Err(invalid("primary_key is empty".into()));
        }

        for (i, key) in config.primary_key.iter().enumerate() {
            if !config.columns.contains(key) {
                return Err(invalid(format!("primary key '{}' is not a column", key)));
            }
            if config.primary_key[..i].contains(key) {
                return Err(invalid(format!("primary key '{}' listed twice", key)));
            }
        }

        for name in &config.diff_fields {
            let column = config
                .columns
                .get(name)
                .ok_or_else(|| invalid(format!("diff field '{}' is not a column", name)))?;
            if is_timestamp_cast(&column.cast) {
                return Err(invalid(format!("diff field '{}' is a timestamp", name)));
            }
            if !is_numeric_cast(&column.cast) {
                return Err(invalid(format!(
                    "diff field '{}' has non-numeric cast '{}'",
                    name, column.cast
                )));
            }
        }

        if !config.columns.contains(&config.division_key) {
            return Err(invalid(format!(
                "division key '{}' is not a column",
                config.division_key
            )));
        }

        let fields: Vec<FieldDefinition> = config
            .columns
            .iter()
            .map(|(name, column)| {
                let category = if config.diff_fields.iter().any(|d| d == name) {
                    FieldCategory::Diff
                } else if is_timestamp_cast(&column.cast) {
                    FieldCategory::Timestamp
                } else {
                    FieldCategory::Plain
                };
                let primary_key = config.primary_key.iter().any(|k| k == name);
                FieldDefinition::new(name, category, primary_key)
            })
            .collect();

        Ok(Self::from_parts(
            entity,
            fields,
            config.primary_key.clone(),
            config.division_key.clone(),
        ))
    }

    fn from_parts(
        entity: String,
        fields: Vec<FieldDefinition>,
        primary_key: Vec<String>,
        division_key: String,
    ) -> Self {
        let positions = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        Self {
            entity,
            fields,
            positions,
            primary_key,
            division_key,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// All fields in catalog order
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.positions.get(name).map(|&i| &self.fields[i])
    }

    /// Primary-key field names in declared order
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn division_key(&self) -> &str {
        &self.division_key
    }

    pub fn is_field(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn is_timestamp(&self, name: &str) -> bool {
        self.field(name).is_some_and(FieldDefinition::is_timestamp)
    }

    pub fn is_diff(&self, name: &str) -> bool {
        self.field(name).is_some_and(FieldDefinition::is_diff)
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.primary_key)
    }

    pub fn timestamp_fields(&self) -> Vec<&str> {
        self.names_where(FieldDefinition::is_timestamp)
    }

    pub fn diff_fields(&self) -> Vec<&str> {
        self.names_where(FieldDefinition::is_diff)
    }

    fn names_where(&self, pred: impl Fn(&FieldDefinition) -> bool) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|&f| pred(f))
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Intersects a record with the known fields, in catalog order.
    ///
    /// Keys the catalog does not know are dropped.
    pub fn known<'a>(&'a self, record: &'a Record) -> Vec<(&'a FieldDefinition, &'a Value)> {
        self.fields
            .iter()
            .filter_map(|f| record.get(&f.name).map(|v| (f, v)))
            .collect()
    }

    /// Copy of the record without its primary-key fields
    pub fn without_primary_key(&self, record: &Record) -> Record {
        record
            .iter()
            .filter(|(k, _)| !self.is_primary_key(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Projection of the record onto the primary key
    pub fn primary_key_of(&self, record: &Record) -> Record {
        self.primary_key
            .iter()
            .filter_map(|k| record.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: serde_json::Value) -> TableConfig {
        serde_json::from_value(json).unwrap()
    }

    fn orders() -> TableConfig {
        config(serde_json::json!({
            "entity": "orders",
            "division_key": "user_id",
            "table_name": "orders",
            "postfix": "_%d",
            "division_count": 4,
            "map": [ { "db": "shard_a", "table_number": 0, "key_range_min": 0, "key_range_max": 3 } ],
            "columns": {
                "user_id": { "cast": "bigint" },
                "item_id": { "cast": "int" },
                "amount": { "cast": "int" },
                "name": { "cast": "varchar" },
                "created_at": { "cast": "timestamp" }
            },
            "primary_key": ["user_id", "item_id"],
            "diff_fields": ["amount"]
        }))
    }

    #[test]
    fn test_categories_from_config() {
        let catalog = SchemaCatalog::from_config(&orders()).unwrap();

        assert_eq!(catalog.entity(), "orders");
        assert_eq!(catalog.primary_key(), ["user_id", "item_id"]);
        assert_eq!(catalog.division_key(), "user_id");
        assert_eq!(catalog.diff_fields(), vec!["amount"]);
        assert_eq!(catalog.timestamp_fields(), vec!["created_at"]);
        assert!(catalog.is_primary_key("item_id"));
        assert!(!catalog.is_primary_key("name"));
        assert!(catalog.is_field("name"));
        assert!(!catalog.is_field("nickname"));
    }

    #[test]
    fn test_known_filters_and_orders_by_catalog() {
        let catalog = SchemaCatalog::from_config(&orders()).unwrap();
        let record: Record = serde_json::from_value(serde_json::json!({
            "name": "x", "bogus": 1, "user_id": 7, "amount": 3
        }))
        .unwrap();

        let names: Vec<&str> = catalog
            .known(&record)
            .into_iter()
            .map(|(f, _)| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["user_id", "amount", "name"]);
    }

    #[test]
    fn test_without_primary_key() {
        let catalog = SchemaCatalog::from_config(&orders()).unwrap();
        let record: Record = serde_json::from_value(serde_json::json!({
            "user_id": 7, "item_id": 1, "amount": 3
        }))
        .unwrap();

        let rest = catalog.without_primary_key(&record);
        assert_eq!(rest.len(), 1);
        assert!(rest.contains_key("amount"));
        assert_eq!(catalog.primary_key_of(&record).len(), 2);
    }

    #[test]
    fn test_rejects_unknown_primary_key() {
        let mut cfg = orders();
        cfg.primary_key = vec!["missing".into()];
        let err = SchemaCatalog::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("primary key 'missing'"));
    }

    #[test]
    fn test_rejects_non_numeric_diff_field() {
        let mut cfg = orders();
        cfg.diff_fields = vec!["name".into()];
        assert!(SchemaCatalog::from_config(&cfg).is_err());

        cfg.diff_fields = vec!["created_at".into()];
        let err = SchemaCatalog::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("timestamp"));
    }

    #[test]
    fn test_rejects_unknown_division_key() {
        let mut cfg = orders();
        cfg.division_key = "shop_id".into();
        assert!(SchemaCatalog::from_config(&cfg).is_err());
    }

    #[test]
    fn test_rejects_duplicate_primary_key() {
        let mut cfg = orders();
        cfg.primary_key = vec!["user_id".into(), "user_id".into()];
        assert!(SchemaCatalog::from_config(&cfg).is_err());
    }
}
