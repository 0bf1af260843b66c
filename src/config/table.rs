//! Per-entity table configuration
//!
//! One JSON file per entity describes both the partition layout and the
//! column metadata. The column metadata is shared with the external
//! table-creation tool, so fields that only matter for DDL (`length`,
//! `unsigned`, `null_ok`, `default`, `index`, `unique`) are parsed and kept
//! but never influence generated statements.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use super::errors::{ConfigError, ConfigResult};

/// One partition rule: a slot range served by one physical table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PartitionRule {
    pub db: String,
    pub table_number: u32,
    pub key_range_min: i64,
    pub key_range_max: i64,
}

impl PartitionRule {
    /// Returns true if the slot falls within this rule's range
    pub fn covers(&self, slot: i64) -> bool {
        self.key_range_min <= slot && slot <= self.key_range_max
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnDef {
    pub cast: String,
    #[serde(default)]
    pub length: Option<serde_json::Value>,
    #[serde(default)]
    pub unsigned: bool,
    #[serde(default, alias = "null")]
    pub null_ok: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub update_current_timestamp: bool,
}

/// Secondary index or unique key declaration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexDef {
    #[serde(default)]
    pub index_name: Option<String>,
    pub columns: Vec<String>,
}

/// Columns in declaration order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Columns(pub Vec<(String, ColumnDef)>);

impl Columns {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnDef)> {
        self.0.iter().map(|(name, def)| (name.as_str(), def))
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDef> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, def)| def)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Columns {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ColumnsVisitor;

        impl<'de> Visitor<'de> for ColumnsVisitor {
            type Value = Columns;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "an object mapping column names to column definitions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Columns, A::Error> {
                let mut columns = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, def)) = map.next_entry::<String, ColumnDef>()? {
                    if columns.iter().any(|(n, _): &(String, ColumnDef)| *n == name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate column '{}'",
                            name
                        )));
                    }
                    columns.push((name, def));
                }
                Ok(Columns(columns))
            }
        }

        deserializer.deserialize_map(ColumnsVisitor)
    }
}

/// Full configuration of one entity type
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TableConfig {
    /// Entity identifier; defaults to the config file stem
    #[serde(default)]
    pub entity: Option<String>,
    /// Field whose value selects the shard
    pub division_key: String,
    /// Table name prefix
    pub table_name: String,
    /// Table number directive appended to `table_name`, e.g. `_%d`
    #[serde(default)]
    pub postfix: String,
    /// Number of slots; defaults to `max(key_range_max) + 1`
    #[serde(default)]
    pub division_count: Option<u32>,
    /// Partition rules, first match wins
    pub map: Vec<PartitionRule>,
    pub columns: Columns,
    pub primary_key: Vec<String>,
    /// Columns holding running totals
    #[serde(default)]
    pub diff_fields: Vec<String>,
    #[serde(default)]
    pub index: Vec<IndexDef>,
    #[serde(default)]
    pub unique: Vec<IndexDef>,
}

impl TableConfig {
    /// Loads a table config file; the entity name defaults to the file stem
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let origin = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read(&origin, e))?;
        let mut config = Self::from_json_str(&content, &origin)?;
        if config.entity.is_none() {
            config.entity = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string);
        }
        Ok(config)
    }

    /// Parses a table config from a JSON string
    pub fn from_json_str(content: &str, origin: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::parse(origin, e))
    }

    /// Loads every `*.json` file in a directory, in path order
    pub fn load_dir(dir: &Path) -> ConfigResult<Vec<Self>> {
        let origin = dir.display().to_string();
        let entries = fs::read_dir(dir).map_err(|e| ConfigError::read(&origin, e))?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| ConfigError::read(&origin, e))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        paths.iter().map(|p| Self::load(p)).collect()
    }

    /// Entity identifier, falling back to the table name
    pub fn entity_name(&self) -> &str {
        self.entity.as_deref().unwrap_or(&self.table_name)
    }

    /// Table name template: `table_name` followed by `postfix`
    pub fn table_template(&self) -> String {
        format!("{}{}", self.table_name, self.postfix)
    }

    /// Number of division slots
    pub fn effective_division_count(&self) -> Option<u32> {
        self.division_count.or_else(|| {
            self.map
                .iter()
                .map(|rule| rule.key_range_max)
                .max()
                .and_then(|max| u32::try_from(max.checked_add(1)?).ok())
        })
    }
}
