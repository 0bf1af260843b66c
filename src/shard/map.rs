//! Shard map
//!
//! Resolution is a two-step function:
//! 1. `slot = division_key mod division_count` (Euclidean, so negative keys
//!    land in range)
//! 2. the slot is served by the first partition rule whose
//!    `[key_range_min, key_range_max]` range contains it
//!
//! Step 2 is precomputed into a slot table at build time. The build checks
//! that every slot is covered, so resolution is total afterwards.

use serde::Serialize;

use crate::accessor::{AccessorError, AccessorResult};
use crate::config::{ConfigError, ConfigResult, DbConfig, Endpoint, PartitionRule, TableConfig};
use crate::connection::ReplicaRole;
use crate::engine::{Record, Value};

/// Largest slot table a shard map will build
pub const MAX_DIVISION_COUNT: u32 = 1 << 16;

/// Physical location of one shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardDescriptor {
    pub db_name: String,
    pub table_name: String,
    pub table_number: u32,
    pub primary: Endpoint,
    pub replica: Endpoint,
}

impl ShardDescriptor {
    /// Returns the endpoint serving the given role
    pub fn endpoint(&self, role: ReplicaRole) -> &Endpoint {
        match role {
            ReplicaRole::Primary => &self.primary,
            ReplicaRole::Replica => &self.replica,
        }
    }
}

/// Substitutes a table number into a printf-style name template.
///
/// Supports `%d`, zero-padded `%0Nd` and `%%`. Only the first `%d`
/// directive is substituted; a template without one gets the number
/// appended.
pub fn format_table_name(template: &str, number: u32) -> String {
    let mut out = String::with_capacity(template.len() + 4);
    let mut substituted = false;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut width = String::new();
        while let Some(&d) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            width.push(d);
            chars.next();
        }

        if chars.peek() == Some(&'d') && !substituted {
            chars.next();
            let pad: usize = width.parse().unwrap_or(0);
            if width.starts_with('0') {
                out.push_str(&format!("{:0pad$}", number, pad = pad));
            } else {
                out.push_str(&format!("{:pad$}", number, pad = pad));
            }
            substituted = true;
        } else {
            out.push('%');
            out.push_str(&width);
        }
    }

    if !substituted {
        out.push_str(&number.to_string());
    }
    out
}

/// Division key to shard resolution for one entity
#[derive(Debug, Clone)]
pub struct ShardMap {
    entity: String,
    division_key: String,
    division_count: u32,
    rules: Vec<PartitionRule>,
    /// One descriptor per rule, same order
    shards: Vec<ShardDescriptor>,
    /// Slot to index into `shards`
    slots: Vec<usize>,
}

impl ShardMap {
    /// Builds the map from the entity's partition config and the credentials.
    pub fn build(config: &TableConfig, db: &DbConfig) -> ConfigResult<Self> {
        let entity = config.entity_name().to_string();
        let invalid = |reason: String| ConfigError::invalid_table(&entity, reason);

        if config.map.is_empty() {
            return Err(invalid("partition map is empty".into()));
        }
        let division_count = config
            .effective_division_count()
            .ok_or_else(|| invalid("division_count cannot be derived".into()))?;
        if division_count == 0 {
            return Err(invalid("division_count must be > 0".into()));
        }
        if division_count > MAX_DIVISION_COUNT {
            return Err(invalid(format!(
                "division_count {} exceeds the maximum of {}",
                division_count, MAX_DIVISION_COUNT
            )));
        }

        let template = config.table_template();
        let mut shards = Vec::with_capacity(config.map.len());
        for rule in &config.map {
            if rule.key_range_min < 0 || rule.key_range_min > rule.key_range_max {
                return Err(invalid(format!(
                    "invalid key range {}..={} for table {}",
                    rule.key_range_min, rule.key_range_max, rule.table_number
                )));
            }
            if rule.key_range_max >= i64::from(division_count) {
                return Err(invalid(format!(
                    "key range {}..={} exceeds division_count {}",
                    rule.key_range_min, rule.key_range_max, division_count
                )));
            }
            let settings = db.settings(&rule.db).ok_or_else(|| {
                invalid(format!("database '{}' is not in database_settings", rule.db))
            })?;
            shards.push(ShardDescriptor {
                db_name: rule.db.clone(),
                table_name: format_table_name(&template, rule.table_number),
                table_number: rule.table_number,
                primary: settings.primary.clone(),
                replica: settings.replica.clone(),
            });
        }

        let mut slots = Vec::with_capacity(division_count as usize);
        for slot in 0..i64::from(division_count) {
            let index = config
                .map
                .iter()
                .position(|rule| rule.covers(slot))
                .ok_or_else(|| invalid(format!("slot {} is not covered by any rule", slot)))?;
            slots.push(index);
        }

        Ok(Self {
            entity,
            division_key: config.division_key.clone(),
            division_count,
            rules: config.map.clone(),
            shards,
            slots,
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn division_key(&self) -> &str {
        &self.division_key
    }

    pub fn division_count(&self) -> u32 {
        self.division_count
    }

    /// Slot a division key falls into
    pub fn slot(&self, division_key: i64) -> u32 {
        // rem_euclid of a positive modulus is in 0..division_count
        division_key.rem_euclid(i64::from(self.division_count)) as u32
    }

    /// Resolves a division key through the precomputed slot table
    pub fn resolve(&self, division_key: i64) -> &ShardDescriptor {
        let slot = self.slot(division_key) as usize;
        &self.shards[self.slots[slot]]
    }

    /// Resolves a division key by scanning the rules in configuration order.
    ///
    /// Agrees with [`ShardMap::resolve`] for every key.
    pub fn scan(&self, division_key: i64) -> Option<&ShardDescriptor> {
        let slot = i64::from(self.slot(division_key));
        self.rules
            .iter()
            .position(|rule| rule.covers(slot))
            .map(|i| &self.shards[i])
    }

    /// Reads the division key from the hint, falling back to the record.
    pub fn division_key_of(&self, record: &Record, hint: Option<&Record>) -> AccessorResult<i64> {
        let name = self.division_key.as_str();
        let value = hint
            .and_then(|h| h.get(name))
            .or_else(|| record.get(name))
            .ok_or_else(|| AccessorError::division_key_missing(name))?;

        match value {
            Value::Null => Err(AccessorError::division_key_missing(name)),
            other => other
                .as_i64()
                .ok_or_else(|| AccessorError::division_key_invalid(name, other)),
        }
    }

    /// Resolves the shard for a record, honoring an explicit hint
    pub fn resolve_record(
        &self,
        record: &Record,
        hint: Option<&Record>,
    ) -> AccessorResult<&ShardDescriptor> {
        let key = self.division_key_of(record, hint)?;
        Ok(self.resolve(key))
    }

    /// All shards, one per partition rule
    pub fn shards(&self) -> &[ShardDescriptor] {
        &self.shards
    }

    /// Distinct database names in configuration order
    pub fn databases(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for shard in &self.shards {
            if !names.contains(&shard.db_name.as_str()) {
                names.push(&shard.db_name);
            }
        }
        names
    }
}
