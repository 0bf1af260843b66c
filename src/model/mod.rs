//! Record model
//!
//! A single record addressed by its primary key. Fields are read once from
//! the primary, changed locally, and written back through the entity's
//! [`Accessor`]. Diff fields track the delta against the loaded total so
//! that concurrent writers accumulate instead of overwriting each other.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::accessor::{validate_where, Accessor, AccessorError, AccessorResult};
use crate::connection::ReplicaRole;
use crate::engine::{Record, Value};

/// One record of an entity with pending changes
#[derive(Debug)]
pub struct RecordModel {
    accessor: Arc<Accessor>,
    primary_key: Record,
    /// Current values; `None` until loaded
    values: Option<Record>,
    /// Accumulated change of each diff field since the last write
    deltas: Record,
    /// Fields set since the last write
    pending: BTreeSet<String>,
}

impl RecordModel {
    /// Addresses a record. The key must be the entity's full primary key.
    pub fn new(accessor: Arc<Accessor>, primary_key: Record) -> AccessorResult<Self> {
        validate_where(accessor.catalog(), &primary_key)?;
        Ok(Self {
            accessor,
            primary_key,
            values: None,
            deltas: Record::new(),
            pending: BTreeSet::new(),
        })
    }

    /// Reads the record from the primary. A missing row starts as every
    /// catalog field NULL except the primary key.
    pub fn load(&mut self) -> AccessorResult<()> {
        let mut row = self
            .accessor
            .get(&self.primary_key, None, ReplicaRole::Primary)?;
        if row.is_empty() {
            row = self
                .accessor
                .catalog()
                .fields()
                .iter()
                .map(|f| (f.name.clone(), Value::Null))
                .collect();
            row.extend(self.primary_key.clone());
        }
        self.values = Some(row);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.values.is_some()
    }

    /// Current value of a field; `None` before [`RecordModel::load`] or for
    /// unknown fields
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.as_ref()?.get(field)
    }

    pub fn primary_key(&self) -> &Record {
        &self.primary_key
    }

    /// Sets a field, loading the record first if needed. Returns `false`
    /// for a field the catalog does not know.
    ///
    /// For a diff field the change `value - current` is added to the
    /// pending delta.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> AccessorResult<bool> {
        let value = value.into();
        let catalog = self.accessor.catalog();
        if !catalog.is_field(field) {
            return Ok(false);
        }
        let is_diff = catalog.is_diff(field);

        if self.values.is_none() {
            self.load()?;
        }
        let values = self.values.get_or_insert_with(Record::new);

        if is_diff {
            let current = values.get(field).cloned().unwrap_or(Value::Null);
            let change = value
                .checked_sub(&current)
                .ok_or_else(|| AccessorError::invalid_value(field, format!("'{}' is not a number", value)))?;
            let pending = self.deltas.get(field).cloned().unwrap_or(Value::Int(0));
            let total = pending
                .checked_add(&change)
                .ok_or_else(|| AccessorError::invalid_value(field, "delta overflow"))?;
            self.deltas.insert(field.to_string(), total);
        }

        values.insert(field.to_string(), value);
        self.pending.insert(field.to_string());
        Ok(true)
    }

    /// True if a field was set since the last write
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Inserts the record; fails on a duplicate primary key
    pub fn insert(&mut self) -> AccessorResult<u64> {
        let data = self.payload(true)?;
        let affected = self.accessor.insert(&data, None)?;
        self.written();
        Ok(affected)
    }

    /// Updates the existing row with the pending changes
    pub fn update(&mut self) -> AccessorResult<u64> {
        let data = self.payload(false)?;
        let affected = self.accessor.update(&self.primary_key, &data, None)?;
        self.written();
        Ok(affected)
    }

    /// Inserts, or applies the pending changes to the existing row
    pub fn save(&mut self) -> AccessorResult<u64> {
        let data = self.payload(true)?;
        let affected = self.accessor.save(&data, None)?;
        self.written();
        Ok(affected)
    }

    /// Deletes the row and forgets the loaded values
    pub fn delete(&mut self) -> AccessorResult<u64> {
        let affected = self.accessor.delete(&self.primary_key, None)?;
        self.values = None;
        self.deltas.clear();
        self.pending.clear();
        Ok(affected)
    }

    /// Pending fields with diff fields replaced by their deltas
    fn payload(&self, with_key: bool) -> AccessorResult<Record> {
        let fields: Vec<&String> = self
            .pending
            .iter()
            .filter(|f| !self.primary_key.contains_key(*f))
            .collect();
        if fields.is_empty() {
            return Err(AccessorError::nothing_to_save(self.accessor.entity()));
        }

        let values = self.values.as_ref();
        let mut data = if with_key {
            self.primary_key.clone()
        } else {
            Record::new()
        };
        for field in fields {
            let value = match self.deltas.get(field) {
                Some(delta) => delta.clone(),
                None => values
                    .and_then(|v| v.get(field))
                    .cloned()
                    .unwrap_or(Value::Null),
            };
            data.insert(field.clone(), value);
        }
        Ok(data)
    }

    fn written(&mut self) {
        self.deltas.clear();
        self.pending.clear();
    }
}
