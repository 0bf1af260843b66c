//! Statement builder
//!
//! Pure functions from a field map and the entity catalog to a
//! [`Statement`]. Nothing here touches a connection, so every statement
//! shape can be checked in isolation.

use super::ast::{Assignment, Bind, Condition, Expr, Page, Statement, StatementKind};
use super::render::render;
use crate::accessor::{AccessorError, AccessorResult};
use crate::engine::{Record, Value};
use crate::schema::{FieldDefinition, SchemaCatalog};

const WHERE_PREFIX: &str = "where_";
const SET_PREFIX: &str = "set_";

fn where_param(field: &str) -> String {
    format!("{}{}", WHERE_PREFIX, field)
}

fn set_param(field: &str) -> String {
    format!("{}{}", SET_PREFIX, field)
}

fn bulk_param(row: usize, field: &str) -> String {
    format!("{}{}_{}", SET_PREFIX, row, field)
}

/// Builds statements for one entity against one physical table
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    catalog: &'a SchemaCatalog,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// Point lookup by the full primary key, in catalog key order
    pub fn get(&self, table: &str, filter: &Record) -> Statement {
        let mut binds = Vec::new();
        let conditions = self
            .catalog
            .primary_key()
            .iter()
            .filter_map(|key| filter.get(key).map(|value| (key, value)))
            .map(|(key, value)| {
                let param = where_param(key);
                binds.push(Bind::new(param.clone(), value.clone()));
                Condition::new(key.as_str(), Expr::Param(param))
            })
            .collect();

        finish(
            StatementKind::Select {
                table: table.to_string(),
                conditions,
                paged: false,
            },
            binds,
        )
    }

    /// Equality filter over any known fields, paged
    pub fn find(&self, table: &str, filter: &Record, page: Page) -> Statement {
        let (conditions, mut binds) = self.conditions(filter);
        push_page(&mut binds, page);
        finish(
            StatementKind::Select {
                table: table.to_string(),
                conditions,
                paged: true,
            },
            binds,
        )
    }

    /// Every row of the table, paged
    pub fn find_all(&self, table: &str, page: Page) -> Statement {
        let mut binds = Vec::new();
        push_page(&mut binds, page);
        finish(
            StatementKind::Select {
                table: table.to_string(),
                conditions: Vec::new(),
                paged: true,
            },
            binds,
        )
    }

    /// Single-row insert; diff fields are written literally
    pub fn insert(&self, table: &str, data: &Record) -> AccessorResult<Statement> {
        let fields = self.writable(data, "insert")?;
        let (assignments, binds) = literal_assignments(&fields);
        Ok(finish(
            StatementKind::Insert {
                table: table.to_string(),
                assignments,
                on_duplicate: Vec::new(),
            },
            binds,
        ))
    }

    /// Update matching rows; diff fields are added to the stored value
    pub fn update(&self, table: &str, filter: &Record, data: &Record) -> AccessorResult<Statement> {
        let fields = self.writable(data, "update")?;
        let assignments = fields
            .iter()
            .map(|(field, _)| update_assignment(field))
            .collect();
        let mut binds: Vec<Bind> = fields
            .iter()
            .map(|(field, value)| Bind::new(set_param(&field.name), (*value).clone()))
            .collect();

        let (conditions, where_binds) = self.conditions(filter);
        binds.extend(where_binds);

        Ok(finish(
            StatementKind::Update {
                table: table.to_string(),
                assignments,
                conditions,
            },
            binds,
        ))
    }

    /// Upsert: insert semantics, then update semantics over the non-key
    /// fields on a duplicate key. The on-duplicate branch reuses the
    /// insert placeholders.
    pub fn save(&self, table: &str, data: &Record) -> AccessorResult<Statement> {
        let fields = self.writable(data, "save")?;
        let (assignments, binds) = literal_assignments(&fields);

        let mut on_duplicate: Vec<Assignment> = fields
            .iter()
            .filter(|(field, _)| !field.primary_key)
            .map(|(field, _)| update_assignment(field))
            .collect();
        if on_duplicate.is_empty() {
            on_duplicate.push(self.keep_first_key());
        }

        Ok(finish(
            StatementKind::Insert {
                table: table.to_string(),
                assignments,
                on_duplicate,
            },
            binds,
        ))
    }

    /// Multi-row insert; every row must carry the same known fields
    pub fn bulk_insert(&self, table: &str, rows: &[Record]) -> AccessorResult<Statement> {
        let (kind, binds) = self.bulk(table, rows, "bulk_insert")?;
        Ok(finish(kind, binds))
    }

    /// Multi-row upsert: diff fields accumulate, other non-key fields take
    /// the incoming value
    pub fn bulk_save(&self, table: &str, rows: &[Record]) -> AccessorResult<Statement> {
        let (mut kind, binds) = self.bulk(table, rows, "bulk_save")?;
        if let StatementKind::BulkInsert {
            columns,
            on_duplicate,
            ..
        } = &mut kind
        {
            *on_duplicate = columns
                .iter()
                .filter(|c| !self.catalog.is_primary_key(c))
                .map(|c| {
                    let expr = if self.catalog.is_diff(c) {
                        Expr::AccumulateValues
                    } else {
                        Expr::Values
                    };
                    Assignment::new(c.as_str(), expr)
                })
                .collect();
            if on_duplicate.is_empty() {
                on_duplicate.push(self.keep_first_key());
            }
        }
        Ok(finish(kind, binds))
    }

    /// Delete matching rows
    pub fn delete(&self, table: &str, filter: &Record) -> Statement {
        let (conditions, binds) = self.conditions(filter);
        finish(
            StatementKind::Delete {
                table: table.to_string(),
                conditions,
            },
            binds,
        )
    }

    fn conditions(&self, filter: &Record) -> (Vec<Condition>, Vec<Bind>) {
        self.catalog
            .known(filter)
            .into_iter()
            .map(|(field, value)| {
                let param = where_param(&field.name);
                (
                    Condition::new(field.name.as_str(), Expr::Param(param.clone())),
                    Bind::new(param, value.clone()),
                )
            })
            .unzip()
    }

    fn keep_first_key(&self) -> Assignment {
        let key = self
            .catalog
            .primary_key()
            .first()
            .map(String::as_str)
            .unwrap_or_default();
        Assignment::new(key, Expr::Keep)
    }

    /// Known fields of a write payload, with diff values checked
    fn writable<'r>(
        &'r self,
        data: &'r Record,
        operation: &str,
    ) -> AccessorResult<Vec<(&'r FieldDefinition, &'r Value)>> {
        let fields = self.catalog.known(data);
        if fields.is_empty() {
            return Err(AccessorError::no_writable_fields(operation));
        }
        for (field, value) in &fields {
            check_diff_value(field, value)?;
        }
        Ok(fields)
    }

    fn bulk(
        &self,
        table: &str,
        rows: &[Record],
        operation: &str,
    ) -> AccessorResult<(StatementKind, Vec<Bind>)> {
        let columns: Vec<&FieldDefinition> = match rows.first() {
            Some(first) => self.catalog.known(first).into_iter().map(|(f, _)| f).collect(),
            None => Vec::new(),
        };
        if columns.is_empty() {
            return Err(AccessorError::no_writable_fields(operation));
        }

        let expected: Vec<&str> = columns.iter().map(|f| f.name.as_str()).collect();
        let mut binds = Vec::with_capacity(rows.len() * columns.len());
        let mut cells = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let known = self.catalog.known(row);
            let actual: Vec<&str> = known.iter().map(|(f, _)| f.name.as_str()).collect();
            if actual != expected {
                return Err(AccessorError::bulk_field_mismatch(i, &expected, &actual));
            }

            let mut row_cells = Vec::with_capacity(columns.len());
            for (field, value) in known {
                check_diff_value(field, value)?;
                let param = bulk_param(i, &field.name);
                row_cells.push(value_expr(field, param.clone()));
                binds.push(Bind::new(param, value.clone()));
            }
            cells.push(row_cells);
        }

        let kind = StatementKind::BulkInsert {
            table: table.to_string(),
            columns: columns.iter().map(|f| f.name.clone()).collect(),
            rows: cells,
            on_duplicate: Vec::new(),
        };
        Ok((kind, binds))
    }
}

fn finish(kind: StatementKind, binds: Vec<Bind>) -> Statement {
    let sql = render(&kind);
    Statement { kind, sql, binds }
}

fn push_page(binds: &mut Vec<Bind>, page: Page) {
    binds.push(Bind::new(Page::OFFSET_PARAM, page_value(page.offset)));
    binds.push(Bind::new(Page::LIMIT_PARAM, page_value(page.limit)));
}

fn page_value(n: u64) -> Value {
    Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

fn value_expr(field: &FieldDefinition, param: String) -> Expr {
    if field.is_timestamp() {
        Expr::FromUnixtime(param)
    } else {
        Expr::Param(param)
    }
}

fn literal_assignments(fields: &[(&FieldDefinition, &Value)]) -> (Vec<Assignment>, Vec<Bind>) {
    fields
        .iter()
        .map(|(field, value)| {
            let param = set_param(&field.name);
            (
                Assignment::new(field.name.as_str(), value_expr(field, param.clone())),
                Bind::new(param, (*value).clone()),
            )
        })
        .unzip()
}

fn update_assignment(field: &FieldDefinition) -> Assignment {
    let param = set_param(&field.name);
    let expr = if field.is_diff() {
        Expr::Accumulate(param)
    } else {
        value_expr(field, param)
    };
    Assignment::new(field.name.as_str(), expr)
}

/// Diff values must be numeric. NULL is allowed where it is stored
/// literally, never where it would be added.
/// Diff fields hold running totals; a NULL would stay NULL under `+`
fn check_diff_value(field: &FieldDefinition, value: &Value) -> AccessorResult<()> {
    if !field.is_diff() || value.is_numeric() {
        return Ok(());
    }
    Err(AccessorError::invalid_value(
        &field.name,
        format!("diff field requires a number, got {}", value),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::AccessorErrorCode;
    use crate::config::TableConfig;
    use serde_json::json;

    fn catalog() -> SchemaCatalog {
        let config: TableConfig = serde_json::from_value(json!({
            "division_key": "user_id",
            "table_name": "orders",
            "postfix": "_%d",
            "map": [{"db": "shard_a", "table_number": 0, "key_range_min": 0, "key_range_max": 3}],
            "columns": {
                "user_id": {"cast": "int"},
                "item_id": {"cast": "int"},
                "name": {"cast": "varchar"},
                "amount": {"cast": "int"},
                "created_at": {"cast": "timestamp"}
            },
            "primary_key": ["user_id", "item_id"],
            "diff_fields": ["amount"]
        }))
        .unwrap();
        SchemaCatalog::from_config(&config).unwrap()
    }

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_get_uses_primary_key_order() {
        let catalog = catalog();
        let stmt = QueryBuilder::new(&catalog).get(
            "orders_2",
            &record(json!({"item_id": 7, "user_id": 10})),
        );
        assert_eq!(
            stmt.sql,
            "select * from `orders_2` where `user_id`=:where_user_id and `item_id`=:where_item_id"
        );
        assert_eq!(stmt.bind_names(), vec!["where_user_id", "where_item_id"]);
    }

    #[test]
    fn test_find_filters_unknown_fields_and_pages() {
        let catalog = catalog();
        let stmt = QueryBuilder::new(&catalog).find(
            "orders_2",
            &record(json!({"bogus": 1, "name": "x"})),
            Page::new(5, 10),
        );
        assert_eq!(
            stmt.sql,
            "select * from `orders_2` where `name`=:where_name limit :offset, :limit"
        );
        assert_eq!(stmt.bind("offset"), Some(&Value::Int(5)));
        assert_eq!(stmt.bind("limit"), Some(&Value::Int(10)));
        assert_eq!(stmt.bind("where_bogus"), None);
    }

    #[test]
    fn test_find_with_empty_filter_has_no_where_clause() {
        let catalog = catalog();
        let builder = QueryBuilder::new(&catalog);
        let stmt = builder.find("orders_0", &record(json!({"bogus": 1})), Page::default());
        assert_eq!(stmt.sql, "select * from `orders_0` limit :offset, :limit");

        let all = builder.find_all("orders_0", Page::first(20));
        assert_eq!(all.sql, "select * from `orders_0` limit :offset, :limit");
        assert_eq!(all.bind("limit"), Some(&Value::Int(20)));
    }

    #[test]
    fn test_insert_diff_literal_and_timestamp() {
        let catalog = catalog();
        let stmt = QueryBuilder::new(&catalog)
            .insert(
                "orders_2",
                &record(json!({
                    "user_id": 10, "item_id": 1, "amount": 500, "created_at": 1700000000
                })),
            )
            .unwrap();
        assert_eq!(
            stmt.sql,
            "insert into `orders_2` set `user_id`=:set_user_id, `item_id`=:set_item_id, \
             `amount`=:set_amount, `created_at`=from_unixtime(:set_created_at)"
        );
    }

    #[test]
    fn test_update_diff_is_additive() {
        let catalog = catalog();
        let stmt = QueryBuilder::new(&catalog)
            .update(
                "orders_2",
                &record(json!({"user_id": 10, "item_id": 1})),
                &record(json!({"amount": 3, "name": "n"})),
            )
            .unwrap();
        assert_eq!(
            stmt.sql,
            "update `orders_2` set `name`=:set_name, `amount`=`amount`+:set_amount \
             where `user_id`=:where_user_id and `item_id`=:where_item_id"
        );
        assert_eq!(
            stmt.bind_names(),
            vec!["set_name", "set_amount", "where_user_id", "where_item_id"]
        );
    }

    #[test]
    fn test_save_on_duplicate_skips_primary_key() {
        let catalog = catalog();
        let stmt = QueryBuilder::new(&catalog)
            .save(
                "orders_2",
                &record(json!({"user_id": 10, "item_id": 1, "amount": 2})),
            )
            .unwrap();
        assert_eq!(
            stmt.sql,
            "insert into `orders_2` set `user_id`=:set_user_id, `item_id`=:set_item_id, \
             `amount`=:set_amount on duplicate key update `amount`=`amount`+:set_amount"
        );
        assert_eq!(stmt.binds.len(), 3);
    }

    #[test]
    fn test_save_with_only_key_fields_keeps_first_key() {
        let catalog = catalog();
        let stmt = QueryBuilder::new(&catalog)
            .save("orders_2", &record(json!({"user_id": 10, "item_id": 1})))
            .unwrap();
        assert!(stmt.sql.ends_with("on duplicate key update `user_id`=`user_id`"));
    }

    #[test]
    fn test_bulk_insert_columns_follow_catalog_order() {
        let catalog = catalog();
        let rows = vec![
            record(json!({"created_at": 1700000000, "item_id": 1, "user_id": 10})),
            record(json!({"user_id": 10, "item_id": 2, "created_at": 1700000060, "bogus": 1})),
        ];
        let stmt = QueryBuilder::new(&catalog).bulk_insert("orders_2", &rows).unwrap();
        assert_eq!(
            stmt.sql,
            "insert into `orders_2` (`user_id`, `item_id`, `created_at`) values \
             (:set_0_user_id, :set_0_item_id, from_unixtime(:set_0_created_at)), \
             (:set_1_user_id, :set_1_item_id, from_unixtime(:set_1_created_at))"
        );
        assert_eq!(stmt.bind("set_1_created_at"), Some(&Value::Int(1700000060)));
    }

    #[test]
    fn test_bulk_rows_with_different_fields_are_rejected() {
        let catalog = catalog();
        let builder = QueryBuilder::new(&catalog);
        let rows = vec![
            record(json!({"user_id": 1, "item_id": 1, "amount": 5})),
            record(json!({"user_id": 1, "item_id": 2, "name": "new", "amount": 1})),
        ];

        let err = builder.bulk_save("orders_1", &rows).unwrap_err();
        assert_eq!(err.code(), AccessorErrorCode::BulkFieldMismatch);
        assert!(err.message().contains("row 1"));

        let shrinking = vec![rows[1].clone(), rows[0].clone()];
        let err = builder.bulk_insert("orders_1", &shrinking).unwrap_err();
        assert_eq!(err.code(), AccessorErrorCode::BulkFieldMismatch);
    }

    #[test]
    fn test_bulk_null_diff_value_is_rejected() {
        let catalog = catalog();
        let rows = vec![record(json!({"user_id": 1, "item_id": 1, "amount": null}))];
        let err = QueryBuilder::new(&catalog).bulk_save("orders_1", &rows).unwrap_err();
        assert_eq!(err.code(), AccessorErrorCode::InvalidValue);
    }

    #[test]
    fn test_bulk_save_on_duplicate_clause() {
        let catalog = catalog();
        let rows = vec![record(json!({"user_id": 10, "item_id": 1, "amount": 5, "name": "a"}))];
        let stmt = QueryBuilder::new(&catalog).bulk_save("orders_2", &rows).unwrap();
        assert!(stmt.sql.ends_with(
            "on duplicate key update `name`=values(`name`), `amount`=`amount`+values(`amount`)"
        ));
        assert_eq!(stmt.kind.name(), "bulk_upsert");
    }

    #[test]
    fn test_write_without_known_fields_is_rejected() {
        let catalog = catalog();
        let builder = QueryBuilder::new(&catalog);
        let err = builder
            .insert("orders_2", &record(json!({"bogus": 1})))
            .unwrap_err();
        assert_eq!(err.code(), AccessorErrorCode::NoWritableFields);

        let err = builder
            .bulk_insert("orders_2", &[record(json!({"bogus": 1}))])
            .unwrap_err();
        assert_eq!(err.code(), AccessorErrorCode::NoWritableFields);
    }

    #[test]
    fn test_non_numeric_diff_value_is_rejected() {
        let catalog = catalog();
        let builder = QueryBuilder::new(&catalog);
        let err = builder
            .save("orders_2", &record(json!({"user_id": 1, "item_id": 1, "amount": "lots"})))
            .unwrap_err();
        assert_eq!(err.code(), AccessorErrorCode::InvalidValue);

        let err = builder
            .update(
                "orders_2",
                &record(json!({"user_id": 1, "item_id": 1})),
                &record(json!({"amount": null})),
            )
            .unwrap_err();
        assert_eq!(err.code(), AccessorErrorCode::InvalidValue);

        let err = builder
            .insert("orders_2", &record(json!({"user_id": 1, "item_id": 1, "amount": null})))
            .unwrap_err();
        assert_eq!(err.code(), AccessorErrorCode::InvalidValue);
    }

    #[test]
    fn test_delete() {
        let catalog = catalog();
        let stmt = QueryBuilder::new(&catalog).delete(
            "orders_2",
            &record(json!({"user_id": 10, "item_id": 1})),
        );
        assert_eq!(
            stmt.sql,
            "delete from `orders_2` where `user_id`=:where_user_id and `item_id`=:where_item_id"
        );
    }
}
