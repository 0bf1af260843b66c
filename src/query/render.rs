//! SQL rendering
//!
//! MySQL dialect: backtick-quoted identifiers, named placeholders,
//! `from_unixtime` for timestamps, `on duplicate key update` and
//! `values(col)` for upserts.

use super::ast::{Assignment, Condition, Expr, Page, StatementKind};

/// Quotes an identifier with backticks
pub fn quote(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Renders an expression assigned to or compared with `column`
pub fn render_expr(column: &str, expr: &Expr) -> String {
    match expr {
        Expr::Param(p) => format!(":{}", p),
        Expr::FromUnixtime(p) => format!("from_unixtime(:{})", p),
        Expr::Accumulate(p) => format!("{}+:{}", quote(column), p),
        Expr::Values => format!("values({})", quote(column)),
        Expr::AccumulateValues => format!("{0}+values({0})", quote(column)),
        Expr::Keep => quote(column),
    }
}

fn render_assignments(assignments: &[Assignment]) -> String {
    assignments
        .iter()
        .map(|a| format!("{}={}", quote(&a.column), render_expr(&a.column, &a.expr)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_conditions(conditions: &[Condition]) -> String {
    conditions
        .iter()
        .map(|c| format!("{}={}", quote(&c.column), render_expr(&c.column, &c.expr)))
        .collect::<Vec<_>>()
        .join(" and ")
}

fn push_on_duplicate(sql: &mut String, on_duplicate: &[Assignment]) {
    if !on_duplicate.is_empty() {
        sql.push_str(" on duplicate key update ");
        sql.push_str(&render_assignments(on_duplicate));
    }
}

/// Renders a statement structure to SQL text
pub fn render(kind: &StatementKind) -> String {
    match kind {
        StatementKind::Select {
            table,
            conditions,
            paged,
        } => {
            let mut sql = format!("select * from {}", quote(table));
            if !conditions.is_empty() {
                sql.push_str(" where ");
                sql.push_str(&render_conditions(conditions));
            }
            if *paged {
                sql.push_str(&format!(
                    " limit :{}, :{}",
                    Page::OFFSET_PARAM,
                    Page::LIMIT_PARAM
                ));
            }
            sql
        }
        StatementKind::Insert {
            table,
            assignments,
            on_duplicate,
        } => {
            let mut sql = format!(
                "insert into {} set {}",
                quote(table),
                render_assignments(assignments)
            );
            push_on_duplicate(&mut sql, on_duplicate);
            sql
        }
        StatementKind::BulkInsert {
            table,
            columns,
            rows,
            on_duplicate,
        } => {
            let column_list = columns
                .iter()
                .map(|c| quote(c))
                .collect::<Vec<_>>()
                .join(", ");
            let row_list = rows
                .iter()
                .map(|row| {
                    let cells = row
                        .iter()
                        .zip(columns)
                        .map(|(cell, column)| render_expr(column, cell))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("({})", cells)
                })
                .collect::<Vec<_>>()
                .join(", ");
            let mut sql = format!(
                "insert into {} ({}) values {}",
                quote(table),
                column_list,
                row_list
            );
            push_on_duplicate(&mut sql, on_duplicate);
            sql
        }
        StatementKind::Update {
            table,
            assignments,
            conditions,
        } => format!(
            "update {} set {} where {}",
            quote(table),
            render_assignments(assignments),
            render_conditions(conditions)
        ),
        StatementKind::Delete { table, conditions } => format!(
            "delete from {} where {}",
            quote(table),
            render_conditions(conditions)
        ),
        StatementKind::Raw => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes_backticks() {
        assert_eq!(quote("orders_2"), "`orders_2`");
        assert_eq!(quote("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_render_expr_forms() {
        assert_eq!(render_expr("a", &Expr::Param("set_a".into())), ":set_a");
        assert_eq!(
            render_expr("t", &Expr::FromUnixtime("set_t".into())),
            "from_unixtime(:set_t)"
        );
        assert_eq!(render_expr("n", &Expr::Accumulate("set_n".into())), "`n`+:set_n");
        assert_eq!(render_expr("n", &Expr::Values), "values(`n`)");
        assert_eq!(render_expr("n", &Expr::AccumulateValues), "`n`+values(`n`)");
        assert_eq!(render_expr("id", &Expr::Keep), "`id`");
    }

    #[test]
    fn test_render_delete() {
        let sql = render(&StatementKind::Delete {
            table: "orders_0".into(),
            conditions: vec![
                Condition::new("user_id", Expr::Param("where_user_id".into())),
                Condition::new("item_id", Expr::Param("where_item_id".into())),
            ],
        });
        assert_eq!(
            sql,
            "delete from `orders_0` where `user_id`=:where_user_id and `item_id`=:where_item_id"
        );
    }
}
