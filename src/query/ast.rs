//! Statement AST
//!
//! The builder produces a structured statement alongside its SQL text so
//! that the text is a pure rendering of the structure. Drivers prepare
//! `sql` and bind `binds` in order; the in-process engine interprets
//! `kind` directly.

use crate::engine::Value;

/// Right-hand side of an assignment, condition or bulk row cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `:p`
    Param(String),
    /// `from_unixtime(:p)`
    FromUnixtime(String),
    /// `` `col`+:p ``
    Accumulate(String),
    /// `` values(`col`) ``
    Values,
    /// `` `col`+values(`col`) ``
    AccumulateValues,
    /// `` `col` `` (self-assignment, a no-op update)
    Keep,
}

impl Expr {
    /// Placeholder name the expression binds, if any
    pub fn param(&self) -> Option<&str> {
        match self {
            Expr::Param(p) | Expr::FromUnixtime(p) | Expr::Accumulate(p) => Some(p),
            Expr::Values | Expr::AccumulateValues | Expr::Keep => None,
        }
    }
}

/// `` `column`=<expr> `` in a set or on-duplicate clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub column: String,
    pub expr: Expr,
}

impl Assignment {
    pub fn new(column: impl Into<String>, expr: Expr) -> Self {
        Self {
            column: column.into(),
            expr,
        }
    }
}

/// `` `column`=<expr> `` in a where clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: String,
    pub expr: Expr,
}

impl Condition {
    pub fn new(column: impl Into<String>, expr: Expr) -> Self {
        Self {
            column: column.into(),
            expr,
        }
    }
}

/// Offset/limit paging, bound as `:offset` and `:limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    pub const OFFSET_PARAM: &'static str = "offset";
    pub const LIMIT_PARAM: &'static str = "limit";

    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// First page of `limit` rows
    pub fn first(limit: u64) -> Self {
        Self { offset: 0, limit }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::first(10)
    }
}

/// Structure of a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Select {
        table: String,
        conditions: Vec<Condition>,
        paged: bool,
    },
    Insert {
        table: String,
        assignments: Vec<Assignment>,
        /// Empty unless the statement is an upsert
        on_duplicate: Vec<Assignment>,
    },
    BulkInsert {
        table: String,
        columns: Vec<String>,
        /// One cell per column, `Param` or `FromUnixtime` only
        rows: Vec<Vec<Expr>>,
        on_duplicate: Vec<Assignment>,
    },
    Update {
        table: String,
        assignments: Vec<Assignment>,
        conditions: Vec<Condition>,
    },
    Delete {
        table: String,
        conditions: Vec<Condition>,
    },
    /// Caller-supplied SQL
    Raw,
}

impl StatementKind {
    /// Short operation name for logs
    pub fn name(&self) -> &'static str {
        match self {
            StatementKind::Select { .. } => "select",
            StatementKind::Insert { on_duplicate, .. } if on_duplicate.is_empty() => "insert",
            StatementKind::Insert { .. } => "upsert",
            StatementKind::BulkInsert { on_duplicate, .. } if on_duplicate.is_empty() => {
                "bulk_insert"
            }
            StatementKind::BulkInsert { .. } => "bulk_upsert",
            StatementKind::Update { .. } => "update",
            StatementKind::Delete { .. } => "delete",
            StatementKind::Raw => "raw",
        }
    }
}

/// A named bind parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Bind {
    pub name: String,
    pub value: Value,
}

impl Bind {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A rendered statement ready for execution
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
    /// Bind parameters in the order they must be bound
    pub binds: Vec<Bind>,
}

impl Statement {
    /// Wraps caller-supplied SQL
    pub fn raw(sql: impl Into<String>, binds: Vec<Bind>) -> Self {
        Self {
            kind: StatementKind::Raw,
            sql: sql.into(),
            binds,
        }
    }

    /// Looks up a bind value by placeholder name
    pub fn bind(&self, name: &str) -> Option<&Value> {
        self.binds.iter().find(|b| b.name == name).map(|b| &b.value)
    }

    /// Placeholder names in bind order
    pub fn bind_names(&self) -> Vec<&str> {
        self.binds.iter().map(|b| b.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_param() {
        assert_eq!(Expr::Accumulate("set_amount".into()).param(), Some("set_amount"));
        assert_eq!(Expr::Values.param(), None);
    }

    #[test]
    fn test_page_defaults() {
        assert_eq!(Page::default(), Page::new(0, 10));
        assert_eq!(Page::first(20).limit, 20);
    }

    #[test]
    fn test_statement_bind_lookup() {
        let stmt = Statement::raw(
            "select * from t where id = :id",
            vec![Bind::new("id", Value::Int(3))],
        );
        assert_eq!(stmt.bind("id"), Some(&Value::Int(3)));
        assert_eq!(stmt.bind("missing"), None);
        assert_eq!(stmt.bind_names(), vec!["id"]);
        assert_eq!(stmt.kind.name(), "raw");
    }
}
