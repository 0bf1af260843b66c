//! Query construction for shardbase
//!
//! Statements are built as a structure, rendered to MySQL-dialect SQL with
//! named placeholders, and carry their bind list in binding order. Raw SQL
//! from callers is classified by [`guard`] before it is routed.

mod ast;
mod builder;
pub mod guard;
mod render;

pub use ast::{Assignment, Bind, Condition, Expr, Page, Statement, StatementKind};
pub use builder::QueryBuilder;
pub use guard::{check_route, is_write_statement, returns_rows};
pub use render::{quote, render};
