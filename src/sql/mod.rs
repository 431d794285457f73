//! SQL generation module.
//!
//! A type-safe SQL builder that renders multi-dialect SELECT statements:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    cast, col, count_star, exists, extract, func, lit_bool, lit_float, lit_int, lit_json, lit_null,
    lit_str, lower, max, not_exists, star, table_col, table_star, BinaryOperator, CastType,
    DatePart, Expr, ExprExt, Literal, UnaryOperator,
};
pub use query::{
    Join, JoinType, LimitOffset, NullsOrder, OrderByExpr, Query, SelectExpr, SortDir, TableRef,
};
pub use token::{Token, TokenStream};
