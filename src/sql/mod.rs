//! SQL generation module.
//!
//! This module provides a type-safe SQL builder that renders Hive and Doris SQL.
//! It includes:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations
//! - [`escape`] - Escaping for literals, variant keys, JSON paths and LIKE patterns

pub mod dialect;
pub mod escape;
pub mod expr;
pub mod query;
pub mod token;
pub mod types;

#[doc(hidden)]
pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    avg, cast, coalesce, col, conjunction, count, count_distinct, count_star, func,
    group_concat, json_extract, lit_bool, lit_float, lit_int, lit_null, lit_str, max, min,
    row_number, star, sum, table_col, table_star, BinaryOperator, Expr, ExprExt, Literal,
    SortDir, UnaryOperator, WindowExt, WindowOrderBy,
};
pub use query::{Join, JoinType, LimitOffset, OrderByExpr, Query, SelectExpr, TableRef, TableSource};
pub use token::{Token, TokenStream};
pub use types::CastType;
