//! Test utilities for SQL emission validation.
//!
//! Provides helpers for validating that emitted SQL is syntactically correct
//! using sqlparser-rs for roundtrip validation.

use sqlparser::dialect::{HiveDialect, MySqlDialect};
use sqlparser::parser::Parser;

use super::dialect::Dialect;

/// Validates that a SQL string is syntactically valid for the given dialect.
///
/// Doris is checked with sqlparser's MySQL grammar, Hive with its Hive grammar.
///
/// # Example
///
/// ```ignore
/// use bkquery::sql::test_utils::validate_sql;
/// use bkquery::sql::dialect::Dialect;
///
/// validate_sql("SELECT * FROM users", Dialect::Doris).unwrap();
/// ```
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Hive => Box::new(HiveDialect {}),
        Dialect::Doris => Box::new(MySqlDialect {}),
    };

    Parser::parse_sql(&*parser_dialect, sql)
        .map(|_| ())
        .map_err(|e| format!("Invalid SQL for {:?}: {}\nSQL: {}", dialect, e, sql))
}
