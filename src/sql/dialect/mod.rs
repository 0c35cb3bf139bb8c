//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for the two warehouse
//! dialects the compiler targets. Each dialect implements `SqlDialect`:
//!
//! - Identifier quoting: `"` (Hive), `` ` `` (Doris)
//! - Alias syntax: bare alias (Hive) vs `AS alias` (Doris)
//! - JSON extraction: `GET_JSON_OBJECT` (Hive) vs `JSON_EXTRACT_STRING` (Doris)
//! - String literal escaping: doubled quotes (Hive) vs MySQL backslash escapes (Doris)
//! - CAST target type names
//!
//! # Usage
//!
//! ```ignore
//! use bkquery::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Doris;
//! let quoted = dialect.quote_identifier("event");  // `event`
//! ```

mod doris;
pub mod helpers;
mod hive;

pub use doris::Doris;
pub use hive::Hive;

use serde::{Deserialize, Serialize};

use super::token::TokenStream;
use super::types::CastType;

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// The default implementations follow the MySQL-family grammar Doris speaks.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    ///
    /// - Hive: `"identifier"`
    /// - Doris: `` `identifier` ``
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_mysql(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    /// Quote character used inside variant subscripts (`col['key']`).
    fn variant_quote_char(&self) -> char {
        '\''
    }

    // =========================================================================
    // Aliases and Function Calls
    // =========================================================================

    /// Whether `AS` is emitted between an expression and its alias.
    fn emit_as_for_alias(&self) -> bool {
        true
    }

    /// Separator placed between function arguments.
    fn arg_separator(&self) -> &'static str {
        ", "
    }

    /// Function extracting a scalar from a JSON string column by path.
    fn json_extract_function(&self) -> &'static str;

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit LIMIT/OFFSET pagination clause.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// Emit the target type of a CAST for this dialect.
    fn emit_cast_type(&self, ty: CastType) -> &'static str;
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Hive,
    Doris,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Hive => &Hive,
            Dialect::Doris => &Doris,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn variant_quote_char(&self) -> char {
        self.dialect().variant_quote_char()
    }

    fn emit_as_for_alias(&self) -> bool {
        self.dialect().emit_as_for_alias()
    }

    fn arg_separator(&self) -> &'static str {
        self.dialect().arg_separator()
    }

    fn json_extract_function(&self) -> &'static str {
        self.dialect().json_extract_function()
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn emit_cast_type(&self, ty: CastType) -> &'static str {
        self.dialect().emit_cast_type(ty)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
