//! Doris SQL dialect.
//!
//! Doris speaks the MySQL wire grammar:
//! - Backtick identifier quoting (`` `name` ``)
//! - `AS alias`
//! - `JSON_EXTRACT_STRING(col, '$.path')` for JSON extraction
//! - Backslash escapes inside string literals
//! - LIMIT ... OFFSET ... for pagination

use super::helpers;
use super::SqlDialect;
use crate::sql::types::CastType;

/// Doris SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Doris;

impl SqlDialect for Doris {
    fn name(&self) -> &'static str {
        "doris"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    // Uses default quote_string (MySQL escaping) and emit_limit_offset

    fn json_extract_function(&self) -> &'static str {
        "JSON_EXTRACT_STRING"
    }

    fn emit_cast_type(&self, ty: CastType) -> &'static str {
        match ty {
            CastType::String => "STRING",
            CastType::Int => "INT",
            CastType::Long => "BIGINT",
            CastType::Float => "FLOAT",
            CastType::Double => "DOUBLE",
            CastType::Boolean => "BOOLEAN",
            CastType::Char => "CHAR",
        }
    }
}
