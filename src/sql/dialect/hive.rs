//! Hive SQL dialect.
//!
//! The dialect the declarative generator emits by default:
//! - Double-quoted identifiers (`"name"`)
//! - Aliases follow the expression directly, no `AS`
//! - `GET_JSON_OBJECT(col,'$.path')` for JSON extraction
//! - Function arguments joined by a bare comma
//! - `STRING`, `LONG` and friends as CAST targets

use super::helpers;
use super::SqlDialect;
use crate::sql::types::CastType;

/// Hive SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Hive;

impl SqlDialect for Hive {
    fn name(&self) -> &'static str {
        "hive"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    fn emit_as_for_alias(&self) -> bool {
        false
    }

    fn arg_separator(&self) -> &'static str {
        ","
    }

    fn json_extract_function(&self) -> &'static str {
        "GET_JSON_OBJECT"
    }

    fn emit_cast_type(&self, ty: CastType) -> &'static str {
        match ty {
            CastType::String => "STRING",
            CastType::Int => "INT",
            CastType::Long => "LONG",
            CastType::Float => "FLOAT",
            CastType::Double => "DOUBLE",
            CastType::Boolean => "BOOLEAN",
            CastType::Char => "STRING",
        }
    }
}
