//! Escaping for values spliced into SQL text.
//!
//! Covers MySQL string escaping, variant subscript keys (`col['a']['b']`),
//! JSON paths for the dialect extraction functions, LIKE patterns and
//! string literals inside queries parsed by sqlparser.

use std::ops::ControlFlow;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use sqlparser::ast::{visit_expressions_mut, Expr as AstExpr, Query as AstQuery, Value as AstValue};
use thiserror::Error;

use super::dialect::{Dialect, SqlDialect};

/// Errors raised while sanitizing user-supplied keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscapeError {
    #[error("variant key must be a string, got {0}")]
    NotAString(String),

    #[error("variant key must not be empty")]
    EmptyKey,
}

pub type EscapeResult<T> = Result<T, EscapeError>;

/// Escape character used with `LIKE ... ESCAPE`.
pub const LIKE_ESCAPE_CHAR: char = '\\';

static SIMPLE_PATH_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// Escape a string for the inside of a MySQL single-quoted literal.
///
/// NUL, newline, carriage return, Ctrl-Z, backslash and both quote
/// characters are backslash-escaped.
pub fn escape_mysql_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

/// Sanitize one variant subscript key.
pub fn sanitize_key(raw: &str) -> EscapeResult<String> {
    if raw.is_empty() {
        return Err(EscapeError::EmptyKey);
    }
    Ok(escape_mysql_string(raw))
}

/// Sanitize a key arriving as a JSON value; only strings are accepted.
pub fn sanitize_json_key(raw: &Value) -> EscapeResult<String> {
    match raw {
        Value::String(s) => sanitize_key(s),
        other => Err(EscapeError::NotAString(json_type_name(other).to_string())),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a chain of variant subscripts: `['k1']['k2']`.
pub fn format_keys_quote<S: AsRef<str>>(keys: &[S], dialect: Dialect) -> EscapeResult<String> {
    let quote = dialect.variant_quote_char();
    let mut out = String::new();
    for key in keys {
        let key = sanitize_key(key.as_ref())?;
        out.push('[');
        out.push(quote);
        out.push_str(&key);
        out.push(quote);
        out.push(']');
    }
    Ok(out)
}

/// Build the bracketed JSON path used for nested field access.
///
/// `["address", "city"]` becomes `$.["address"].["city"]`.
pub fn json_path<S: AsRef<str>>(keys: &[S]) -> String {
    let mut path = String::from("$");
    for key in keys {
        path.push_str(".[\"");
        path.push_str(&escape_json_path_key(key.as_ref()));
        path.push_str("\"]");
    }
    path
}

/// Turn a dotted field path (`a.b.c`) into a JSON path (`$.a.b.c`).
///
/// Segments that are not plain identifiers are double-quoted.
pub fn dotted_json_path(path: &str) -> String {
    let mut out = String::from("$");
    if path.is_empty() {
        return out;
    }
    for segment in path.split('.') {
        out.push('.');
        if SIMPLE_PATH_SEGMENT.is_match(segment) {
            out.push_str(segment);
        } else {
            out.push('"');
            out.push_str(&escape_json_path_key(segment));
            out.push('"');
        }
    }
    out
}

fn escape_json_path_key(key: &str) -> String {
    key.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Escape LIKE wildcards so the value matches literally.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == LIKE_ESCAPE_CHAR || c == '%' || c == '_' {
            out.push(LIKE_ESCAPE_CHAR);
        }
        out.push(c);
    }
    out
}

/// Render a parsed query with every string literal quoted for `dialect`.
///
/// sqlparser keeps literals unescaped in the AST and only doubles quotes on
/// display, which leaves a trailing backslash free to swallow the closing
/// quote under MySQL rules. Literals are requoted here and emitted verbatim.
pub fn render_parsed_query(query: &AstQuery, dialect: Dialect) -> String {
    let mut query = query.clone();
    let _ = visit_expressions_mut(&mut query, |expr| {
        if let AstExpr::Value(value) = expr {
            let quoted = match value {
                AstValue::SingleQuotedString(s)
                | AstValue::DoubleQuotedString(s)
                | AstValue::NationalStringLiteral(s) => Some(dialect.quote_string(s)),
                _ => None,
            };
            if let Some(quoted) = quoted {
                *value = AstValue::Placeholder(quoted);
            }
        }
        ControlFlow::<()>::Continue(())
    });
    query.to_string()
}
