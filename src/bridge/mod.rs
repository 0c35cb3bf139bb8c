//! ORM-SQL → AST bridge.
//!
//! An ORM hands over parameterized SQL (`%s` placeholders) plus positional
//! values. The bridge splices the values in as literals and parses the
//! result with an ordered list of parser grammars.
//!
//! ```text
//! (sql, params) → literal substitution → MySQL grammar ─┬─ ok → AST
//!                                                       └─ err → Hive grammar → AST | error
//! ```

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use regex::Regex;
use serde::Deserialize;
use sqlparser::ast::{Query, Statement};
use sqlparser::dialect::{HiveDialect, MySqlDialect};
use sqlparser::parser::{Parser, ParserError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::sql::escape::escape_mysql_string;

// ============================================================================
// Error Types
// ============================================================================

/// Errors from literal substitution and parsing.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("sql has {placeholders} placeholders but {params} parameters were supplied")]
    PlaceholderMismatch { placeholders: usize, params: usize },

    /// Every grammar in the fallback chain rejected the SQL; carries the last failure.
    #[error("failed to parse sql with {dialect} grammar: {message}")]
    Parse {
        dialect: &'static str,
        message: String,
    },

    #[error("expected a single SELECT statement, found {0}")]
    NotASelect(String),

    #[error("expected exactly one statement, found {0}")]
    StatementCount(usize),

    #[error("sql text is empty")]
    EmptySql,

    #[error("cannot render non-finite float parameter {0}")]
    NonFiniteFloat(f64),

    #[error("invalid decimal parameter '{0}'")]
    InvalidDecimal(String),

    #[error("invalid UTC offset of {0} minutes")]
    InvalidOffset(i32),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

// ============================================================================
// Parameters
// ============================================================================

/// A positional parameter value produced by the ORM.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Exact decimal text (`"12.50"`); rendered unquoted.
    #[serde(skip)]
    Decimal(String),
    #[serde(skip)]
    Date(NaiveDate),
    /// Timezone-aware datetime, localized before rendering.
    #[serde(skip)]
    DateTime(DateTime<FixedOffset>),
    /// Naive datetime, taken as already local.
    #[serde(skip)]
    NaiveDateTime(NaiveDateTime),
}

/// Anything that can produce parameterized SQL, like a compiled ORM queryset.
pub trait OrmQuery {
    fn sql_with_params(&self) -> (String, Vec<SqlParam>);
}

/// Plain `(sql, params)` pair.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompiledQuery {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<SqlParam>,
}

impl CompiledQuery {
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl OrmQuery for CompiledQuery {
    fn sql_with_params(&self) -> (String, Vec<SqlParam>) {
        (self.sql.clone(), self.params.clone())
    }
}

// ============================================================================
// Literal Rendering
// ============================================================================

/// Default offset used to localize aware datetimes (UTC+8).
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 480;

/// Datetime literal format.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static DECIMAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("valid regex"));

/// Renders parameters as MySQL-compatible SQL literals.
#[derive(Debug, Clone, Copy)]
pub struct LiteralRenderer {
    offset: FixedOffset,
}

impl Default for LiteralRenderer {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60)
                .unwrap_or_else(|| Utc.fix()),
        }
    }
}

impl LiteralRenderer {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn from_offset_minutes(minutes: i32) -> BridgeResult<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::new)
            .ok_or(BridgeError::InvalidOffset(minutes))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Render one parameter.
    ///
    /// Numbers are bare, booleans become the strings `'true'`/`'false'`,
    /// datetimes are localized and quoted, everything else is a quoted string.
    pub fn render(&self, param: &SqlParam) -> BridgeResult<String> {
        match param {
            SqlParam::Null => Ok("NULL".into()),
            SqlParam::Bool(b) => Ok(if *b { "'true'" } else { "'false'" }.into()),
            SqlParam::Int(n) => Ok(n.to_string()),
            SqlParam::Float(f) => {
                if !f.is_finite() {
                    return Err(BridgeError::NonFiniteFloat(*f));
                }
                let mut buffer = ryu::Buffer::new();
                Ok(buffer.format(*f).to_string())
            }
            SqlParam::Decimal(text) => {
                if DECIMAL_PATTERN.is_match(text) {
                    Ok(text.clone())
                } else {
                    Err(BridgeError::InvalidDecimal(text.clone()))
                }
            }
            SqlParam::Str(s) => Ok(quote(s)),
            SqlParam::Date(d) => Ok(quote(&d.format("%Y-%m-%d").to_string())),
            SqlParam::DateTime(dt) => Ok(quote(
                &dt.with_timezone(&self.offset)
                    .format(DATETIME_FORMAT)
                    .to_string(),
            )),
            SqlParam::NaiveDateTime(dt) => Ok(quote(&dt.format(DATETIME_FORMAT).to_string())),
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", escape_mysql_string(s))
}

/// Replace each `%s` with the next rendered parameter; `%%` is a literal `%`.
pub fn substitute_placeholders(
    sql: &str,
    params: &[SqlParam],
    renderer: &LiteralRenderer,
) -> BridgeResult<String> {
    let placeholders = count_placeholders(sql);
    if placeholders != params.len() {
        return Err(BridgeError::PlaceholderMismatch {
            placeholders,
            params: params.len(),
        });
    }

    let mut out = String::with_capacity(sql.len());
    let mut values = params.iter();
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                if let Some(param) = values.next() {
                    out.push_str(&renderer.render(param)?);
                }
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }
    Ok(out)
}

fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.peek() {
                Some('s') => {
                    count += 1;
                    chars.next();
                }
                Some('%') => {
                    chars.next();
                }
                _ => {}
            }
        }
    }
    count
}

/// Produce self-contained SQL text from an ORM query.
pub fn compile_queryset_sql(query: &impl OrmQuery, renderer: &LiteralRenderer) -> BridgeResult<String> {
    let (sql, params) = query.sql_with_params();
    let sql = substitute_placeholders(&sql, &params, renderer)?;
    debug!(sql = %sql, "compiled orm sql");
    Ok(sql)
}

// ============================================================================
// Parsing
// ============================================================================

/// One parser grammar in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserStrategy {
    MySql,
    Hive,
}

/// Grammars tried by [`convert_to_expression`], in order.
pub const PARSER_FALLBACK_ORDER: [ParserStrategy; 2] = [ParserStrategy::MySql, ParserStrategy::Hive];

impl ParserStrategy {
    pub fn name(self) -> &'static str {
        match self {
            ParserStrategy::MySql => "mysql",
            ParserStrategy::Hive => "hive",
        }
    }

    fn parse(self, sql: &str) -> Result<Vec<Statement>, ParserError> {
        match self {
            ParserStrategy::MySql => Parser::parse_sql(&MySqlDialect {}, sql),
            ParserStrategy::Hive => Parser::parse_sql(&HiveDialect {}, sql),
        }
    }
}

/// Parse a SELECT with the default fallback chain.
pub fn convert_to_expression(sql: &str) -> BridgeResult<Box<Query>> {
    parse_with_fallback(sql, &PARSER_FALLBACK_ORDER)
}

/// Try each strategy in order; the first successful parse wins.
pub fn parse_with_fallback(sql: &str, strategies: &[ParserStrategy]) -> BridgeResult<Box<Query>> {
    if sql.trim().is_empty() {
        return Err(BridgeError::EmptySql);
    }

    let mut last_failure = None;
    for (i, strategy) in strategies.iter().enumerate() {
        match strategy.parse(sql) {
            Ok(statements) => return single_query(statements),
            Err(err) => {
                if let Some(next) = strategies.get(i + 1) {
                    warn!(
                        failed = strategy.name(),
                        next = next.name(),
                        error = %err,
                        "sql parse failed, retrying with next grammar"
                    );
                }
                last_failure = Some((*strategy, err));
            }
        }
    }

    match last_failure {
        Some((strategy, err)) => Err(BridgeError::Parse {
            dialect: strategy.name(),
            message: err.to_string(),
        }),
        None => Err(BridgeError::EmptySql),
    }
}

fn single_query(mut statements: Vec<Statement>) -> BridgeResult<Box<Query>> {
    if statements.len() != 1 {
        return Err(BridgeError::StatementCount(statements.len()));
    }
    match statements.remove(0) {
        Statement::Query(query) => Ok(query),
        other => {
            let text = other.to_string();
            let keyword = text.split_whitespace().next().unwrap_or_default();
            Err(BridgeError::NotASelect(keyword.to_string()))
        }
    }
}

/// Substitute parameters and parse in one step.
pub fn orm_query_to_ast(query: &impl OrmQuery, renderer: &LiteralRenderer) -> BridgeResult<Box<Query>> {
    let sql = compile_queryset_sql(query, renderer)?;
    convert_to_expression(&sql)
}
