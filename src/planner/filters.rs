//! Event filters: JSON-path predicates over the event payload.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use super::{PlannerError, PlannerResult};
use crate::sql::escape::{dotted_json_path, escape_like, LIKE_ESCAPE_CHAR};
use crate::sql::{
    cast, json_extract, lit_float, lit_int, lit_null, lit_str, CastType, Expr, ExprExt,
};

/// Prefix stripped from filter and order fields addressing the event payload.
pub const EVENT_DATA_PREFIX: &str = "event_data.";

/// Filter as received from the caller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawEventFilter {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

impl RawEventFilter {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilterOperator {
    Eq,
    Ne,
    Contains,
    NotContains,
    In,
    NotIn,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl EventFilterOperator {
    /// Comparisons evaluated on the value cast to a number.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            EventFilterOperator::Gt
                | EventFilterOperator::Gte
                | EventFilterOperator::Lt
                | EventFilterOperator::Lte
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventFilterOperator::Eq => "=",
            EventFilterOperator::Ne => "!=",
            EventFilterOperator::Contains => "contains",
            EventFilterOperator::NotContains => "not contains",
            EventFilterOperator::In => "in",
            EventFilterOperator::NotIn => "not in",
            EventFilterOperator::Gt => ">",
            EventFilterOperator::Gte => ">=",
            EventFilterOperator::Lt => "<",
            EventFilterOperator::Lte => "<=",
        }
    }
}

impl fmt::Display for EventFilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventFilterOperator {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', " ");
        match normalized.as_str() {
            "=" | "==" | "eq" => Ok(EventFilterOperator::Eq),
            "!=" | "<>" | "neq" | "ne" => Ok(EventFilterOperator::Ne),
            "contains" => Ok(EventFilterOperator::Contains),
            "not contains" => Ok(EventFilterOperator::NotContains),
            "in" => Ok(EventFilterOperator::In),
            "not in" => Ok(EventFilterOperator::NotIn),
            ">" | "gt" => Ok(EventFilterOperator::Gt),
            ">=" | "gte" => Ok(EventFilterOperator::Gte),
            "<" | "lt" => Ok(EventFilterOperator::Lt),
            "<=" | "lte" => Ok(EventFilterOperator::Lte),
            _ => Err(PlannerError::UnknownOperator(s.to_string())),
        }
    }
}

/// Strip the payload prefix and build the JSON path for a field.
pub fn event_field_path(field: &str) -> PlannerResult<(String, String)> {
    let normalized = field
        .strip_prefix(EVENT_DATA_PREFIX)
        .unwrap_or(field)
        .trim()
        .to_string();
    if normalized.is_empty() || normalized.split('.').any(str::is_empty) {
        return Err(PlannerError::InvalidFilter {
            field: field.to_string(),
            reason: "empty path segment".into(),
        });
    }
    let path = dotted_json_path(&normalized);
    Ok((normalized, path))
}

/// Validated event filter.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFilterSpec {
    pub raw_field: String,
    pub normalized_field: String,
    pub operator: EventFilterOperator,
    pub value: Value,
    pub json_path: String,
    pub requires_numeric: bool,
}

impl EventFilterSpec {
    pub fn from_raw(raw: &RawEventFilter) -> PlannerResult<Self> {
        let operator: EventFilterOperator = raw.operator.parse()?;
        let (normalized_field, json_path) = event_field_path(&raw.field)?;
        let spec = Self {
            raw_field: raw.field.clone(),
            normalized_field,
            operator,
            value: raw.value.clone(),
            json_path,
            requires_numeric: operator.is_numeric(),
        };
        // Surface bad values now rather than at render time.
        spec.to_expr(lit_null())?;
        Ok(spec)
    }

    /// Render the predicate against a JSON payload column.
    pub fn to_expr(&self, payload: Expr) -> PlannerResult<Expr> {
        let extracted = json_extract(payload, self.json_path.clone());
        match self.operator {
            EventFilterOperator::Eq => Ok(match &self.value {
                Value::Null => extracted.is_null(),
                value => extracted.eq(lit_str(&self.scalar_text(value)?)),
            }),
            EventFilterOperator::Ne => Ok(match &self.value {
                Value::Null => extracted.is_not_null(),
                value => extracted.ne(lit_str(&self.scalar_text(value)?)),
            }),
            EventFilterOperator::Contains | EventFilterOperator::NotContains => {
                if self.value.is_null() {
                    return Err(self.invalid("contains needs a value"));
                }
                let pattern = format!("%{}%", escape_like(&self.scalar_text(&self.value)?));
                Ok(if self.operator == EventFilterOperator::Contains {
                    extracted.like_escape(lit_str(&pattern), LIKE_ESCAPE_CHAR)
                } else {
                    extracted.not_like_escape(lit_str(&pattern), LIKE_ESCAPE_CHAR)
                })
            }
            EventFilterOperator::In | EventFilterOperator::NotIn => {
                let Value::Array(items) = &self.value else {
                    return Err(self.invalid("expected a list"));
                };
                let values = items
                    .iter()
                    .map(|item| self.scalar_text(item).map(|text| lit_str(&text)))
                    .collect::<PlannerResult<Vec<_>>>()?;
                Ok(if self.operator == EventFilterOperator::In {
                    extracted.in_list(values)
                } else {
                    extracted.not_in_list(values)
                })
            }
            EventFilterOperator::Gt
            | EventFilterOperator::Gte
            | EventFilterOperator::Lt
            | EventFilterOperator::Lte => {
                let number = self.numeric_literal()?;
                let lhs = cast(extracted, CastType::Double);
                Ok(match self.operator {
                    EventFilterOperator::Gt => lhs.gt(number),
                    EventFilterOperator::Gte => lhs.gte(number),
                    EventFilterOperator::Lt => lhs.lt(number),
                    _ => lhs.lte(number),
                })
            }
        }
    }

    fn scalar_text(&self, value: &Value) -> PlannerResult<String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Err(self.invalid("null inside a value list")),
            Value::Array(_) | Value::Object(_) => Err(self.invalid("expected a scalar value")),
        }
    }

    fn numeric_literal(&self) -> PlannerResult<Expr> {
        let non_numeric = || PlannerError::NonNumericValue {
            field: self.raw_field.clone(),
            value: self.value.to_string(),
        };
        match &self.value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(lit_int(i)),
                None => n
                    .as_f64()
                    .filter(|f| f.is_finite())
                    .map(lit_float)
                    .ok_or_else(non_numeric),
            },
            Value::String(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Ok(lit_int(i))
                } else {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(lit_float)
                        .ok_or_else(non_numeric)
                }
            }
            _ => Err(non_numeric()),
        }
    }

    fn invalid(&self, reason: &str) -> PlannerError {
        PlannerError::InvalidFilter {
            field: self.raw_field.clone(),
            reason: format!("{} ({})", reason, self.operator),
        }
    }
}
