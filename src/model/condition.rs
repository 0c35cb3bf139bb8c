//! Filter conditions and the recursive WHERE / HAVING tree.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::error::{ModelError, ModelResult};
use super::field::Field;
use crate::sql::expr::{lit_bool, lit_float, lit_int, lit_null, lit_str, Expr};

/// Comparison operator of a leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    /// IN (...)
    Include,
    /// NOT IN (...)
    Exclude,
    Between,
    IsNull,
    NotNull,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Like => "like",
            Operator::NotLike => "not_like",
            Operator::Include => "include",
            Operator::Exclude => "exclude",
            Operator::Between => "between",
            Operator::IsNull => "isnull",
            Operator::NotNull => "notnull",
        }
    }
}

impl FromStr for Operator {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eq" => Ok(Operator::Eq),
            "neq" => Ok(Operator::Neq),
            "gt" => Ok(Operator::Gt),
            "gte" => Ok(Operator::Gte),
            "lt" => Ok(Operator::Lt),
            "lte" => Ok(Operator::Lte),
            "like" => Ok(Operator::Like),
            "not_like" => Ok(Operator::NotLike),
            "include" => Ok(Operator::Include),
            "exclude" => Ok(Operator::Exclude),
            "between" => Ok(Operator::Between),
            "isnull" => Ok(Operator::IsNull),
            "notnull" => Ok(Operator::NotNull),
            _ => Err(ModelError::InvalidOperator(s.to_string())),
        }
    }
}

impl TryFrom<String> for Operator {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar filter value as it arrives from JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl FilterValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Null)
    }

    /// Render as a SQL literal: strings quoted, numbers bare.
    pub fn to_expr(&self) -> Expr {
        match self {
            FilterValue::Null => lit_null(),
            FilterValue::Bool(b) => lit_bool(*b),
            FilterValue::Int(n) => lit_int(*n),
            FilterValue::Float(f) => lit_float(*f),
            FilterValue::String(s) => lit_str(s),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::String(value.into())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::String(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

/// A single `field <op> value` comparison.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawCondition")]
pub struct Condition {
    pub field: Field,
    pub operator: Operator,
    /// Scalar operand; `None` stands for SQL NULL.
    pub filter: Option<FilterValue>,
    /// List operand for IN / NOT IN / BETWEEN.
    pub filters: Vec<FilterValue>,
}

#[derive(Deserialize)]
struct RawCondition {
    field: Field,
    operator: Operator,
    #[serde(default)]
    filter: Option<FilterValue>,
    #[serde(default)]
    filters: Vec<FilterValue>,
}

impl TryFrom<RawCondition> for Condition {
    type Error = ModelError;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        Condition {
            field: raw.field,
            operator: raw.operator,
            filter: raw.filter,
            filters: raw.filters,
        }
        .validated()
    }
}

impl Condition {
    /// Condition with a scalar operand.
    pub fn new(field: Field, operator: Operator, filter: impl Into<FilterValue>) -> ModelResult<Self> {
        Condition {
            field,
            operator,
            filter: Some(filter.into()),
            filters: vec![],
        }
        .validated()
    }

    /// Condition with a list operand (include / exclude / between).
    pub fn with_filters(field: Field, operator: Operator, filters: Vec<FilterValue>) -> ModelResult<Self> {
        Condition {
            field,
            operator,
            filter: None,
            filters,
        }
        .validated()
    }

    /// Condition without an operand (isnull / notnull, or eq / neq against NULL).
    pub fn unary(field: Field, operator: Operator) -> ModelResult<Self> {
        Condition {
            field,
            operator,
            filter: None,
            filters: vec![],
        }
        .validated()
    }

    /// Scalar operand, treating an explicit JSON null like an absent one.
    pub fn scalar(&self) -> Option<&FilterValue> {
        self.filter.as_ref().filter(|v| !v.is_null())
    }

    fn validated(self) -> ModelResult<Self> {
        let operands = self.filter.iter().chain(&self.filters);
        for value in operands {
            if let FilterValue::Float(f) = value {
                if !f.is_finite() {
                    return Err(ModelError::NonFiniteFilter {
                        field: self.field.raw_name.clone(),
                        value: *f,
                    });
                }
            }
        }

        match self.operator {
            Operator::Gt
            | Operator::Gte
            | Operator::Lt
            | Operator::Lte
            | Operator::Like
            | Operator::NotLike => {
                if self.scalar().is_none() {
                    return Err(ModelError::MissingFilter {
                        operator: self.operator,
                        field: self.field.raw_name.clone(),
                    });
                }
            }
            Operator::Between => {
                if self.filters.len() != 2 {
                    return Err(ModelError::FilterArity {
                        operator: self.operator,
                        field: self.field.raw_name.clone(),
                        expected: 2,
                        actual: self.filters.len(),
                    });
                }
            }
            Operator::Eq
            | Operator::Neq
            | Operator::Include
            | Operator::Exclude
            | Operator::IsNull
            | Operator::NotNull => {}
        }
        Ok(self)
    }
}

/// Boolean connector of a condition group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl FromStr for Connector {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Ok(Connector::And),
            "OR" => Ok(Connector::Or),
            _ => Err(ModelError::InvalidConnector(s.to_string())),
        }
    }
}

impl TryFrom<String> for Connector {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Recursive boolean filter tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawWhereCondition")]
pub enum WhereCondition {
    Leaf(Condition),
    Group {
        connector: Connector,
        conditions: Vec<WhereCondition>,
    },
}

/// HAVING uses the same tree shape as WHERE.
pub type HavingCondition = WhereCondition;

#[derive(Deserialize)]
struct RawWhereCondition {
    #[serde(default)]
    connector: Option<Connector>,
    #[serde(default)]
    conditions: Option<Vec<WhereCondition>>,
    #[serde(default)]
    condition: Option<Condition>,
}

impl TryFrom<RawWhereCondition> for WhereCondition {
    type Error = ModelError;

    fn try_from(raw: RawWhereCondition) -> Result<Self, Self::Error> {
        match (raw.condition, raw.conditions) {
            (Some(_), Some(_)) => Err(ModelError::MixedConditionNode),
            (None, None) => Err(ModelError::EmptyConditionNode),
            (Some(condition), None) => Ok(WhereCondition::Leaf(condition)),
            (None, Some(conditions)) => {
                WhereCondition::group(raw.connector.unwrap_or_default(), conditions)
            }
        }
    }
}

impl WhereCondition {
    pub fn leaf(condition: Condition) -> Self {
        WhereCondition::Leaf(condition)
    }

    pub fn group(connector: Connector, conditions: Vec<WhereCondition>) -> ModelResult<Self> {
        if conditions.is_empty() {
            return Err(ModelError::EmptyConditionGroup);
        }
        Ok(WhereCondition::Group {
            connector,
            conditions,
        })
    }

    pub fn and(conditions: Vec<WhereCondition>) -> ModelResult<Self> {
        Self::group(Connector::And, conditions)
    }

    pub fn or(conditions: Vec<WhereCondition>) -> ModelResult<Self> {
        Self::group(Connector::Or, conditions)
    }

    /// Connector that actually joins this node's SQL, if any.
    ///
    /// Single-child groups collapse to their child.
    pub fn effective_connector(&self) -> Option<Connector> {
        match self {
            WhereCondition::Leaf(_) => None,
            WhereCondition::Group {
                connector,
                conditions,
            } => match conditions.as_slice() {
                [only] => only.effective_connector(),
                _ => Some(*connector),
            },
        }
    }

    /// Every field referenced anywhere in the tree.
    pub fn fields(&self) -> Vec<&Field> {
        match self {
            WhereCondition::Leaf(condition) => vec![&condition.field],
            WhereCondition::Group { conditions, .. } => {
                conditions.iter().flat_map(WhereCondition::fields).collect()
            }
        }
    }
}
