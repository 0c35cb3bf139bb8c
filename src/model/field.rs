//! Selectable fields, their value types and aggregates.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::error::ModelError;
use crate::sql::expr::{count, count_distinct, group_concat, Expr};
use crate::sql::{avg, max, min, sum, CastType};

/// Value type of a field; drives the CAST applied to JSON extractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum FieldType {
    #[default]
    String,
    Text,
    Int,
    Long,
    Float,
    Double,
    Timestamp,
    Boolean,
}

impl FieldType {
    /// Fixed field-type to CAST-target table.
    pub fn cast_type(self) -> CastType {
        match self {
            FieldType::String | FieldType::Text => CastType::String,
            FieldType::Int => CastType::Int,
            FieldType::Long | FieldType::Timestamp => CastType::Long,
            FieldType::Float => CastType::Float,
            FieldType::Double => CastType::Double,
            FieldType::Boolean => CastType::Boolean,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Timestamp => "timestamp",
            FieldType::Boolean => "boolean",
        }
    }
}

impl FromStr for FieldType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(FieldType::String),
            "text" => Ok(FieldType::Text),
            "int" => Ok(FieldType::Int),
            "long" => Ok(FieldType::Long),
            "float" => Ok(FieldType::Float),
            "double" => Ok(FieldType::Double),
            "timestamp" => Ok(FieldType::Timestamp),
            "boolean" => Ok(FieldType::Boolean),
            _ => Err(ModelError::InvalidFieldType(s.to_string())),
        }
    }
}

impl TryFrom<String> for FieldType {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate wrapping a selected field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum AggregateType {
    Count,
    CountDistinct,
    Sum,
    Max,
    Min,
    Avg,
    GroupConcat,
    GroupConcatDistinct,
}

impl AggregateType {
    /// Wrap `expr` in this aggregate.
    pub fn apply(self, expr: Expr) -> Expr {
        match self {
            AggregateType::Count => count(expr),
            AggregateType::CountDistinct => count_distinct(expr),
            AggregateType::Sum => sum(expr),
            AggregateType::Max => max(expr),
            AggregateType::Min => min(expr),
            AggregateType::Avg => avg(expr),
            AggregateType::GroupConcat => group_concat(expr, false),
            AggregateType::GroupConcatDistinct => group_concat(expr, true),
        }
    }
}

impl FromStr for AggregateType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COUNT" => Ok(AggregateType::Count),
            "COUNT_DISTINCT" => Ok(AggregateType::CountDistinct),
            "SUM" => Ok(AggregateType::Sum),
            "MAX" => Ok(AggregateType::Max),
            "MIN" => Ok(AggregateType::Min),
            "AVG" => Ok(AggregateType::Avg),
            "GROUP_CONCAT" => Ok(AggregateType::GroupConcat),
            "GROUP_CONCAT_DISTINCT" => Ok(AggregateType::GroupConcatDistinct),
            _ => Err(ModelError::InvalidAggregate(s.to_string())),
        }
    }
}

impl TryFrom<String> for AggregateType {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A column of a registered table, optionally aggregated or JSON-extracted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Field {
    /// Alias of the table this field belongs to.
    pub table: String,
    pub raw_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub aggregate: Option<AggregateType>,
    /// JSON path segments below `raw_name`.
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub is_json: bool,
}

impl Field {
    pub fn new(table: &str, raw_name: &str, field_type: FieldType) -> Self {
        Self {
            table: table.into(),
            raw_name: raw_name.into(),
            display_name: raw_name.into(),
            field_type,
            aggregate: None,
            keys: vec![],
            is_json: false,
        }
    }

    pub fn with_display_name(mut self, display_name: &str) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_aggregate(mut self, aggregate: AggregateType) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    pub fn with_keys<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.keys = keys.into_iter().map(Into::into).collect();
        self.is_json = true;
        self
    }

    /// Name used for the select-list alias.
    pub fn alias(&self) -> &str {
        if self.display_name.is_empty() {
            &self.raw_name
        } else {
            &self.display_name
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.aggregate.is_some()
    }

    pub fn uses_json(&self) -> bool {
        self.is_json || !self.keys.is_empty()
    }
}
