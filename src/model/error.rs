//! Validation errors for the query data model.

use thiserror::Error;

use super::condition::Operator;

/// Result type for model construction.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building or deserializing a query description.
///
/// All of these fire before any SQL text is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("invalid field type: {0}")]
    InvalidFieldType(String),

    #[error("invalid aggregate: {0}")]
    InvalidAggregate(String),

    #[error("invalid operator: {0}")]
    InvalidOperator(String),

    #[error("invalid join type: {0}")]
    InvalidJoinType(String),

    #[error("invalid connector: {0}")]
    InvalidConnector(String),

    #[error("invalid sort order: {0}")]
    InvalidSortOrder(String),

    /// A condition node carried both a leaf condition and child conditions.
    #[error("condition node has both a condition and child conditions")]
    MixedConditionNode,

    /// A condition node carried neither a leaf nor children.
    #[error("condition node has neither a condition nor child conditions")]
    EmptyConditionNode,

    #[error("condition group has no conditions")]
    EmptyConditionGroup,

    #[error("join on table '{right_table}' has no link fields")]
    EmptyLinkFields { right_table: String },

    #[error("operator '{operator}' on field '{field}' requires a non-null filter value")]
    MissingFilter { operator: Operator, field: String },

    #[error("operator '{operator}' on field '{field}' expects {expected} filter values, got {actual}")]
    FilterArity {
        operator: Operator,
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("filter value for field '{field}' must be a finite number, got {value}")]
    NonFiniteFilter { field: String, value: f64 },

    #[error("time window ends ({end}) before it starts ({start})")]
    InvalidWindow { start: String, end: String },

    #[error("failed to parse query config: {0}")]
    Parse(String),
}
