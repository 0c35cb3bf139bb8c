//! `SqlConfig`: the aggregate root handed to the generator.

use std::str::FromStr;

use serde::Deserialize;

use super::condition::{HavingCondition, WhereCondition};
use super::error::{ModelError, ModelResult};
use super::field::Field;
use super::table::{JoinTable, Table};
use crate::sql::SortDir;

/// Sort direction of an ORDER BY entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortOrder::Asc),
            "DESC" => Ok(SortOrder::Desc),
            _ => Err(ModelError::InvalidSortOrder(s.to_string())),
        }
    }
}

impl TryFrom<String> for SortOrder {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SortOrder> for SortDir {
    fn from(value: SortOrder) -> Self {
        match value {
            SortOrder::Asc => SortDir::Asc,
            SortOrder::Desc => SortDir::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Order {
    pub field: Field,
    #[serde(default)]
    pub order: SortOrder,
}

impl Order {
    pub fn asc(field: Field) -> Self {
        Self {
            field,
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: Field) -> Self {
        Self {
            field,
            order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

/// Declarative description of one SELECT statement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SqlConfig {
    pub select_fields: Vec<Field>,
    pub from_table: Table,
    #[serde(default)]
    pub join_tables: Vec<JoinTable>,
    #[serde(default, rename = "where")]
    pub where_condition: Option<WhereCondition>,
    #[serde(default)]
    pub having: Option<HavingCondition>,
    /// Explicit grouping; inferred from the select list when absent.
    #[serde(default)]
    pub group_by: Option<Vec<Field>>,
    #[serde(default)]
    pub order_by: Vec<Order>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl SqlConfig {
    pub fn new(from_table: Table) -> Self {
        Self {
            select_fields: vec![],
            from_table,
            join_tables: vec![],
            where_condition: None,
            having: None,
            group_by: None,
            order_by: vec![],
            pagination: None,
        }
    }

    /// Parse a JSON document; enum and tree validation happens here.
    pub fn from_json(json: &str) -> ModelResult<Self> {
        serde_json::from_str(json).map_err(|e| ModelError::Parse(e.to_string()))
    }

    pub fn select(mut self, field: Field) -> Self {
        self.select_fields.push(field);
        self
    }

    pub fn join(mut self, join: JoinTable) -> Self {
        self.join_tables.push(join);
        self
    }

    pub fn filter(mut self, condition: WhereCondition) -> Self {
        self.where_condition = Some(condition);
        self
    }

    pub fn having(mut self, condition: HavingCondition) -> Self {
        self.having = Some(condition);
        self
    }

    pub fn group_by(mut self, fields: Vec<Field>) -> Self {
        self.group_by = Some(fields);
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn paginate(mut self, limit: u64, offset: u64) -> Self {
        self.pagination = Some(Pagination { limit, offset });
        self
    }

    pub fn has_aggregate(&self) -> bool {
        self.select_fields.iter().any(Field::is_aggregate)
    }
}
