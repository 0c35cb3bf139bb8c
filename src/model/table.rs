//! Tables and joins.

use std::str::FromStr;

use serde::Deserialize;

use super::error::{ModelError, ModelResult};
use super::field::Field;
use crate::sql::JoinType as SqlJoinType;

/// A table referenced by a query config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Table {
    pub table_name: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl Table {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Reference key used by fields and joins; defaults to the table name.
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table_name)
    }
}

/// Join flavours the generator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum JoinType {
    Inner,
    Left,
}

impl FromStr for JoinType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INNER" => Ok(JoinType::Inner),
            "LEFT" => Ok(JoinType::Left),
            _ => Err(ModelError::InvalidJoinType(s.to_string())),
        }
    }
}

impl TryFrom<String> for JoinType {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JoinType> for SqlJoinType {
    fn from(value: JoinType) -> Self {
        match value {
            JoinType::Inner => SqlJoinType::Inner,
            JoinType::Left => SqlJoinType::Left,
        }
    }
}

/// One equality of a join's ON clause.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinkField {
    pub left_field: Field,
    pub right_field: Field,
}

/// A join between an already registered table and `right_table`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawJoinTable")]
pub struct JoinTable {
    pub join_type: JoinType,
    pub link_fields: Vec<LinkField>,
    pub left_table: Table,
    pub right_table: Table,
}

#[derive(Deserialize)]
struct RawJoinTable {
    join_type: JoinType,
    link_fields: Vec<LinkField>,
    left_table: Table,
    right_table: Table,
}

impl TryFrom<RawJoinTable> for JoinTable {
    type Error = ModelError;

    fn try_from(raw: RawJoinTable) -> Result<Self, Self::Error> {
        JoinTable::new(raw.join_type, raw.left_table, raw.right_table, raw.link_fields)
    }
}

impl JoinTable {
    /// Build a join; at least one link field is required.
    pub fn new(
        join_type: JoinType,
        left_table: Table,
        right_table: Table,
        link_fields: Vec<LinkField>,
    ) -> ModelResult<Self> {
        if link_fields.is_empty() {
            return Err(ModelError::EmptyLinkFields {
                right_table: right_table.table_name,
            });
        }
        Ok(Self {
            join_type,
            link_fields,
            left_table,
            right_table,
        })
    }
}
