//! Table and expression rewriting on parsed queries.
//!
//! Operates directly on `sqlparser` ASTs produced by [`crate::bridge`]:
//!
//! - [`transform_table`] swaps logical table names for physical warehouse
//!   identifiers, keeping the logical name reachable as the alias.
//! - [`push_partition_predicate`] adds a partition range to the innermost scan.
//! - [`strip_ordering`] drops ORDER BY / LIMIT / OFFSET before the query is
//!   wrapped as a subquery.

use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;

use sqlparser::ast::{
    visit_relations, BinaryOperator, Expr as AstExpr, Ident, ObjectName, Query, Select, SetExpr,
    TableAlias, TableFactor, TableWithJoins, Value, VisitMut, VisitorMut,
};
use thiserror::Error;
use tracing::debug;

use crate::model::TimeWindow;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RewriteError {
    #[error("invalid physical table name '{0}'")]
    InvalidTableName(String),

    #[error("query has no table scan to attach a partition predicate to")]
    NoTableScan,
}

pub type RewriteResult<T> = Result<T, RewriteError>;

// ============================================================================
// Physical names
// ============================================================================

/// A physical table identifier split into `catalog.db.table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalTableName {
    pub catalog: Option<String>,
    pub db: Option<String>,
    pub table: String,
}

impl PhysicalTableName {
    /// Split a dotted physical name.
    ///
    /// A trailing storage suffix (`orders.doris`) stays attached to the table
    /// segment; anything beyond three parts folds into the catalog.
    pub fn parse(name: &str, storage_suffixes: &[String]) -> RewriteResult<Self> {
        let mut parts: Vec<String> = name.split('.').map(str::to_string).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(RewriteError::InvalidTableName(name.to_string()));
        }

        if parts.len() >= 2 {
            let last = &parts[parts.len() - 1];
            if storage_suffixes.iter().any(|s| s.eq_ignore_ascii_case(last)) {
                let suffix = parts.pop().unwrap_or_default();
                if let Some(table) = parts.last_mut() {
                    table.push('.');
                    table.push_str(&suffix);
                }
            }
        }

        let table = parts
            .pop()
            .ok_or_else(|| RewriteError::InvalidTableName(name.to_string()))?;
        let db = parts.pop();
        let catalog = if parts.is_empty() {
            None
        } else {
            Some(parts.join("."))
        };

        Ok(Self { catalog, db, table })
    }

    pub fn parts(&self) -> Vec<&str> {
        self.catalog
            .iter()
            .chain(self.db.iter())
            .map(String::as_str)
            .chain(std::iter::once(self.table.as_str()))
            .collect()
    }

    pub fn to_object_name(&self) -> ObjectName {
        ObjectName(self.parts().into_iter().map(Ident::new).collect())
    }
}

impl fmt::Display for PhysicalTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts().join("."))
    }
}

/// Dotted key of an object name, quote styles dropped.
pub fn object_name_key(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

/// Every table referenced by the query, first occurrence order, no duplicates.
pub fn collect_table_names(query: &Query) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let _ = visit_relations(query, |relation| {
        let key = object_name_key(relation);
        if !names.contains(&key) {
            names.push(key);
        }
        ControlFlow::<()>::Continue(())
    });
    names
}

// ============================================================================
// Table substitution
// ============================================================================

struct TableRenamer<'a> {
    name_map: &'a HashMap<String, String>,
    storage_suffixes: &'a [String],
}

impl VisitorMut for TableRenamer<'_> {
    type Break = RewriteError;

    fn pre_visit_table_factor(&mut self, factor: &mut TableFactor) -> ControlFlow<Self::Break> {
        let TableFactor::Table { name, alias, .. } = factor else {
            return ControlFlow::Continue(());
        };
        let Some(physical) = self.name_map.get(&object_name_key(name)) else {
            return ControlFlow::Continue(());
        };

        let target = match PhysicalTableName::parse(physical, self.storage_suffixes) {
            Ok(target) => target,
            Err(err) => return ControlFlow::Break(err),
        };

        if alias.is_none() {
            if let Some(logical) = name.0.last() {
                *alias = Some(TableAlias {
                    name: logical.clone(),
                    columns: vec![],
                });
            }
        }
        debug!(from = %name, to = %target, "rewrote table reference");
        *name = target.to_object_name();
        ControlFlow::Continue(())
    }
}

/// Replace logical table names with physical ones.
///
/// Unaliased references get their logical name as alias, so predicates and
/// joins still written against the old name keep resolving.
pub fn transform_table(
    mut query: Box<Query>,
    name_map: &HashMap<String, String>,
    storage_suffixes: &[String],
) -> RewriteResult<Box<Query>> {
    let mut renamer = TableRenamer {
        name_map,
        storage_suffixes,
    };
    if let ControlFlow::Break(err) = query.as_mut().visit(&mut renamer) {
        return Err(err);
    }
    Ok(query)
}

// ============================================================================
// Clause edits
// ============================================================================

/// Remove the top-level ORDER BY, LIMIT, OFFSET and FETCH.
pub fn strip_ordering(query: &mut Query) {
    query.order_by = None;
    query.limit = None;
    query.offset = None;
    query.fetch = None;
}

/// Descend through set-expression wrappers and derived tables in the first
/// FROM position until a plain table scan is found.
fn innermost_select(query: &mut Query) -> Option<&mut Select> {
    match query.body.as_mut() {
        SetExpr::Query(inner) => innermost_select(inner),
        SetExpr::Select(select) => {
            let derived = matches!(
                select.from.first().map(|t| &t.relation),
                Some(TableFactor::Derived { .. })
            );
            if !derived {
                return Some(select.as_mut());
            }
            match select.from.first_mut() {
                Some(TableWithJoins {
                    relation: TableFactor::Derived { subquery, .. },
                    ..
                }) => innermost_select(subquery),
                _ => None,
            }
        }
        _ => None,
    }
}

fn scan_qualifier(select: &Select) -> Option<Vec<Ident>> {
    match select.from.first().map(|t| &t.relation) {
        Some(TableFactor::Table { alias: Some(alias), .. }) => Some(vec![alias.name.clone()]),
        Some(TableFactor::Table { name, .. }) => Some(name.0.clone()),
        _ => None,
    }
}

fn binary(left: AstExpr, op: BinaryOperator, right: AstExpr) -> AstExpr {
    AstExpr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// AND `<scan>.<column> >= 'start' AND <scan>.<column> <= 'end'` onto the
/// innermost table scan's WHERE.
pub fn push_partition_predicate(
    query: &mut Query,
    column: &str,
    window: &TimeWindow,
) -> RewriteResult<()> {
    let select = innermost_select(query).ok_or(RewriteError::NoTableScan)?;
    let mut qualified = scan_qualifier(select).ok_or(RewriteError::NoTableScan)?;
    qualified.push(Ident::new(column));

    let (start, end) = window.partition_bounds();
    let column = AstExpr::CompoundIdentifier(qualified);
    let predicate = binary(
        binary(
            column.clone(),
            BinaryOperator::GtEq,
            AstExpr::Value(Value::SingleQuotedString(start)),
        ),
        BinaryOperator::And,
        binary(
            column,
            BinaryOperator::LtEq,
            AstExpr::Value(Value::SingleQuotedString(end)),
        ),
    );

    select.selection = Some(match select.selection.take() {
        Some(existing) => binary(
            AstExpr::Nested(Box::new(existing)),
            BinaryOperator::And,
            predicate,
        ),
        None => predicate,
    });
    Ok(())
}
