//! Declarative SQL generation.
//!
//! Compiles a [`SqlConfig`] into one dialect's SQL text:
//!
//! ```text
//! SqlConfig → table registry → Query builder → tokens → SQL
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bkquery::generator::SqlGenerator;
//! use bkquery::model::{Field, FieldType, SqlConfig, Table};
//! use bkquery::sql::Dialect;
//!
//! let config = SqlConfig::new(Table::new("users"))
//!     .select(Field::new("users", "id", FieldType::Int).with_display_name("user_id"));
//!
//! let sql = SqlGenerator::new(Dialect::Hive).generate(&config)?;
//! assert_eq!(sql, r#"SELECT "users"."id" "user_id" FROM "users" "users""#);
//! ```

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::model::{
    Condition, Connector, Field, ModelError, Operator, SqlConfig, Table, WhereCondition,
};
use crate::sql::escape::json_path;
use crate::sql::expr::{cast, conjunction, json_extract, table_col, Expr, ExprExt};
use crate::sql::query::{OrderByExpr, Query, SelectExpr, TableRef};
use crate::sql::Dialect;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during generation.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// A field or join references a table that is neither `from_table` nor a join target.
    #[error("table '{0}' is not registered in from_table or join_tables")]
    TableNotRegistered(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type GenerateResult<T> = Result<T, GenerateError>;

// ============================================================================
// Generator
// ============================================================================

/// Compiles query configs into SQL for one dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlGenerator {
    dialect: Dialect,
}

impl SqlGenerator {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Render `config` as a single-line SQL statement.
    pub fn generate(&self, config: &SqlConfig) -> GenerateResult<String> {
        let query = self.build_query(config)?;
        let sql = query.to_sql(self.dialect);
        debug!(dialect = %self.dialect, sql = %sql, "generated sql");
        Ok(sql)
    }

    /// Build the query AST without rendering it.
    pub fn build_query(&self, config: &SqlConfig) -> GenerateResult<Query> {
        let registry = TableRegistry::from_config(config)?;

        let select = config
            .select_fields
            .iter()
            .map(|field| {
                registry
                    .field_expr(field)
                    .map(|expr| SelectExpr::new(expr).with_alias(field.alias()))
            })
            .collect::<GenerateResult<Vec<_>>>()?;

        let from = &config.from_table;
        let mut query = Query::new()
            .select(select)
            .from(TableRef::new(&from.table_name).with_alias(from.alias()));

        for join in &config.join_tables {
            let on = join
                .link_fields
                .iter()
                .map(|link| -> GenerateResult<Expr> {
                    Ok(registry
                        .column_expr(&link.left_field)?
                        .eq(registry.column_expr(&link.right_field)?))
                })
                .collect::<GenerateResult<Vec<_>>>()?;
            let right = &join.right_table;
            // link_fields is non-empty by construction
            if let Some(on) = conjunction(on) {
                query = query.join(
                    join.join_type.into(),
                    TableRef::new(&right.table_name).with_alias(right.alias()),
                    on,
                );
            }
        }

        if let Some(tree) = &config.where_condition {
            query = query.filter(registry.condition_expr(tree)?);
        }

        let group_by = match &config.group_by {
            Some(fields) => fields
                .iter()
                .map(|f| registry.field_expr(f))
                .collect::<GenerateResult<Vec<_>>>()?,
            None if config.has_aggregate() => config
                .select_fields
                .iter()
                .filter(|f| !f.is_aggregate())
                .map(|f| registry.field_expr(f))
                .collect::<GenerateResult<Vec<_>>>()?,
            None => vec![],
        };
        query = query.group_by(group_by);

        if let Some(tree) = &config.having {
            query = query.having(registry.condition_expr(tree)?);
        }

        let order_by = config
            .order_by
            .iter()
            .map(|order| {
                registry.field_expr(&order.field).map(|expr| OrderByExpr {
                    expr,
                    dir: Some(order.order.into()),
                })
            })
            .collect::<GenerateResult<Vec<_>>>()?;
        query = query.order_by(order_by);

        if let Some(page) = config.pagination {
            query = query.limit(page.limit);
            if page.offset > 0 {
                query = query.offset(page.offset);
            }
        }

        Ok(query)
    }
}

// ============================================================================
// Table Registry
// ============================================================================

/// Tables a config may reference, keyed by alias.
struct TableRegistry<'a> {
    tables: HashMap<&'a str, &'a Table>,
}

impl<'a> TableRegistry<'a> {
    fn from_config(config: &'a SqlConfig) -> GenerateResult<Self> {
        let mut tables = HashMap::new();
        tables.insert(config.from_table.alias(), &config.from_table);
        for join in &config.join_tables {
            tables.insert(join.right_table.alias(), &join.right_table);
        }

        let registry = Self { tables };
        for join in &config.join_tables {
            registry.check(join.left_table.alias())?;
        }
        for tree in config.where_condition.iter().chain(config.having.iter()) {
            for field in tree.fields() {
                registry.check(&field.table)?;
            }
        }
        Ok(registry)
    }

    fn check(&self, table: &str) -> GenerateResult<()> {
        if self.tables.contains_key(table) {
            Ok(())
        } else {
            Err(GenerateError::TableNotRegistered(table.to_string()))
        }
    }

    /// Column reference with JSON extraction, without the aggregate.
    fn column_expr(&self, field: &Field) -> GenerateResult<Expr> {
        self.check(&field.table)?;
        let column = table_col(&field.table, &field.raw_name);
        if field.uses_json() {
            Ok(cast(
                json_extract(column, json_path(&field.keys)),
                field.field_type.cast_type(),
            ))
        } else {
            Ok(column)
        }
    }

    /// Full field expression, aggregate included.
    fn field_expr(&self, field: &Field) -> GenerateResult<Expr> {
        let expr = self.column_expr(field)?;
        Ok(match field.aggregate {
            Some(aggregate) => aggregate.apply(expr),
            None => expr,
        })
    }

    fn condition_expr(&self, node: &WhereCondition) -> GenerateResult<Expr> {
        match node {
            WhereCondition::Leaf(condition) => self.leaf_expr(condition),
            WhereCondition::Group {
                connector,
                conditions,
            } => {
                let mut parts = Vec::with_capacity(conditions.len());
                for child in conditions {
                    let expr = self.condition_expr(child)?;
                    // Parenthesize only where the child's connector differs from ours.
                    let needs_paren = child
                        .effective_connector()
                        .is_some_and(|c| c != *connector);
                    parts.push(if needs_paren { expr.paren() } else { expr });
                }
                parts
                    .into_iter()
                    .reduce(|acc, e| match connector {
                        Connector::And => acc.and(e),
                        Connector::Or => acc.or(e),
                    })
                    .ok_or(GenerateError::Model(ModelError::EmptyConditionGroup))
            }
        }
    }

    fn leaf_expr(&self, condition: &Condition) -> GenerateResult<Expr> {
        let lhs = self.field_expr(&condition.field)?;
        let scalar = condition.scalar().map(|v| v.to_expr());
        let list = || condition.filters.iter().map(|v| v.to_expr()).collect::<Vec<_>>();
        let missing = || {
            GenerateError::Model(ModelError::MissingFilter {
                operator: condition.operator,
                field: condition.field.raw_name.clone(),
            })
        };

        let expr = match condition.operator {
            Operator::Eq => match scalar {
                Some(value) => lhs.eq(value),
                None => lhs.is_null(),
            },
            Operator::Neq => match scalar {
                Some(value) => lhs.ne(value),
                None => lhs.is_not_null(),
            },
            Operator::Gt => lhs.gt(scalar.ok_or_else(missing)?),
            Operator::Gte => lhs.gte(scalar.ok_or_else(missing)?),
            Operator::Lt => lhs.lt(scalar.ok_or_else(missing)?),
            Operator::Lte => lhs.lte(scalar.ok_or_else(missing)?),
            Operator::Like => lhs.like(scalar.ok_or_else(missing)?),
            Operator::NotLike => lhs.not_like(scalar.ok_or_else(missing)?),
            Operator::Include => lhs.in_list(list()),
            Operator::Exclude => lhs.not_in_list(list()),
            Operator::Between => match list().as_slice() {
                [low, high] => lhs.between(low.clone(), high.clone()),
                other => {
                    return Err(GenerateError::Model(ModelError::FilterArity {
                        operator: condition.operator,
                        field: condition.field.raw_name.clone(),
                        expected: 2,
                        actual: other.len(),
                    }))
                }
            },
            Operator::IsNull => lhs.is_null(),
            Operator::NotNull => lhs.is_not_null(),
        };
        Ok(expr)
    }
}
