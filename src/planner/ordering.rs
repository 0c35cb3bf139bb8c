//! ORDER BY planning for the data query.

use serde::Deserialize;

use super::filters::{event_field_path, EVENT_DATA_PREFIX};
use super::{PlannerResult, BASE_ALIAS, MATCHED_ALIAS, ORDER_EXPRESSION_ALIAS};
use crate::config::PlannerSettings;
use crate::sql::{cast, col, json_extract, lit_int, lit_str, table_col, CastType, Expr, OrderByExpr};

/// Rank given to values missing from an ordinal list.
pub const ORDINAL_FALLBACK_RANK: i64 = 99;

/// Requested sort.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderSpec {
    /// Base query column, or `event_data.<path>` for a matched event field.
    pub field: String,
    #[serde(default)]
    pub descending: bool,
    /// Cast event values to DOUBLE before sorting.
    #[serde(default)]
    pub numeric: bool,
}

impl OrderSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
            numeric: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            descending: true,
            ..Self::asc(field)
        }
    }

    pub fn numeric(mut self) -> Self {
        self.numeric = true;
        self
    }

    pub fn is_event_field(&self) -> bool {
        self.field.starts_with(EVENT_DATA_PREFIX)
    }

    fn apply(&self, expr: Expr) -> OrderByExpr {
        if self.descending {
            OrderByExpr::desc(expr)
        } else {
            OrderByExpr::asc(expr)
        }
    }
}

/// ORDER BY items plus the optional projected sort column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPlan {
    /// Projected as `order_expression` in the data query.
    pub projection: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
}

impl OrderPlan {
    pub fn needs_matched_event(&self) -> bool {
        self.projection.is_some()
    }
}

/// `CASE base_query.field WHEN v0 THEN 0 ... ELSE 99 END`
pub fn ordinal_expr(field: &str, values: &[String]) -> Expr {
    Expr::Case {
        operand: Some(Box::new(table_col(BASE_ALIAS, field))),
        when_clauses: values
            .iter()
            .enumerate()
            .map(|(rank, value)| (lit_str(value), lit_int(rank as i64)))
            .collect(),
        else_clause: Some(Box::new(lit_int(ORDINAL_FALLBACK_RANK))),
    }
}

pub fn plan_ordering(order: Option<&OrderSpec>, settings: &PlannerSettings) -> PlannerResult<OrderPlan> {
    let mut plan = OrderPlan::default();

    if let Some(order) = order {
        if order.is_event_field() {
            let (_, path) = event_field_path(&order.field)?;
            let extracted = json_extract(
                table_col(MATCHED_ALIAS, &settings.event_columns.event_data),
                path,
            );
            plan.projection = Some(if order.numeric {
                cast(extracted, CastType::Double)
            } else {
                extracted
            });
            plan.order_by.push(order.apply(col(ORDER_EXPRESSION_ALIAS)));
        } else if let Some(values) = settings.ordinal_orderings.get(&order.field) {
            plan.order_by.push(order.apply(ordinal_expr(&order.field, values)));
        } else {
            plan.order_by.push(order.apply(table_col(BASE_ALIAS, &order.field)));
        }
    }

    let tiebreaker_used = order.is_some_and(|o| o.field == settings.tiebreaker);
    if !tiebreaker_used {
        plan.order_by
            .push(OrderByExpr::desc(table_col(BASE_ALIAS, &settings.tiebreaker)));
    }

    Ok(plan)
}
