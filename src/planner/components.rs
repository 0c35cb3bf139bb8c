//! Base query plus matched-event join, rendered as count and data SQL.

use sqlparser::ast::Query as AstQuery;

use super::ordering::OrderPlan;
use super::{
    BASE_ALIAS, COUNT_ALIAS, COUNT_COLUMN, MATCHED_ALIAS, MATCHED_EVENT_DATA_ALIAS,
    ORDER_EXPRESSION_ALIAS, PLANNER_DIALECT,
};
use crate::sql::{count_star, table_col, table_star, Expr, ExprExt, Query, SelectExpr, TableRef};

/// Deduplicated event subquery and its join condition against `base_query`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedEvent {
    pub query: Query,
    pub on: Expr,
    /// Payload column exposed by `query`.
    pub payload_column: String,
}

/// The two halves of an event query.
///
/// Both SQL variants are rendered from clones, so one instance serves the
/// count and the data phase.
#[derive(Debug, Clone, PartialEq)]
pub struct BkBaseQueryComponents {
    pub base_query: Box<AstQuery>,
    pub matched_event: Option<MatchedEvent>,
    pub order: OrderPlan,
}

impl BkBaseQueryComponents {
    fn joined(&self) -> Query {
        let query =
            Query::new().from(TableRef::parsed(self.base_query.clone()).with_alias(BASE_ALIAS));
        match &self.matched_event {
            Some(matched) => query.inner_join(
                TableRef::subquery(matched.query.clone()).with_alias(MATCHED_ALIAS),
                matched.on.clone(),
            ),
            None => query,
        }
    }

    /// Query used for counting, without ordering or pagination.
    pub fn count_query(&self) -> Query {
        let inner = self.joined().select(vec![table_star(BASE_ALIAS)]);
        Query::new()
            .select(vec![count_star().alias(COUNT_COLUMN)])
            .from(TableRef::subquery(inner).with_alias(COUNT_ALIAS))
            .limit(1)
    }

    pub fn count_sql(&self) -> String {
        self.count_query().to_sql(PLANNER_DIALECT)
    }

    /// Ordered page of base rows, with the matched payload attached.
    pub fn data_query(&self, limit: u64, offset: u64) -> Query {
        let mut select = vec![SelectExpr::new(table_star(BASE_ALIAS))];
        if let Some(matched) = &self.matched_event {
            select.push(
                table_col(MATCHED_ALIAS, &matched.payload_column).alias(MATCHED_EVENT_DATA_ALIAS),
            );
        }
        if let Some(projection) = &self.order.projection {
            select.push(projection.clone().alias(ORDER_EXPRESSION_ALIAS));
        }

        let query = self
            .joined()
            .select(select)
            .order_by(self.order.order_by.clone())
            .limit(limit);
        if offset > 0 {
            query.offset(offset)
        } else {
            query
        }
    }

    pub fn data_sql(&self, limit: u64, offset: u64) -> String {
        self.data_query(limit, offset).to_sql(PLANNER_DIALECT)
    }
}
